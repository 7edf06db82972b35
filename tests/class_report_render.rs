use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_marksd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn marksd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Seeds one CSE-A class with scored marks plus one CSE-B student, so the
/// report model must filter by class.
fn seed_class_with_marks(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
    scores: &[f64],
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let subject = request_ok(
        stdin,
        reader,
        "subj",
        "subjects.create",
        json!({ "subjectName": "Mathematics", "subjectCode": "MAT102" }),
    );
    let subject_id = subject.get("id").and_then(|v| v.as_str()).expect("subject id");
    let test = request_ok(
        stdin,
        reader,
        "test",
        "tests.create",
        json!({
            "testName": "Internal Test 2",
            "subjectId": subject_id,
            "maxMarks": 50,
            "convertedMaxMarks": 15
        }),
    );
    let test_id = test
        .get("id")
        .and_then(|v| v.as_str())
        .expect("test id")
        .to_string();

    let mut entries = Vec::new();
    for (i, score) in scores.iter().enumerate() {
        let student = request_ok(
            stdin,
            reader,
            &format!("stud-{}", i),
            "students.create",
            json!({
                "studentName": format!("Student {}", i + 1),
                "studentRollNo": format!("R{:03}", i + 1),
                "className": "CSE-A"
            }),
        );
        entries.push(json!({
            "studentId": student.get("id").and_then(|v| v.as_str()).expect("student id"),
            "marksObtained": score
        }));
    }
    // A student of another class taking the same test must not leak into
    // the CSE-A roster.
    let other = request_ok(
        stdin,
        reader,
        "stud-other",
        "students.create",
        json!({
            "studentName": "Other Class",
            "studentRollNo": "Z999",
            "className": "CSE-B"
        }),
    );
    entries.push(json!({
        "studentId": other.get("id").and_then(|v| v.as_str()).expect("student id"),
        "marksObtained": 49
    }));

    let _ = request_ok(
        stdin,
        reader,
        "bulk",
        "marks.bulkUpsert",
        json!({ "testId": test_id, "entries": entries }),
    );
    test_id
}

#[test]
fn class_marks_model_filters_and_aggregates() {
    let workspace = temp_dir("marksd-report-model");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let test_id = seed_class_with_marks(
        &mut stdin,
        &mut reader,
        &workspace,
        &[40.0, 25.0, 12.0, 48.0, 19.5],
    );

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "model",
        "reports.classMarksModel",
        json!({ "testId": test_id, "className": "CSE-A" }),
    );

    let roster = model.get("roster").and_then(|v| v.as_array()).expect("roster");
    assert_eq!(roster.len(), 5);
    // Ranks run sequentially in roll-number order.
    for (i, row) in roster.iter().enumerate() {
        assert_eq!(row.get("rank").and_then(|v| v.as_u64()), Some(i as u64 + 1));
        assert_eq!(
            row.get("studentRollNo").and_then(|v| v.as_str()),
            Some(format!("R{:03}", i + 1).as_str())
        );
    }

    let stats = model.get("statistics").expect("statistics");
    assert_eq!(stats.get("count").and_then(|v| v.as_u64()), Some(5));
    assert_eq!(stats.get("averageRaw").and_then(|v| v.as_f64()), Some(28.9));
    assert_eq!(stats.get("maxRaw").and_then(|v| v.as_f64()), Some(48.0));
    assert_eq!(stats.get("minRaw").and_then(|v| v.as_f64()), Some(12.0));
    // Pass mark is 20: 40, 25 and 48 clear it.
    assert_eq!(stats.get("passCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        stats.get("passPercentage").and_then(|v| v.as_f64()),
        Some(60.0)
    );

    let _ = child.kill();
}

#[test]
fn render_writes_a_single_page_pdf() {
    let workspace = temp_dir("marksd-report-render");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let test_id = seed_class_with_marks(
        &mut stdin,
        &mut reader,
        &workspace,
        &[40.0, 25.0, 12.0, 48.0, 19.5, 33.0, 27.5],
    );

    let rendered = request_ok(
        &mut stdin,
        &mut reader,
        "render",
        "reports.renderClassReport",
        json!({ "testId": test_id, "className": "CSE-A" }),
    );

    assert_eq!(rendered.get("rosterCount").and_then(|v| v.as_u64()), Some(7));
    let path = rendered
        .get("path")
        .and_then(|v| v.as_str())
        .expect("report path");
    let bytes = std::fs::read(path).expect("read rendered report");
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(
        rendered.get("byteCount").and_then(|v| v.as_u64()),
        Some(bytes.len() as u64)
    );

    let _ = child.kill();
}

#[test]
fn render_empty_roster_degrades_without_error() {
    let workspace = temp_dir("marksd-report-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let test_id = seed_class_with_marks(&mut stdin, &mut reader, &workspace, &[]);

    // No CSE-C student has any marks: statistics are all zero and the
    // chart degrades to empty axes.
    let model = request_ok(
        &mut stdin,
        &mut reader,
        "model",
        "reports.classMarksModel",
        json!({ "testId": test_id, "className": "CSE-C" }),
    );
    let stats = model.get("statistics").expect("statistics");
    assert_eq!(stats.get("count").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(stats.get("averageRaw").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(stats.get("passPercentage").and_then(|v| v.as_f64()), Some(0.0));

    let rendered = request_ok(
        &mut stdin,
        &mut reader,
        "render",
        "reports.renderClassReport",
        json!({ "testId": test_id, "className": "CSE-C" }),
    );
    assert_eq!(rendered.get("rosterCount").and_then(|v| v.as_u64()), Some(0));
    let path = rendered
        .get("path")
        .and_then(|v| v.as_str())
        .expect("report path");
    assert!(std::fs::read(path).expect("read report").starts_with(b"%PDF-"));

    let _ = child.kill();
}
