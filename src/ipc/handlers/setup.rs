use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn required_positive_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    let v = req
        .params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))?;
    if v <= 0.0 {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must be positive", key),
            Some(json!({ key: v })),
        ));
    }
    Ok(v)
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let roll_no = match required_str(req, "studentRollNo") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO students (id, student_name, student_roll_no, class_name) VALUES (?, ?, ?, ?)",
        (&id, &name, &roll_no, &class_name),
    ) {
        Ok(_) => ok(&req.id, json!({ "id": id })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn student_row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "studentName": r.get::<_, String>(1)?,
        "studentRollNo": r.get::<_, String>(2)?,
        "className": r.get::<_, String>(3)?,
    }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = req
        .params
        .get("className")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let run = || -> rusqlite::Result<Vec<serde_json::Value>> {
        let (sql, bind) = match &class_name {
            Some(c) => (
                "SELECT id, student_name, student_roll_no, class_name FROM students
                 WHERE class_name = ? ORDER BY student_roll_no",
                Some(c.clone()),
            ),
            None => (
                "SELECT id, student_name, student_roll_no, class_name FROM students
                 ORDER BY student_roll_no",
                None,
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        match bind {
            Some(c) => stmt.query_map([c], student_row_json)?.collect(),
            None => stmt.query_map([], student_row_json)?.collect(),
        }
    };

    match run() {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "subjectName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "subjectCode") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO subjects (id, subject_name, subject_code) VALUES (?, ?, ?)",
        (&id, &name, &code),
    ) {
        Ok(_) => ok(&req.id, json!({ "id": id })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_tests_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "testName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_marks = match required_positive_f64(req, "maxMarks") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let converted_max = match required_positive_f64(req, "convertedMaxMarks") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_date = req
        .params
        .get("testDate")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO tests (id, test_name, subject_id, max_marks, converted_max_marks, test_date)
         VALUES (?, ?, ?, ?, ?, ?)",
        (&id, &name, &subject_id, max_marks, converted_max, &test_date),
    ) {
        Ok(_) => ok(&req.id, json!({ "id": id })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_tests_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let run = || -> rusqlite::Result<Vec<serde_json::Value>> {
        let mut stmt = conn.prepare(
            "SELECT t.id, t.test_name, s.subject_name, s.subject_code,
                    t.max_marks, t.converted_max_marks, t.test_date
             FROM tests t
             JOIN subjects s ON t.subject_id = s.id
             ORDER BY t.test_name",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "testName": r.get::<_, String>(1)?,
                    "subjectName": r.get::<_, String>(2)?,
                    "subjectCode": r.get::<_, String>(3)?,
                    "maxMarks": r.get::<_, f64>(4)?,
                    "convertedMaxMarks": r.get::<_, f64>(5)?,
                    "testDate": r.get::<_, Option<String>>(6)?,
                }))
            })?
            .collect();
        rows
    };

    match run() {
        Ok(tests) => ok(&req.id, json!({ "tests": tests })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "tests.create" => Some(handle_tests_create(state, req)),
        "tests.list" => Some(handle_tests_list(state, req)),
        _ => None,
    }
}
