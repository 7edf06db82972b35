use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

/// Test-level constants driving conversion, joined with subject identity
/// for report headers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    pub id: String,
    pub test_name: String,
    pub subject_name: String,
    pub subject_code: String,
    pub max_marks: f64,
    pub converted_max_marks: f64,
    pub test_date: Option<String>,
}

/// One persisted mark per (student, test) pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    pub id: String,
    pub student_id: String,
    pub test_id: String,
    pub marks_obtained: f64,
    pub converted_marks: f64,
    pub remarks: Option<String>,
    pub added_by: Option<String>,
    pub updated_at: Option<String>,
}

/// MarkRecord joined with student identity, ordered by roll number.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRow {
    #[serde(flatten)]
    pub record: MarkRecord,
    pub student_name: String,
    pub student_roll_no: String,
    pub class_name: String,
}

pub fn find_test(conn: &Connection, test_id: &str) -> rusqlite::Result<Option<TestConfig>> {
    conn.query_row(
        "SELECT t.id, t.test_name, s.subject_name, s.subject_code,
                t.max_marks, t.converted_max_marks, t.test_date
         FROM tests t
         JOIN subjects s ON t.subject_id = s.id
         WHERE t.id = ?",
        [test_id],
        |r| {
            Ok(TestConfig {
                id: r.get(0)?,
                test_name: r.get(1)?,
                subject_name: r.get(2)?,
                subject_code: r.get(3)?,
                max_marks: r.get(4)?,
                converted_max_marks: r.get(5)?,
                test_date: r.get(6)?,
            })
        },
    )
    .optional()
}

/// Insert-or-overwrite keyed by (student_id, test_id). The record id is
/// minted on first insert and kept stable across resubmissions.
pub fn upsert_mark(
    conn: &Connection,
    student_id: &str,
    test_id: &str,
    marks_obtained: f64,
    converted_marks: f64,
    remarks: Option<&str>,
    added_by: Option<&str>,
) -> rusqlite::Result<MarkRecord> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO student_marks
            (id, student_id, test_id, marks_obtained, converted_marks, remarks, added_by, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, test_id) DO UPDATE SET
            marks_obtained = excluded.marks_obtained,
            converted_marks = excluded.converted_marks,
            remarks = excluded.remarks,
            added_by = excluded.added_by,
            updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            student_id,
            test_id,
            marks_obtained,
            converted_marks,
            remarks,
            added_by,
            now,
        ),
    )?;

    conn.query_row(
        "SELECT id, student_id, test_id, marks_obtained, converted_marks, remarks, added_by, updated_at
         FROM student_marks
         WHERE student_id = ? AND test_id = ?",
        (student_id, test_id),
        map_record,
    )
}

fn map_record(r: &rusqlite::Row<'_>) -> rusqlite::Result<MarkRecord> {
    Ok(MarkRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        test_id: r.get(2)?,
        marks_obtained: r.get(3)?,
        converted_marks: r.get(4)?,
        remarks: r.get(5)?,
        added_by: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

pub fn list_by_test(conn: &Connection, test_id: &str) -> rusqlite::Result<Vec<MarkRow>> {
    let mut stmt = conn.prepare(
        "SELECT sm.id, sm.student_id, sm.test_id, sm.marks_obtained, sm.converted_marks,
                sm.remarks, sm.added_by, sm.updated_at,
                s.student_name, s.student_roll_no, s.class_name
         FROM student_marks sm
         JOIN students s ON sm.student_id = s.id
         WHERE sm.test_id = ?
         ORDER BY s.student_roll_no",
    )?;
    let rows = stmt.query_map([test_id], |r| {
        Ok(MarkRow {
            record: map_record(r)?,
            student_name: r.get(8)?,
            student_roll_no: r.get(9)?,
            class_name: r.get(10)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMarkRow {
    #[serde(flatten)]
    pub record: MarkRecord,
    pub test_name: String,
    pub subject_name: String,
    pub subject_code: String,
    pub max_marks: f64,
    pub converted_max_marks: f64,
}

pub fn list_by_student(conn: &Connection, student_id: &str) -> rusqlite::Result<Vec<StudentMarkRow>> {
    let mut stmt = conn.prepare(
        "SELECT sm.id, sm.student_id, sm.test_id, sm.marks_obtained, sm.converted_marks,
                sm.remarks, sm.added_by, sm.updated_at,
                t.test_name, sub.subject_name, sub.subject_code,
                t.max_marks, t.converted_max_marks
         FROM student_marks sm
         JOIN tests t ON sm.test_id = t.id
         JOIN subjects sub ON t.subject_id = sub.id
         WHERE sm.student_id = ?
         ORDER BY sm.updated_at DESC",
    )?;
    let rows = stmt.query_map([student_id], |r| {
        Ok(StudentMarkRow {
            record: map_record(r)?,
            test_name: r.get(8)?,
            subject_name: r.get(9)?,
            subject_code: r.get(10)?,
            max_marks: r.get(11)?,
            converted_max_marks: r.get(12)?,
        })
    })?;
    rows.collect()
}

pub fn delete_mark(conn: &Connection, mark_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM student_marks WHERE id = ?", [mark_id])
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub student_name: String,
    pub student_roll_no: String,
    pub class_name: String,
}

pub fn students_without_marks(conn: &Connection, test_id: &str) -> rusqlite::Result<Vec<StudentRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.student_name, s.student_roll_no, s.class_name
         FROM students s
         WHERE s.id NOT IN (SELECT student_id FROM student_marks WHERE test_id = ?)
         ORDER BY s.student_roll_no",
    )?;
    let rows = stmt.query_map([test_id], |r| {
        Ok(StudentRow {
            id: r.get(0)?,
            student_name: r.get(1)?,
            student_roll_no: r.get(2)?,
            class_name: r.get(3)?,
        })
    })?;
    rows.collect()
}
