use crate::calc;
use crate::ingest::{self, RawMarkEntry};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn handle_marks_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let raw = match ingest::parse_raw_score(
        req.params
            .get("marksObtained")
            .unwrap_or(&serde_json::Value::Null),
    ) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing marksObtained", None),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let test = match store::find_test(conn, &test_id) {
        Ok(Some(t)) => t,
        Ok(None) => return err(&req.id, "not_found", "test not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let converted = calc::convert_marks(raw, test.max_marks, test.converted_max_marks);
    let remarks = optional_str(req, "remarks");
    let added_by = optional_str(req, "addedBy");
    match store::upsert_mark(
        conn,
        &student_id,
        &test_id,
        raw,
        converted,
        remarks.as_deref(),
        added_by.as_deref(),
    ) {
        Ok(record) => ok(&req.id, json!({ "mark": record, "message": "Marks saved successfully" })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_marks_bulk_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entries: Vec<RawMarkEntry> = match req.params.get("entries") {
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(entries) => entries,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("entries must be an array of mark entries: {}", e),
                    None,
                )
            }
        },
        None => return err(&req.id, "bad_params", "missing entries", None),
    };
    let added_by = optional_str(req, "addedBy");

    match ingest::bulk_ingest(conn, &test_id, &entries, added_by.as_deref()) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

fn handle_marks_list_by_test(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::list_by_test(conn, &test_id) {
        Ok(rows) => ok(&req.id, json!({ "marks": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_marks_list_by_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::list_by_student(conn, &student_id) {
        Ok(rows) => ok(&req.id, json!({ "marks": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_marks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mark_id = match required_str(req, "markId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_mark(conn, &mark_id) {
        Ok(0) => err(&req.id, "not_found", "mark not found", None),
        Ok(_) => ok(&req.id, json!({ "message": "Marks deleted successfully" })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_without_marks(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::find_test(conn, &test_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "test not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    match store::students_without_marks(conn, &test_id) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.upsert" => Some(handle_marks_upsert(state, req)),
        "marks.bulkUpsert" => Some(handle_marks_bulk_upsert(state, req)),
        "marks.listByTest" => Some(handle_marks_list_by_test(state, req)),
        "marks.listByStudent" => Some(handle_marks_list_by_student(state, req)),
        "marks.delete" => Some(handle_marks_delete(state, req)),
        "marks.studentsWithoutMarks" => Some(handle_students_without_marks(state, req)),
        _ => None,
    }
}
