use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::layout;
use crate::report;
use rusqlite::Connection;
use serde_json::json;

const DEFAULT_INSTITUTION: &str = "INSTITUTE";

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

fn build_report(
    state: &AppState,
    req: &Request,
) -> Result<report::ClassReport, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let test_id = required_str(req, "testId")?;
    let class_name = required_str(req, "className")?;

    match report::build_class_report(conn, &test_id, &class_name) {
        Ok(Some(r)) => Ok(r),
        Ok(None) => Err(err(&req.id, "not_found", "test not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_class_marks_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    match build_report(state, req) {
        Ok(r) => ok(&req.id, json!(r)),
        Err(e) => e,
    }
}

fn safe_file_stem(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn handle_render_class_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_report = match build_report(state, req) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let institution = req
        .params
        .get("institution")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_INSTITUTION)
        .to_string();

    let Some(workspace) = state.workspace.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let bytes = layout::render_class_report(&class_report, &institution);

    let out_dir = workspace.join("reports");
    let file_name = format!(
        "{}_{}.pdf",
        safe_file_stem(&class_report.class_name),
        safe_file_stem(&class_report.test.id)
    );
    let out_path = out_dir.join(file_name);
    let write = || -> anyhow::Result<()> {
        std::fs::create_dir_all(&out_dir)?;
        std::fs::write(&out_path, &bytes)?;
        Ok(())
    };
    if let Err(e) = write() {
        return err(&req.id, "report_write_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "byteCount": bytes.len(),
            "rosterCount": class_report.roster.len(),
            "statistics": class_report.statistics,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.classMarksModel" => Some(handle_class_marks_model(state, req)),
        "reports.renderClassReport" => Some(handle_render_class_report(state, req)),
        _ => None,
    }
}
