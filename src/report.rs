use crate::calc::{self, MarkStatistics};
use crate::store::{self, TestConfig};
use chrono::Local;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub rank: usize,
    pub student_roll_no: String,
    pub student_name: String,
    pub marks_obtained: f64,
    pub converted_marks: f64,
    pub remarks: Option<String>,
}

/// Everything one report render needs, rebuilt per request and discarded
/// after rendering. Nothing here is cached across calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub test: TestConfig,
    pub class_name: String,
    pub generated_on: String,
    pub roster: Vec<RosterRow>,
    pub statistics: MarkStatistics,
}

/// Join the per-test mark rows with student identity, filter to one class,
/// and compute fresh statistics. `Ok(None)` when the test id is unknown.
pub fn build_class_report(
    conn: &Connection,
    test_id: &str,
    class_name: &str,
) -> rusqlite::Result<Option<ClassReport>> {
    let Some(test) = store::find_test(conn, test_id)? else {
        return Ok(None);
    };

    let rows = store::list_by_test(conn, test_id)?;
    let roster: Vec<RosterRow> = rows
        .into_iter()
        .filter(|r| r.class_name == class_name)
        .enumerate()
        .map(|(i, r)| RosterRow {
            rank: i + 1,
            student_roll_no: r.student_roll_no,
            student_name: r.student_name,
            marks_obtained: r.record.marks_obtained,
            converted_marks: r.record.converted_marks,
            remarks: r.record.remarks,
        })
        .collect();

    let raw_scores: Vec<f64> = roster.iter().map(|r| r.marks_obtained).collect();
    let statistics = calc::mark_statistics(&raw_scores, test.max_marks);

    Ok(Some(ClassReport {
        test,
        class_name: class_name.to_string(),
        generated_on: Local::now().format("%d/%m/%Y").to_string(),
        roster,
        statistics,
    }))
}
