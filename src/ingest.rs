use crate::calc;
use crate::store;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct IngestError {
    pub code: String,
    pub message: String,
}

impl IngestError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// One row of a bulk submission. `marks_obtained` arrives as a number or a
/// string; a blank value means the student was absent for the test.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarkEntry {
    pub student_id: String,
    #[serde(default)]
    pub marks_obtained: serde_json::Value,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEntry {
    pub student_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub accepted: Vec<store::MarkRecord>,
    pub rejected: Vec<RejectedEntry>,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub message: String,
}

/// Blank means absent: null, "", or whitespace-only strings skip the entry
/// without recording anything. Non-blank values must parse as a number.
pub fn parse_raw_score(value: &serde_json::Value) -> Result<Option<f64>, String> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| "marks out of numeric range".to_string()),
        serde_json::Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<f64>()
                .map(Some)
                .map_err(|_| format!("marks must be numeric, got '{}'", t))
        }
        other => Err(format!("marks must be a number or string, got {}", other)),
    }
}

/// Apply the conversion across a batch of entries for one test, upserting
/// each record independently. A failing entry lands in `rejected` and never
/// aborts the rest of the batch; accepted entries are not rolled back.
///
/// Missing test config or a zero raw maximum is fatal for the whole batch:
/// there is no valid divisor to convert against.
pub fn bulk_ingest(
    conn: &Connection,
    test_id: &str,
    entries: &[RawMarkEntry],
    added_by: Option<&str>,
) -> Result<IngestSummary, IngestError> {
    let test = store::find_test(conn, test_id)
        .map_err(|e| IngestError::new("db_query_failed", e.to_string()))?
        .ok_or_else(|| IngestError::new("not_found", "test not found"))?;
    if test.max_marks <= 0.0 {
        return Err(IngestError::new(
            "bad_test_config",
            "test has a zero raw maximum",
        ));
    }

    let mut accepted: Vec<store::MarkRecord> = Vec::new();
    let mut rejected: Vec<RejectedEntry> = Vec::new();

    for entry in entries {
        let raw = match parse_raw_score(&entry.marks_obtained) {
            Ok(Some(v)) => v,
            Ok(None) => continue, // absent
            Err(msg) => {
                rejected.push(RejectedEntry {
                    student_id: entry.student_id.clone(),
                    error: msg,
                });
                continue;
            }
        };

        let converted = calc::convert_marks(raw, test.max_marks, test.converted_max_marks);
        match store::upsert_mark(
            conn,
            &entry.student_id,
            test_id,
            raw,
            converted,
            entry.remarks.as_deref(),
            added_by,
        ) {
            Ok(record) => accepted.push(record),
            Err(e) => rejected.push(RejectedEntry {
                student_id: entry.student_id.clone(),
                error: e.to_string(),
            }),
        }
    }

    let message = if rejected.is_empty() {
        format!("Successfully saved marks for {} students", accepted.len())
    } else {
        format!(
            "Successfully saved marks for {} students, {} failed",
            accepted.len(),
            rejected.len()
        )
    };

    Ok(IngestSummary {
        accepted_count: accepted.len(),
        rejected_count: rejected.len(),
        accepted,
        rejected,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_values_mean_absent() {
        assert_eq!(parse_raw_score(&json!(null)).unwrap(), None);
        assert_eq!(parse_raw_score(&json!("")).unwrap(), None);
        assert_eq!(parse_raw_score(&json!("   ")).unwrap(), None);
    }

    #[test]
    fn numbers_and_numeric_strings_parse() {
        assert_eq!(parse_raw_score(&json!(40)).unwrap(), Some(40.0));
        assert_eq!(parse_raw_score(&json!(25.5)).unwrap(), Some(25.5));
        assert_eq!(parse_raw_score(&json!("33.5")).unwrap(), Some(33.5));
    }

    #[test]
    fn garbage_values_are_rejected_not_nan() {
        assert!(parse_raw_score(&json!("forty")).is_err());
        assert!(parse_raw_score(&json!({"v": 1})).is_err());
    }
}
