use serde::Serialize;

/// Fraction of the raw maximum that counts as a passing mark. Syllabus
/// business rule, fixed at 40% for every test.
pub const PASS_THRESHOLD: f64 = 0.4;

/// Half-away-from-zero rounding to 2 decimals, used for converted marks
/// and averages.
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Half-away-from-zero rounding to 1 decimal, used for pass percentages.
pub fn round_off_1_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Rescale a raw score to the internal-assessment maximum:
/// `round2(raw / max_marks * converted_max_marks)`.
///
/// A zero raw maximum means the test config is malformed; the conversion
/// yields 0 rather than dividing.
pub fn convert_marks(marks_obtained: f64, max_marks: f64, converted_max_marks: f64) -> f64 {
    if max_marks == 0.0 {
        return 0.0;
    }
    round_off_2_decimals(marks_obtained / max_marks * converted_max_marks)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkStatistics {
    pub count: usize,
    pub average_raw: f64,
    pub max_raw: f64,
    pub min_raw: f64,
    pub pass_count: usize,
    pub pass_percentage: f64,
}

impl MarkStatistics {
    pub fn empty() -> Self {
        MarkStatistics {
            count: 0,
            average_raw: 0.0,
            max_raw: 0.0,
            min_raw: 0.0,
            pass_count: 0,
            pass_percentage: 0.0,
        }
    }
}

/// Per-test summary over a set of raw scores. Order-independent; an empty
/// set resolves to all-zero statistics, never an error.
pub fn mark_statistics(raw_scores: &[f64], max_marks: f64) -> MarkStatistics {
    if raw_scores.is_empty() {
        return MarkStatistics::empty();
    }

    let count = raw_scores.len();
    let sum: f64 = raw_scores.iter().sum();
    let mut max_raw = f64::MIN;
    let mut min_raw = f64::MAX;
    for &v in raw_scores {
        max_raw = max_raw.max(v);
        min_raw = min_raw.min(v);
    }

    let pass_mark = max_marks * PASS_THRESHOLD;
    let pass_count = raw_scores.iter().filter(|&&v| v >= pass_mark).count();

    MarkStatistics {
        count,
        average_raw: round_off_2_decimals(sum / count as f64),
        max_raw,
        min_raw,
        pass_count,
        pass_percentage: round_off_1_decimal(pass_count as f64 / count as f64 * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_scales_and_rounds_to_two_decimals() {
        assert_eq!(convert_marks(40.0, 50.0, 15.0), 12.0);
        assert_eq!(convert_marks(25.0, 50.0, 15.0), 7.5);
        // 33/40*10 = 8.25, exact; 31/60*20 = 10.333... rounds half away.
        assert_eq!(convert_marks(33.0, 40.0, 10.0), 8.25);
        assert_eq!(convert_marks(31.0, 60.0, 20.0), 10.33);
        assert_eq!(convert_marks(0.0, 50.0, 15.0), 0.0);
    }

    #[test]
    fn convert_guards_zero_divisor() {
        assert_eq!(convert_marks(40.0, 0.0, 15.0), 0.0);
    }

    #[test]
    fn convert_is_idempotent_on_same_inputs() {
        let a = convert_marks(37.0, 50.0, 15.0);
        let b = convert_marks(37.0, 50.0, 15.0);
        assert_eq!(a, b);
    }

    #[test]
    fn statistics_empty_input_is_all_zero() {
        let s = mark_statistics(&[], 50.0);
        assert_eq!(s, MarkStatistics::empty());
    }

    #[test]
    fn statistics_match_worked_example() {
        // max 50, raws [40, 25]; pass mark is 20.
        let s = mark_statistics(&[40.0, 25.0], 50.0);
        assert_eq!(s.count, 2);
        assert_eq!(s.average_raw, 32.5);
        assert_eq!(s.max_raw, 40.0);
        assert_eq!(s.min_raw, 25.0);
        assert_eq!(s.pass_count, 2);
        assert_eq!(s.pass_percentage, 100.0);
    }

    #[test]
    fn statistics_invariants_hold() {
        let s = mark_statistics(&[12.0, 48.5, 30.0, 19.0], 50.0);
        assert!(s.min_raw <= s.average_raw && s.average_raw <= s.max_raw);
        assert!(s.pass_count <= s.count);
        assert_eq!(s.pass_count, 2); // 48.5 and 30.0 clear the 20.0 pass mark
        assert_eq!(s.pass_percentage, 50.0);
    }

    #[test]
    fn statistics_are_order_independent() {
        let a = mark_statistics(&[10.0, 20.0, 30.0], 50.0);
        let b = mark_statistics(&[30.0, 10.0, 20.0], 50.0);
        assert_eq!(a, b);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let s = mark_statistics(&[20.0, 19.99], 50.0);
        assert_eq!(s.pass_count, 1);
    }
}
