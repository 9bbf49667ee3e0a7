//! Per-test verdicts and the aggregate differential comparison.

use serde::{Deserialize, Serialize};

use crate::core::types::ExecutionResult;

/// Verdict for one common test name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub test: String,
    pub ok_a: bool,
    pub ok_b: bool,
    pub stdout_a: String,
    pub stdout_b: String,
    pub stderr_a: String,
    pub stderr_b: String,
    #[serde(default)]
    pub timed_out_a: bool,
    #[serde(default)]
    pub timed_out_b: bool,
    pub passed: bool,
}

impl ComparisonRecord {
    /// A test passes only when both sides ran successfully and their trimmed
    /// stdout is identical. Stderr never affects the verdict.
    pub fn judge(test: &str, a: &ExecutionResult, b: &ExecutionResult) -> Self {
        let stdout_a = a.stdout.trim().to_string();
        let stdout_b = b.stdout.trim().to_string();
        let passed = a.success && b.success && stdout_a == stdout_b;
        Self {
            test: test.to_string(),
            ok_a: a.success,
            ok_b: b.success,
            stdout_a,
            stdout_b,
            stderr_a: a.stderr.clone(),
            stderr_b: b.stderr.clone(),
            timed_out_a: a.timed_out,
            timed_out_b: b.timed_out,
            passed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage of passed tests; 0 when there are no common tests.
    pub success_rate: f64,
    #[serde(rename = "match")]
    pub matched: bool,
    pub records: Vec<ComparisonRecord>,
}

impl ComparisonSummary {
    pub fn from_records(records: Vec<ComparisonRecord>) -> Self {
        let total = records.len();
        let passed = records.iter().filter(|r| r.passed).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            100.0 * passed as f64 / total as f64
        };
        Self {
            total,
            passed,
            failed: total - passed,
            success_rate,
            matched: passed == total,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ran(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.to_string(),
            return_code: Some(0),
            success: true,
            ..ExecutionResult::default()
        }
    }

    #[test]
    fn whitespace_differences_are_trimmed() {
        let record = ComparisonRecord::judge("test_add", &ran("5\n"), &ran("  5"));
        assert!(record.passed);
        assert_eq!(record.stdout_a, "5");
    }

    #[test]
    fn stderr_does_not_affect_verdict() {
        let mut b = ran("5");
        b.stderr = "DeprecationWarning".to_string();
        assert!(ComparisonRecord::judge("test_add", &ran("5"), &b).passed);
    }

    #[test]
    fn failed_side_never_passes_even_with_equal_output() {
        let broken = ExecutionResult::failed("Compilation failed.", "");
        let record = ComparisonRecord::judge("test_add", &broken, &ExecutionResult::default());
        assert!(!record.ok_a);
        assert!(!record.passed);
    }

    #[test]
    fn summary_counts_and_rate() {
        let summary = ComparisonSummary::from_records(vec![
            ComparisonRecord::judge("test_a", &ran("1"), &ran("1")),
            ComparisonRecord::judge("test_b", &ran("1"), &ran("2")),
        ]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.matched);
        assert!((summary.success_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_has_zero_rate() {
        let summary = ComparisonSummary::from_records(Vec::new());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.matched);
    }
}
