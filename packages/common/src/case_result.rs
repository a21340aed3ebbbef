use serde::{Deserialize, Serialize};

use crate::submission_status::{CaseStatus, SubmissionStatus};

/// Outcome of one test case within an evaluation run. The full list is
/// serialized to JSON onto the submission record, one row per case is also
/// persisted for history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseResult {
    pub test_case_id: i32,
    pub status: CaseStatus,
    /// Canonical form of the produced value, when the run completed.
    pub output: Option<String>,
    /// Expected output as stored on the test case.
    pub expected: String,
    /// Seconds spent in the candidate invocation. None when unavailable
    /// (time limit exceeded, harness fault).
    pub execution_time: Option<f64>,
    /// Peak memory of the invocation in MiB. None when unavailable.
    pub peak_memory: Option<f64>,
    /// Failure detail for runtime errors and harness faults.
    pub error_message: Option<String>,
}

/// Overall verdict for a finished run: `Accepted` iff every case passed,
/// otherwise `WrongAnswer`. Case-level errors do not escalate to a distinct
/// overall status. Zero cases never reach this point; the orchestrator
/// terminates those runs with `Error` before evaluating.
pub fn overall_status(results: &[CaseResult]) -> SubmissionStatus {
    if !results.is_empty() && results.iter().all(|r| r.status.is_passed()) {
        SubmissionStatus::Accepted
    } else {
        SubmissionStatus::WrongAnswer
    }
}

/// Total execution time: the sum of the per-case times that are available.
pub fn total_time(results: &[CaseResult]) -> f64 {
    results.iter().filter_map(|r| r.execution_time).sum()
}

/// Peak memory across the run: the maximum of the available per-case peaks.
pub fn peak_memory(results: &[CaseResult]) -> f64 {
    results
        .iter()
        .filter_map(|r| r.peak_memory)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(status: CaseStatus, time: Option<f64>, memory: Option<f64>) -> CaseResult {
        CaseResult {
            test_case_id: 1,
            status,
            output: None,
            expected: String::new(),
            execution_time: time,
            peak_memory: memory,
            error_message: None,
        }
    }

    #[test]
    fn test_accepted_iff_all_passed() {
        let all_passed = vec![
            case(CaseStatus::Passed, Some(0.1), Some(1.0)),
            case(CaseStatus::Passed, Some(0.2), Some(2.0)),
        ];
        assert_eq!(overall_status(&all_passed), SubmissionStatus::Accepted);

        let one_failed = vec![
            case(CaseStatus::Passed, Some(0.1), Some(1.0)),
            case(CaseStatus::Failed, Some(0.2), Some(2.0)),
        ];
        assert_eq!(overall_status(&one_failed), SubmissionStatus::WrongAnswer);
    }

    #[test]
    fn test_all_errors_still_wrong_answer() {
        let results = vec![
            case(CaseStatus::Error, None, None),
            case(CaseStatus::Error, None, None),
        ];
        assert_eq!(overall_status(&results), SubmissionStatus::WrongAnswer);
    }

    #[test]
    fn test_three_case_aggregate() {
        // 2 passed + 1 failed: overall WrongAnswer, time is the sum,
        // memory is the max of the peaks.
        let results = vec![
            case(CaseStatus::Passed, Some(0.5), Some(4.0)),
            case(CaseStatus::Passed, Some(0.25), Some(9.5)),
            case(CaseStatus::Failed, Some(0.25), Some(2.0)),
        ];
        assert_eq!(overall_status(&results), SubmissionStatus::WrongAnswer);
        assert!((total_time(&results) - 1.0).abs() < 1e-9);
        assert!((peak_memory(&results) - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_metrics_are_skipped() {
        // A timed-out case contributes no time or memory.
        let results = vec![
            case(CaseStatus::Passed, Some(0.5), Some(4.0)),
            case(CaseStatus::TimeLimitExceeded, None, None),
        ];
        assert!((total_time(&results) - 0.5).abs() < 1e-9);
        assert!((peak_memory(&results) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_serialized_shape() {
        let result = CaseResult {
            test_case_id: 7,
            status: CaseStatus::RuntimeError,
            output: None,
            expected: "5".into(),
            execution_time: None,
            peak_memory: None,
            error_message: Some("ZeroDivisionError: division by zero".into()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["test_case_id"], 7);
        assert_eq!(json["status"], "RuntimeError");
        assert!(json["execution_time"].is_null());
    }
}
