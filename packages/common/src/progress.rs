use serde::{Deserialize, Serialize};

use crate::submission_status::{CaseStatus, SubmissionStatus};

/// Name of the pub/sub channel carrying progress events for a submission.
pub fn progress_channel(submission_id: i32) -> String {
    format!("arbiter:submission:{submission_id}:progress")
}

/// Per-test-case payload attached to a progress event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseProgress {
    /// 1-based position of the case in evaluation order.
    pub test_case_number: usize,
    pub total_test_cases: usize,
    pub status: CaseStatus,
    /// Raw input text, echoed only for public test cases.
    pub input: Option<String>,
    /// Canonical produced output, when the run completed.
    pub output: Option<String>,
    /// Expected output text, echoed only for public test cases.
    pub expected: Option<String>,
    pub execution_time: Option<f64>,
    pub peak_memory: Option<f64>,
    pub error_message: Option<String>,
}

/// One message on a submission's progress channel. Subscribers treat a
/// `Completed`/`Error` event as end-of-stream; the channel itself stays open
/// until the client disconnects.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_result: Option<CaseProgress>,
}

impl ProgressEvent {
    /// Emitted once when the worker picks the submission up.
    pub fn started(total_test_cases: usize) -> Self {
        Self {
            status: SubmissionStatus::Running.as_str().to_string(),
            message: format!("Running {total_test_cases} test case(s)"),
            test_case_result: None,
        }
    }

    /// Emitted after each test case, in evaluation order.
    pub fn case_completed(case: CaseProgress) -> Self {
        Self {
            status: SubmissionStatus::Running.as_str().to_string(),
            message: format!(
                "Test case {}/{}: {}",
                case.test_case_number,
                case.total_test_cases,
                case.status.human()
            ),
            test_case_result: Some(case),
        }
    }

    /// Terminal event carrying the final verdict.
    pub fn completed(status: SubmissionStatus) -> Self {
        Self {
            status: "Completed".to_string(),
            message: format!("Evaluation completed: {}", status.human()),
            test_case_result: None,
        }
    }

    /// Terminal event for evaluations that could not finish.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "Error".to_string(),
            message: message.into(),
            test_case_result: None,
        }
    }

    /// True for the exactly-once event that logically ends the stream.
    pub fn is_terminal(&self) -> bool {
        self.status == "Completed" || self.status == "Error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name() {
        assert_eq!(progress_channel(7), "arbiter:submission:7:progress");
    }

    #[test]
    fn test_case_event_shape() {
        let event = ProgressEvent::case_completed(CaseProgress {
            test_case_number: 2,
            total_test_cases: 3,
            status: CaseStatus::Passed,
            input: Some("2,3".into()),
            output: Some("[5]".into()),
            expected: Some("5".into()),
            execution_time: Some(0.01),
            peak_memory: Some(0.2),
            error_message: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "Running");
        let payload = &json["test_case_result"];
        assert_eq!(payload["test_case_number"], 2);
        assert_eq!(payload["total_test_cases"], 3);
        assert_eq!(payload["status"], "Passed");
        assert_eq!(payload["output"], "[5]");
    }

    #[test]
    fn test_terminal_events() {
        let done = ProgressEvent::completed(SubmissionStatus::WrongAnswer);
        assert!(done.is_terminal());
        assert_eq!(done.message, "Evaluation completed: Wrong Answer");

        let failed = ProgressEvent::error("no test cases");
        assert!(failed.is_terminal());

        assert!(!ProgressEvent::started(3).is_terminal());
    }

    #[test]
    fn test_payload_omitted_when_absent() {
        let json = serde_json::to_string(&ProgressEvent::started(1)).unwrap();
        assert!(!json.contains("test_case_result"));
    }
}
