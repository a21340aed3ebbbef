use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue message asking a worker to evaluate one submission.
///
/// Deliberately thin: the worker re-reads the submission and its problem's
/// test cases from storage, so a job enqueued before a replica caught up can
/// be retried instead of carrying stale data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluateJob {
    /// Job identifier (UUID), distinct per enqueue.
    pub job_id: String,
    /// ID of the submission to evaluate.
    pub submission_id: i32,
}

impl EvaluateJob {
    /// Create a new job with a generated UUID.
    pub fn new(submission_id: i32) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            submission_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_job_ids() {
        let a = EvaluateJob::new(1);
        let b = EvaluateJob::new(1);
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.submission_id, b.submission_id);
    }

    #[test]
    fn test_serde_roundtrip() {
        let job = EvaluateJob::new(42);
        let json = serde_json::to_string(&job).unwrap();
        let parsed: EvaluateJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.submission_id, 42);
        assert_eq!(parsed.job_id, job.job_id);
    }
}
