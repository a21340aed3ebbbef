use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// The submission may not be visible to this worker yet (replication
    /// lag), so the job is retried rather than failed.
    #[error("Submission {0} not found")]
    SubmissionNotFound(i32),

    #[error("{0} not found")]
    RecordNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    /// Infrastructure faults are retried; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvalError::SubmissionNotFound(_)
                | EvalError::RecordNotFound(_)
                | EvalError::Database(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(EvalError::SubmissionNotFound(1).is_retryable());
        assert!(EvalError::RecordNotFound("Problem 3".into()).is_retryable());

        let serde_err = serde_json::from_str::<i32>("not json").unwrap_err();
        assert!(!EvalError::Serialization(serde_err).is_retryable());
    }
}
