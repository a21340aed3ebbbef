#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a submission during the evaluation lifecycle.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum SubmissionStatus {
    /// Waiting to be picked up by a worker.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Pending"))]
    Pending,
    /// Currently running test cases.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Running"))]
    Running,
    /// All test cases passed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Accepted"))]
    Accepted,
    /// At least one test case did not pass.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "WrongAnswer"))]
    WrongAnswer,
    /// Submitted code could not be loaded (empty source, syntax error).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "CompilationError"))]
    CompilationError,
    /// Candidate code crashed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "RuntimeError"))]
    RuntimeError,
    /// Exceeded the wall-clock ceiling.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "TimeLimitExceeded"))]
    TimeLimitExceeded,
    /// Exceeded the memory ceiling.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "MemoryLimitExceeded"))]
    MemoryLimitExceeded,
    /// Evaluation gave up after exhausting retries.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "EvaluationFailed"))]
    EvaluationFailed,
    /// Internal evaluation error (no test cases, infrastructure fault).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Error"))]
    Error,
}

impl SubmissionStatus {
    /// Returns true if this is a final verdict (evaluation is complete).
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if this is a successful verdict.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// All possible status values.
    pub const ALL: &'static [SubmissionStatus] = &[
        Self::Pending,
        Self::Running,
        Self::Accepted,
        Self::WrongAnswer,
        Self::CompilationError,
        Self::RuntimeError,
        Self::TimeLimitExceeded,
        Self::MemoryLimitExceeded,
        Self::EvaluationFailed,
        Self::Error,
    ];

    /// Returns the string representation (PascalCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "WrongAnswer",
            Self::CompilationError => "CompilationError",
            Self::RuntimeError => "RuntimeError",
            Self::TimeLimitExceeded => "TimeLimitExceeded",
            Self::MemoryLimitExceeded => "MemoryLimitExceeded",
            Self::EvaluationFailed => "EvaluationFailed",
            Self::Error => "Error",
        }
    }

    /// Human-readable form used in client-facing messages.
    pub fn human(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "Wrong Answer",
            Self::CompilationError => "Compilation Error",
            Self::RuntimeError => "Runtime Error",
            Self::TimeLimitExceeded => "Time Limit Exceeded",
            Self::MemoryLimitExceeded => "Memory Limit Exceeded",
            Self::EvaluationFailed => "Evaluation Failed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            SubmissionStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for SubmissionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseStatusError {
                invalid: s.to_string(),
            })
    }
}

/// Outcome of a single test case within an evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum CaseStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Passed"))]
    Passed,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Failed"))]
    Failed,
    /// Harness-level fault (no entry point, parameter mismatch, unsupported language).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Error"))]
    Error,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "TimeLimitExceeded"))]
    TimeLimitExceeded,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "RuntimeError"))]
    RuntimeError,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "MemoryLimitExceeded"))]
    MemoryLimitExceeded,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "CompilationError"))]
    CompilationError,
}

impl CaseStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Error => "Error",
            Self::TimeLimitExceeded => "TimeLimitExceeded",
            Self::RuntimeError => "RuntimeError",
            Self::MemoryLimitExceeded => "MemoryLimitExceeded",
            Self::CompilationError => "CompilationError",
        }
    }

    pub fn human(&self) -> &'static str {
        match self {
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Error => "Error",
            Self::TimeLimitExceeded => "Time Limit Exceeded",
            Self::RuntimeError => "Runtime Error",
            Self::MemoryLimitExceeded => "Memory Limit Exceeded",
            Self::CompilationError => "Compilation Error",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_roundtrip() {
        for status in SubmissionStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            let parsed: SubmissionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(*status, parsed);
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "Accepted".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Accepted
        );
        assert_eq!(
            "EvaluationFailed".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::EvaluationFailed
        );
        assert!("Invalid".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn test_finality() {
        assert!(!SubmissionStatus::Pending.is_final());
        assert!(!SubmissionStatus::Running.is_final());
        assert!(SubmissionStatus::WrongAnswer.is_final());
        assert!(SubmissionStatus::Error.is_final());
    }

    #[test]
    fn test_human_forms() {
        assert_eq!(SubmissionStatus::WrongAnswer.human(), "Wrong Answer");
        assert_eq!(SubmissionStatus::TimeLimitExceeded.human(), "Time Limit Exceeded");
        assert_eq!(CaseStatus::MemoryLimitExceeded.human(), "Memory Limit Exceeded");
    }
}
