use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use common::{CaseStatus, SubmissionStatus};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::shared::Pagination;

/// Request body for submitting a solution.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSubmissionRequest {
    /// Submitting user, as resolved by the upstream auth layer.
    #[schema(example = 1)]
    pub user_id: i32,
    /// Source language (e.g. "python").
    #[schema(example = "python")]
    pub language: String,
    /// Base64-encoded source code.
    #[schema(example = "ZGVmIHNvbHZlKGEsIGIpOiByZXR1cm4gYSArIGI=")]
    pub code: String,
}

/// Response to a successful submission.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    #[schema(example = "Submission received")]
    pub message: String,
    #[schema(example = 1)]
    pub submission_id: i32,
    pub status: SubmissionStatus,
}

/// Query parameters for submission listing.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SubmissionListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Filter by problem ID.
    pub problem_id: Option<i32>,
    /// Filter by user ID.
    pub user_id: Option<i32>,
    /// Filter by status.
    pub status: Option<SubmissionStatus>,
}

/// Submission summary for list views (code omitted).
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionListItem {
    #[schema(example = 1)]
    pub id: i32,
    pub user_id: i32,
    pub problem_id: i32,
    #[schema(example = "python")]
    pub language: String,
    pub status: SubmissionStatus,
    /// Total execution time in seconds, null until judged.
    pub time: Option<f64>,
    /// Peak memory in MiB, null until judged.
    pub memory: Option<f64>,
    #[schema(example = "2025-10-01T14:30:00Z")]
    pub created_at: DateTime<Utc>,
}

/// Paginated list of submissions.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionListResponse {
    pub data: Vec<SubmissionListItem>,
    pub pagination: Pagination,
}

/// Full submission details.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub user_id: i32,
    pub problem_id: i32,
    #[schema(example = "python")]
    pub language: String,
    pub code: String,
    pub status: SubmissionStatus,
    pub time: Option<f64>,
    pub memory: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub judged_at: Option<DateTime<Utc>>,
    /// Per-case outcomes, present once the evaluation finished.
    pub test_case_results: Vec<CaseResultResponse>,
}

/// Result for a single test case. Input and expected output are echoed only
/// for public test cases.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CaseResultResponse {
    #[schema(example = 1)]
    pub test_case_id: i32,
    pub status: CaseStatus,
    pub input: Option<String>,
    pub output: Option<String>,
    pub expected: Option<String>,
    pub execution_time: Option<f64>,
    pub peak_memory: Option<f64>,
    pub error_message: Option<String>,
}

impl From<common::entity::submission::Model> for SubmissionListItem {
    fn from(m: common::entity::submission::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            problem_id: m.problem_id,
            language: m.language,
            status: m.status,
            time: m.time,
            memory: m.memory,
            created_at: m.created_at,
        }
    }
}

/// Decode the transport encoding of submitted code. Empty decoded code is
/// accepted here; the evaluator classifies it as a compilation error.
pub fn decode_code(encoded: &str) -> Result<String, AppError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| AppError::Validation("Invalid Base64 encoding for code".into()))?;
    String::from_utf8(bytes).map_err(|_| AppError::Validation("Code must be valid UTF-8".into()))
}

/// Validate a submission creation request and return the decoded code.
pub fn validate_create_submission(
    req: &CreateSubmissionRequest,
    max_size: usize,
) -> Result<String, AppError> {
    if req.language.trim().is_empty() {
        return Err(AppError::Validation("Language is required".into()));
    }

    let code = decode_code(&req.code)?;
    if code.len() > max_size {
        return Err(AppError::Validation(format!(
            "Code size ({} bytes) exceeds maximum ({} bytes)",
            code.len(),
            max_size
        )));
    }

    Ok(code)
}
