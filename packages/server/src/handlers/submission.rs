use std::cmp;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration, Utc};
use sea_orm::*;
use tracing::{debug, info, instrument, warn};

use common::SubmissionStatus;
use common::entity::{problem, submission, test_case, test_case_result, user};
use common::evaluate_job::EvaluateJob;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::shared::Pagination;
use crate::models::submission::*;
use crate::state::AppState;

/// Check the per-user submission rate limit.
///
/// Uses an optimistic (non-locking) window check, so concurrent requests in a
/// very short window may both pass before either insert completes; accepted
/// trade-off against locking on every request.
async fn check_rate_limit(
    db: &DatabaseConnection,
    user_id: i32,
    limit_per_minute: u32,
) -> Result<(), AppError> {
    if limit_per_minute == 0 {
        return Ok(()); // Rate limiting disabled
    }

    let one_minute_ago = Utc::now() - Duration::minutes(1);

    let count = submission::Entity::find()
        .filter(submission::Column::UserId.eq(user_id))
        .filter(submission::Column::CreatedAt.gt(one_minute_ago))
        .count(db)
        .await?;

    if count >= limit_per_minute as u64 {
        let oldest = submission::Entity::find()
            .filter(submission::Column::UserId.eq(user_id))
            .filter(submission::Column::CreatedAt.gt(one_minute_ago))
            .order_by_asc(submission::Column::CreatedAt)
            .one(db)
            .await?;

        let retry_after = oldest
            .map(|s| {
                let expires = s.created_at + Duration::minutes(1);
                cmp::max((expires - Utc::now()).num_seconds(), 1) as u64
            })
            .unwrap_or(60);

        return Err(AppError::RateLimited { retry_after });
    }

    Ok(())
}

/// Find a problem by ID or return 404.
async fn find_problem<C: ConnectionTrait>(db: &C, id: i32) -> Result<problem::Model, AppError> {
    problem::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Problem not found".into()))
}

/// Find a submission by ID or return 404.
async fn find_submission<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<submission::Model, AppError> {
    submission::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))
}

/// Find a user by ID or return 404.
async fn find_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Hand a freshly created submission to the evaluation queue. Enqueue
/// failures are logged, not surfaced: the submission stays `Pending` and can
/// be re-dispatched.
#[instrument(skip(state), fields(submission_id = submission.id))]
async fn enqueue_evaluation(state: &AppState, submission: &submission::Model) {
    let Some(ref mq) = state.mq else {
        debug!("MQ unavailable, skipping enqueue");
        return;
    };

    let job = EvaluateJob::new(submission.id);
    let job_id = job.job_id.clone();

    match mq
        .publish(&state.config.mq.queue_name, None, &job, None)
        .await
    {
        Ok(_) => {
            info!(job_id = %job_id, "Evaluation job enqueued");
        }
        Err(e) => {
            warn!(error = %e, "Failed to enqueue evaluation job");
        }
    }
}

/// Submit a solution to a problem.
#[utoipa::path(
    post,
    path = "/api/v1/problems/{id}/submissions",
    tag = "Submissions",
    operation_id = "createSubmission",
    summary = "Submit a solution to a problem",
    description = "Creates a submission in Pending state and queues it for evaluation. The code field is Base64-encoded.",
    params(
        ("id" = i32, Path, description = "Problem ID")
    ),
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submission created", body = SubmitResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Problem or user not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Rate limit exceeded (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(problem_id = %problem_id))]
pub async fn create_submission(
    State(state): State<AppState>,
    Path(problem_id): Path<i32>,
    AppJson(payload): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let code = validate_create_submission(&payload, state.config.submission.max_size)?;
    check_rate_limit(
        &state.db,
        payload.user_id,
        state.config.submission.rate_limit_per_minute,
    )
    .await?;

    let txn = state.db.begin().await?;

    let _ = find_problem(&txn, problem_id).await?;
    let _ = find_user(&txn, payload.user_id).await?;

    let new_submission = submission::ActiveModel {
        language: Set(payload.language.trim().to_string()),
        code: Set(code),
        status: Set(SubmissionStatus::Pending),
        user_id: Set(payload.user_id),
        problem_id: Set(problem_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let model = new_submission.insert(&txn).await?;
    txn.commit().await?;

    enqueue_evaluation(&state, &model).await;

    let response = SubmitResponse {
        message: "Submission received".into(),
        submission_id: model.id,
        status: model.status,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// List submissions.
#[utoipa::path(
    get,
    path = "/api/v1/submissions",
    tag = "Submissions",
    operation_id = "listSubmissions",
    summary = "List submissions",
    description = "Returns a paginated list of submissions, newest first.",
    params(SubmissionListQuery),
    responses(
        (status = 200, description = "List of submissions", body = SubmissionListResponse),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<Json<SubmissionListResponse>, AppError> {
    let page = cmp::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut base_select = submission::Entity::find();

    if let Some(pid) = query.problem_id {
        base_select = base_select.filter(submission::Column::ProblemId.eq(pid));
    }
    if let Some(uid) = query.user_id {
        base_select = base_select.filter(submission::Column::UserId.eq(uid));
    }
    if let Some(status) = query.status {
        base_select = base_select.filter(submission::Column::Status.eq(status));
    }

    let total = base_select.clone().count(&state.db).await?;

    let submissions = base_select
        .order_by(submission::Column::CreatedAt, Order::Desc)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let data = submissions.into_iter().map(SubmissionListItem::from).collect();
    let total_pages = total.div_ceil(per_page);

    Ok(Json(SubmissionListResponse {
        data,
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    }))
}

/// Get a single submission by ID.
#[utoipa::path(
    get,
    path = "/api/v1/submissions/{id}",
    tag = "Submissions",
    operation_id = "getSubmission",
    summary = "Get submission details",
    description = "Returns full details of a submission, including per-test-case results once evaluation finished. Input and expected output are included only for public test cases.",
    params(
        ("id" = i32, Path, description = "Submission ID")
    ),
    responses(
        (status = 200, description = "Submission details", body = SubmissionResponse),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(submission_id = %id))]
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let sub = find_submission(&state.db, id).await?;

    let test_case_results = if sub.status.is_final() {
        let rows = test_case_result::Entity::find()
            .filter(test_case_result::Column::SubmissionId.eq(sub.id))
            .find_also_related(test_case::Entity)
            .all(&state.db)
            .await?;

        rows.into_iter()
            .map(|(row, tc)| {
                let is_public = tc.as_ref().is_some_and(|t| t.is_public);
                CaseResultResponse {
                    test_case_id: row.test_case_id,
                    status: row.status,
                    input: if is_public {
                        tc.as_ref().map(|t| t.input.clone())
                    } else {
                        None
                    },
                    output: row.output,
                    expected: if is_public {
                        Some(row.expected_output)
                    } else {
                        None
                    },
                    execution_time: row.execution_time,
                    peak_memory: row.peak_memory,
                    error_message: row.error_message,
                }
            })
            .collect()
    } else {
        vec![]
    };

    Ok(Json(SubmissionResponse {
        id: sub.id,
        user_id: sub.user_id,
        problem_id: sub.problem_id,
        language: sub.language,
        code: sub.code,
        status: sub.status,
        time: sub.time,
        memory: sub.memory,
        created_at: sub.created_at,
        judged_at: sub.judged_at,
        test_case_results,
    }))
}
