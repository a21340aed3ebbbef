use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{error, info, instrument, warn};

use common::case_result::{self, CaseResult};
use common::entity::{problem, submission, test_case, test_case_result, user};
use common::progress::{CaseProgress, ProgressEvent};
use common::{CaseStatus, SubmissionStatus, Value};

use crate::comparator;
use crate::error::EvalError;
use crate::notifier::ProgressNotifier;
use crate::runner::{CodeRunner, RunOutcome, Runners};
use crate::stats;

/// Everything one evaluation needs.
pub struct EvalContext {
    pub db: DatabaseConnection,
    pub notifier: ProgressNotifier,
    pub runners: Runners,
    pub tolerance: f64,
}

/// Evaluate one submission end to end:
/// `Pending -> Running -> {Accepted | WrongAnswer | CompilationError | Error}`.
///
/// Test cases run strictly sequentially; per-case failures never abort the
/// loop. Only infrastructure faults escape as errors, for the retry layer.
#[instrument(skip(ctx), fields(submission_id = submission_id))]
pub async fn evaluate_submission(
    ctx: &EvalContext,
    submission_id: i32,
) -> Result<SubmissionStatus, EvalError> {
    let submission = submission::Entity::find_by_id(submission_id)
        .one(&ctx.db)
        .await?
        .ok_or(EvalError::SubmissionNotFound(submission_id))?;

    let test_cases = test_case::Entity::find()
        .filter(test_case::Column::ProblemId.eq(submission.problem_id))
        .order_by_asc(test_case::Column::Position)
        .order_by_asc(test_case::Column::Id)
        .all(&ctx.db)
        .await?;

    if let Some((status, message)) = precheck(&submission.code, test_cases.len()) {
        return finalize_without_cases(ctx, &submission, status, message).await;
    }

    mark_running(&ctx.db, submission.id).await?;
    let total = test_cases.len();
    ctx.notifier
        .publish(submission.id, &ProgressEvent::started(total))
        .await;

    let runner = ctx.runners.get(&submission.language);
    if runner.is_none() {
        warn!(language = %submission.language, "No runner for language; all cases will error");
    }

    let mut results = Vec::with_capacity(total);
    for (index, case) in test_cases.iter().enumerate() {
        let result = match runner {
            Some(runner) => run_case(ctx, runner, &submission.code, case).await,
            None => unsupported_language_result(case.id, &case.expected_output, &submission.language),
        };

        insert_case_row(&ctx.db, submission.id, &result).await?;
        ctx.notifier
            .publish(
                submission.id,
                &ProgressEvent::case_completed(case_progress(
                    index + 1,
                    total,
                    &case.input,
                    case.is_public,
                    &result,
                )),
            )
            .await;
        results.push(result);
    }

    let status = case_result::overall_status(&results);
    let total_time = case_result::total_time(&results);
    let peak = case_result::peak_memory(&results);

    persist_final(
        ctx,
        submission.id,
        status,
        Some(serde_json::to_string(&results)?),
        Some(total_time),
        Some(peak),
    )
    .await?;

    stats::refresh_user_stats(&ctx.db, submission.user_id).await?;

    if status.is_accepted() {
        let user_model = user::Entity::find_by_id(submission.user_id)
            .one(&ctx.db)
            .await?
            .ok_or_else(|| EvalError::RecordNotFound(format!("User {}", submission.user_id)))?;
        let problem_model = problem::Entity::find_by_id(submission.problem_id)
            .one(&ctx.db)
            .await?
            .ok_or_else(|| {
                EvalError::RecordNotFound(format!("Problem {}", submission.problem_id))
            })?;

        let gained = stats::apply_acceptance_rewards(
            &ctx.db,
            &user_model,
            problem_model.difficulty,
            total_time,
            peak,
            Utc::now().date_naive(),
        )
        .await?;

        info!(
            username = %user_model.username,
            difficulty = %problem_model.difficulty,
            points = gained,
            "Experience awarded"
        );
    }

    ctx.notifier
        .publish(submission.id, &ProgressEvent::completed(status))
        .await;

    info!(
        status = %status,
        test_cases = total,
        total_time,
        peak_memory = peak,
        "Evaluation finished"
    );

    Ok(status)
}

/// Best-effort terminal bookkeeping for evaluations that could not finish:
/// persist the failure, keep the user's aggregates current, and close the
/// progress stream. Used by the retry layer; never errors.
pub async fn record_failure(
    ctx: &EvalContext,
    submission_id: i32,
    message: &str,
    status: SubmissionStatus,
) {
    if let Err(e) = persist_final(ctx, submission_id, status, Some(message.to_string()), None, None).await
    {
        error!(submission_id, error = %e, "Failed to persist failure status");
    }

    match submission::Entity::find_by_id(submission_id).one(&ctx.db).await {
        Ok(Some(sub)) => {
            if let Err(e) = stats::refresh_user_stats(&ctx.db, sub.user_id).await {
                warn!(submission_id, error = %e, "Failed to refresh user stats after failure");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(submission_id, error = %e, "Failed to load submission after failure"),
    }

    ctx.notifier
        .publish(submission_id, &ProgressEvent::error(message))
        .await;
}

/// Terminal short-circuits decided before any test case runs. Empty code
/// takes priority over a caseless problem.
fn precheck(code: &str, test_case_count: usize) -> Option<(SubmissionStatus, &'static str)> {
    if code.trim().is_empty() {
        return Some((SubmissionStatus::CompilationError, "empty code"));
    }
    if test_case_count == 0 {
        return Some((SubmissionStatus::Error, "no test cases"));
    }
    None
}

/// Terminal path for submissions that never run a test case (empty code,
/// zero test cases). No case rows are created.
async fn finalize_without_cases(
    ctx: &EvalContext,
    submission: &submission::Model,
    status: SubmissionStatus,
    message: &str,
) -> Result<SubmissionStatus, EvalError> {
    persist_final(ctx, submission.id, status, Some(message.to_string()), None, None).await?;
    stats::refresh_user_stats(&ctx.db, submission.user_id).await?;

    let event = if status == SubmissionStatus::Error {
        ProgressEvent::error(message)
    } else {
        ProgressEvent::completed(status)
    };
    ctx.notifier.publish(submission.id, &event).await;

    info!(status = %status, message, "Evaluation terminated without running test cases");
    Ok(status)
}

async fn mark_running(db: &DatabaseConnection, submission_id: i32) -> Result<(), EvalError> {
    let update = submission::ActiveModel {
        id: Set(submission_id),
        status: Set(SubmissionStatus::Running),
        ..Default::default()
    };
    update.update(db).await?;
    Ok(())
}

async fn persist_final(
    ctx: &EvalContext,
    submission_id: i32,
    status: SubmissionStatus,
    output: Option<String>,
    time: Option<f64>,
    memory: Option<f64>,
) -> Result<(), EvalError> {
    let update = submission::ActiveModel {
        id: Set(submission_id),
        status: Set(status),
        output: Set(output),
        time: Set(time),
        memory: Set(memory),
        judged_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    update.update(&ctx.db).await?;
    Ok(())
}

async fn insert_case_row(
    db: &DatabaseConnection,
    submission_id: i32,
    result: &CaseResult,
) -> Result<(), EvalError> {
    let row = test_case_result::ActiveModel {
        submission_id: Set(submission_id),
        test_case_id: Set(result.test_case_id),
        status: Set(result.status),
        output: Set(result.output.clone()),
        expected_output: Set(result.expected.clone()),
        execution_time: Set(result.execution_time),
        peak_memory: Set(result.peak_memory),
        error_message: Set(result.error_message.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    row.insert(db).await?;
    Ok(())
}

async fn run_case(
    ctx: &EvalContext,
    runner: &dyn CodeRunner,
    code: &str,
    case: &test_case::Model,
) -> CaseResult {
    let input = Value::parse(&case.input);
    let outcome = runner.run(code, &input).await;
    case_result_from_outcome(outcome, case.id, &case.expected_output, ctx.tolerance)
}

/// Map one runner outcome to a persisted case result. Comparison happens
/// here: the expected text goes through the same normalizer and scalar
/// wrapping as the produced value.
fn case_result_from_outcome(
    outcome: RunOutcome,
    test_case_id: i32,
    expected_output: &str,
    tolerance: f64,
) -> CaseResult {
    let base = CaseResult {
        test_case_id,
        status: CaseStatus::Error,
        output: None,
        expected: expected_output.to_string(),
        execution_time: None,
        peak_memory: None,
        error_message: None,
    };

    match outcome {
        RunOutcome::Completed {
            result,
            execution_time,
            peak_memory,
        } => {
            let expected = Value::parse(expected_output).into_comparison_form();
            let passed = comparator::outputs_match(&result, &expected, tolerance);
            CaseResult {
                status: if passed {
                    CaseStatus::Passed
                } else {
                    CaseStatus::Failed
                },
                output: Some(result.to_string()),
                execution_time: Some(execution_time),
                peak_memory: Some(peak_memory),
                ..base
            }
        }
        RunOutcome::TimeLimitExceeded => CaseResult {
            status: CaseStatus::TimeLimitExceeded,
            ..base
        },
        RunOutcome::MemoryLimitExceeded => CaseResult {
            status: CaseStatus::MemoryLimitExceeded,
            ..base
        },
        RunOutcome::RuntimeError(detail) => CaseResult {
            status: CaseStatus::RuntimeError,
            error_message: Some(detail),
            ..base
        },
        RunOutcome::NoEntryPoint => CaseResult {
            status: CaseStatus::Error,
            error_message: Some("no callable entry point in submitted code".to_string()),
            ..base
        },
        RunOutcome::ParameterMismatch(detail) => CaseResult {
            status: CaseStatus::Error,
            error_message: Some(detail),
            ..base
        },
        RunOutcome::CompilationError(detail) => CaseResult {
            status: CaseStatus::CompilationError,
            error_message: Some(detail),
            ..base
        },
    }
}

fn unsupported_language_result(
    test_case_id: i32,
    expected_output: &str,
    language: &str,
) -> CaseResult {
    CaseResult {
        test_case_id,
        status: CaseStatus::Error,
        output: None,
        expected: expected_output.to_string(),
        execution_time: None,
        peak_memory: None,
        error_message: Some(format!("unsupported language '{language}'")),
    }
}

fn case_progress(
    number: usize,
    total: usize,
    input: &str,
    is_public: bool,
    result: &CaseResult,
) -> CaseProgress {
    CaseProgress {
        test_case_number: number,
        total_test_cases: total,
        status: result.status,
        // Private cases grade without echoing their data back to the client.
        input: is_public.then(|| input.to_string()),
        output: result.output.clone(),
        expected: is_public.then(|| result.expected.clone()),
        execution_time: result.execution_time,
        peak_memory: result.peak_memory,
        error_message: result.error_message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::DEFAULT_TOLERANCE;

    fn completed(result: Value, time: f64, memory: f64) -> RunOutcome {
        RunOutcome::Completed {
            result: result.into_comparison_form(),
            execution_time: time,
            peak_memory: memory,
        }
    }

    #[test]
    fn test_precheck_terminal_paths() {
        // Empty or whitespace code never runs a case.
        assert_eq!(
            precheck("", 3),
            Some((SubmissionStatus::CompilationError, "empty code"))
        );
        assert_eq!(
            precheck("  \n\t ", 3),
            Some((SubmissionStatus::CompilationError, "empty code"))
        );
        // A problem without test cases is an evaluation error.
        assert_eq!(
            precheck("def solve(): return 1", 0),
            Some((SubmissionStatus::Error, "no test cases"))
        );
        // Empty code wins over a caseless problem.
        assert_eq!(
            precheck("", 0),
            Some((SubmissionStatus::CompilationError, "empty code"))
        );
        assert_eq!(precheck("def solve(): return 1", 3), None);
    }

    #[test]
    fn test_sum_scenario_passes() {
        // `solve(2, 3)` returned 5, expected text "5": [5] vs [5].
        let outcome = completed(Value::Number(5.0), 0.01, 0.3);
        let result = case_result_from_outcome(outcome, 1, "5", DEFAULT_TOLERANCE);
        assert_eq!(result.status, CaseStatus::Passed);
        assert_eq!(result.output.as_deref(), Some("[5]"));
        assert_eq!(result.execution_time, Some(0.01));
    }

    #[test]
    fn test_wrong_value_fails() {
        let outcome = completed(Value::Number(6.0), 0.01, 0.3);
        let result = case_result_from_outcome(outcome, 1, "5", DEFAULT_TOLERANCE);
        assert_eq!(result.status, CaseStatus::Failed);
    }

    #[test]
    fn test_tolerant_float_comparison() {
        let outcome = completed(Value::Number(0.33333333), 0.01, 0.3);
        let result = case_result_from_outcome(outcome, 1, "0.3333333", DEFAULT_TOLERANCE);
        assert_eq!(result.status, CaseStatus::Passed);
    }

    #[test]
    fn test_runtime_error_keeps_exception_text() {
        let outcome = RunOutcome::RuntimeError("ZeroDivisionError: division by zero".into());
        let result = case_result_from_outcome(outcome, 1, "5", DEFAULT_TOLERANCE);
        assert_eq!(result.status, CaseStatus::RuntimeError);
        assert_eq!(
            result.error_message.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
        assert!(result.execution_time.is_none());
    }

    #[test]
    fn test_time_limit_has_no_metrics() {
        let result =
            case_result_from_outcome(RunOutcome::TimeLimitExceeded, 1, "5", DEFAULT_TOLERANCE);
        assert_eq!(result.status, CaseStatus::TimeLimitExceeded);
        assert!(result.execution_time.is_none());
        assert!(result.peak_memory.is_none());
    }

    #[test]
    fn test_harness_faults_map_to_error() {
        let no_entry =
            case_result_from_outcome(RunOutcome::NoEntryPoint, 1, "5", DEFAULT_TOLERANCE);
        assert_eq!(no_entry.status, CaseStatus::Error);

        let mismatch = case_result_from_outcome(
            RunOutcome::ParameterMismatch("expected parameters ['a'], got ['b']".into()),
            1,
            "5",
            DEFAULT_TOLERANCE,
        );
        assert_eq!(mismatch.status, CaseStatus::Error);
        assert!(mismatch.error_message.unwrap().contains("expected parameters"));
    }

    #[test]
    fn test_mixed_run_aggregates() {
        // 2 passed + 1 failed: overall WrongAnswer, time summed, memory maxed.
        let results = vec![
            case_result_from_outcome(completed(Value::Number(1.0), 0.2, 3.0), 1, "1", DEFAULT_TOLERANCE),
            case_result_from_outcome(completed(Value::Number(2.0), 0.3, 8.0), 2, "2", DEFAULT_TOLERANCE),
            case_result_from_outcome(completed(Value::Number(9.0), 0.1, 1.0), 3, "3", DEFAULT_TOLERANCE),
        ];
        assert_eq!(case_result::overall_status(&results), SubmissionStatus::WrongAnswer);
        assert!((case_result::total_time(&results) - 0.6).abs() < 1e-9);
        assert!((case_result::peak_memory(&results) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_passed_is_accepted() {
        let results = vec![
            case_result_from_outcome(completed(Value::Number(1.0), 0.2, 3.0), 1, "1", DEFAULT_TOLERANCE),
            case_result_from_outcome(completed(Value::Number(2.0), 0.3, 8.0), 2, "2", DEFAULT_TOLERANCE),
        ];
        assert_eq!(case_result::overall_status(&results), SubmissionStatus::Accepted);
    }

    #[test]
    fn test_private_case_redacts_input_and_expected() {
        let result = case_result_from_outcome(
            completed(Value::Number(5.0), 0.01, 0.3),
            1,
            "5",
            DEFAULT_TOLERANCE,
        );

        let public = case_progress(1, 3, "2,3", true, &result);
        assert_eq!(public.input.as_deref(), Some("2,3"));
        assert_eq!(public.expected.as_deref(), Some("5"));

        let private = case_progress(1, 3, "2,3", false, &result);
        assert!(private.input.is_none());
        assert!(private.expected.is_none());
        // The submitter always sees their own output.
        assert_eq!(private.output.as_deref(), Some("[5]"));
    }

    #[test]
    fn test_unsupported_language() {
        let result = unsupported_language_result(4, "5", "cobol");
        assert_eq!(result.status, CaseStatus::Error);
        assert_eq!(
            result.error_message.as_deref(),
            Some("unsupported language 'cobol'")
        );
    }
}
