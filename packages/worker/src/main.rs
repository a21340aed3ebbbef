mod comparator;
mod config;
mod error;
mod handlers;
mod notifier;
mod runner;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sea_orm::Database;
use tracing::{error, info, warn};

use common::SubmissionStatus;
use common::evaluate_job::EvaluateJob;
use common::retry::{AttemptLog, RetryDecision, RetryPolicy};
use handlers::evaluate::{self, EvalContext};
use mq::{BroccoliError, BrokerMessage, MqConfig, init_mq};
use notifier::ProgressNotifier;
use runner::{PythonRunner, RunLimits, Runners};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = config::WorkerAppConfig::load().context("Failed to load config")?;
    info!("Worker starting: {}", config.worker.id);

    let db = Database::connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    let mq = Arc::new(
        init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        .context("Failed to initialize MQ")?,
    );

    let notifier = ProgressNotifier::connect(&config.mq.url).await;

    let limits = RunLimits {
        time_limit: Duration::from_secs_f64(config.limits.time_limit_secs),
        startup_grace: Duration::from_secs_f64(config.limits.startup_grace_secs),
        memory_limit_mb: config.limits.memory_limit_mb,
    };
    let runners = Runners::new(vec![Box::new(PythonRunner::new(
        config.worker.python_bin.clone(),
        limits,
    ))]);

    let ctx = Arc::new(EvalContext {
        db,
        notifier,
        runners,
        tolerance: config.limits.tolerance,
    });

    let policy = RetryPolicy::new(
        config.retry.max_retries,
        Duration::from_secs(config.retry.delay_secs),
    );

    info!(
        queue_name = %config.mq.queue_name,
        max_retries = policy.max_retries(),
        time_limit_secs = config.limits.time_limit_secs,
        memory_limit_mb = config.limits.memory_limit_mb,
        "MQ connected"
    );

    // One evaluation in flight per worker; the candidate subprocess and its
    // temp directory make each run self-contained, and test cases inside a
    // run are strictly sequential.
    let result = mq
        .process_messages(
            &config.mq.queue_name,
            Some(1),
            None,
            move |message: BrokerMessage<EvaluateJob>| {
                let ctx = Arc::clone(&ctx);
                let policy = policy.clone();
                async move { process_message(message, &ctx, &policy).await }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Worker stopped unexpectedly");
    }

    Ok(())
}

/// Drive one job to a terminal state. Verdicts and non-retryable faults
/// consume the message; infrastructure faults are retried with a fixed delay
/// until the policy exhausts, after which the submission is marked
/// `EvaluationFailed`.
async fn process_message(
    message: BrokerMessage<EvaluateJob>,
    ctx: &EvalContext,
    policy: &RetryPolicy,
) -> Result<(), BroccoliError> {
    let job = message.payload;
    let mut attempts = AttemptLog::new();

    loop {
        match evaluate::evaluate_submission(ctx, job.submission_id).await {
            Ok(status) => {
                info!(
                    submission_id = job.submission_id,
                    job_id = %job.job_id,
                    status = %status,
                    "Job finished"
                );
                return Ok(());
            }
            Err(e) if !e.is_retryable() => {
                error!(
                    submission_id = job.submission_id,
                    job_id = %job.job_id,
                    error = %e,
                    "Evaluation failed with non-retryable error"
                );
                evaluate::record_failure(
                    ctx,
                    job.submission_id,
                    &e.to_string(),
                    SubmissionStatus::Error,
                )
                .await;
                return Ok(());
            }
            Err(e) => {
                let attempt = attempts.record(e.to_string());
                match policy.decide(attempt) {
                    RetryDecision::Retry { delay, .. } => {
                        warn!(
                            submission_id = job.submission_id,
                            job_id = %job.job_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying evaluation"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Exhausted => {
                        error!(
                            submission_id = job.submission_id,
                            job_id = %job.job_id,
                            retry_count = attempts.count(),
                            error = %e,
                            "Retries exhausted, giving up"
                        );
                        evaluate::record_failure(
                            ctx,
                            job.submission_id,
                            attempts.last_error().unwrap_or("evaluation failed"),
                            SubmissionStatus::EvaluationFailed,
                        )
                        .await;
                        return Ok(());
                    }
                }
            }
        }
    }
}
