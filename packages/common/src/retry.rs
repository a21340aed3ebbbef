use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single retry attempt record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: u8,
    /// Error message from the failed attempt.
    pub error: String,
    /// When this attempt occurred.
    pub timestamp: DateTime<Utc>,
}

impl RetryAttempt {
    pub fn new(attempt: u8, error: impl Into<String>) -> Self {
        Self {
            attempt,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u8, delay: Duration },
    Exhausted,
}

/// Bounded retry with a fixed delay between attempts.
///
/// Retries cover infrastructure failures only (submission not visible yet,
/// transient storage errors). Legitimate verdicts are outcomes, never
/// retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u8,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u8, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Decide for the given 1-based failure count.
    pub fn decide(&self, attempt: u8) -> RetryDecision {
        if attempt <= self.max_retries {
            RetryDecision::Retry {
                attempt,
                delay: self.delay,
            }
        } else {
            RetryDecision::Exhausted
        }
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    /// Three retries, five seconds apart.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Attempt history for one job, kept for diagnostics when retries exhaust.
#[derive(Debug, Default)]
pub struct AttemptLog {
    attempts: Vec<RetryAttempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; returns the 1-based failure count.
    pub fn record(&mut self, error: impl Into<String>) -> u8 {
        let attempt = self.attempts.len() as u8 + 1;
        self.attempts.push(RetryAttempt::new(attempt, error));
        attempt
    }

    pub fn count(&self) -> u8 {
        self.attempts.len() as u8
    }

    pub fn attempts(&self) -> &[RetryAttempt] {
        &self.attempts
    }

    /// Message of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.error.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_up_to_bound() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));

        for attempt in 1..=3 {
            match policy.decide(attempt) {
                RetryDecision::Retry { attempt: a, delay } => {
                    assert_eq!(a, attempt);
                    assert_eq!(delay, Duration::from_secs(5));
                }
                RetryDecision::Exhausted => panic!("expected Retry on attempt {attempt}"),
            }
        }

        assert_eq!(policy.decide(4), RetryDecision::Exhausted);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(250));
        let delays: Vec<Duration> = (1..=3)
            .filter_map(|n| match policy.decide(n) {
                RetryDecision::Retry { delay, .. } => Some(delay),
                RetryDecision::Exhausted => None,
            })
            .collect();
        assert_eq!(delays, vec![Duration::from_millis(250); 3]);
    }

    #[test]
    fn test_zero_retries_exhausts_immediately() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.decide(1), RetryDecision::Exhausted);
    }

    #[test]
    fn test_attempt_log() {
        let mut log = AttemptLog::new();
        assert_eq!(log.record("first"), 1);
        assert_eq!(log.record("second"), 2);
        assert_eq!(log.count(), 2);
        assert_eq!(log.last_error(), Some("second"));
        assert_eq!(log.attempts()[0].attempt, 1);
        assert_eq!(log.attempts()[1].attempt, 2);
    }
}
