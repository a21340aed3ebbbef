pub mod python;

pub use python::{PythonRunner, RunLimits};

use async_trait::async_trait;
use common::Value;

/// Result of executing one candidate program against one input value.
/// Failures are values, never panics; nothing from the sandbox escapes as an
/// error past this boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Completed {
        /// Produced value in comparison form (scalars wrapped into a
        /// one-element sequence).
        result: Value,
        /// Seconds spent in the candidate invocation, setup excluded.
        execution_time: f64,
        /// Peak memory of the invocation in MiB.
        peak_memory: f64,
    },
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError(String),
    /// The submitted module defines no callable.
    NoEntryPoint,
    /// A mapping input did not match the entry point's parameter names.
    ParameterMismatch(String),
    /// The module failed to load (syntax error).
    CompilationError(String),
}

/// One execution strategy per supported source language. Implementations own
/// their process isolation and resource ceilings.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Canonical language tag, e.g. "python".
    fn language(&self) -> &'static str;

    /// True if this runner accepts the given language label.
    fn accepts(&self, language: &str) -> bool;

    async fn run(&self, code: &str, input: &Value) -> RunOutcome;
}

/// Registry of the runners this worker is configured with.
pub struct Runners {
    runners: Vec<Box<dyn CodeRunner>>,
}

impl Runners {
    pub fn new(runners: Vec<Box<dyn CodeRunner>>) -> Self {
        Self { runners }
    }

    pub fn get(&self, language: &str) -> Option<&dyn CodeRunner> {
        self.runners
            .iter()
            .find(|r| r.accepts(language))
            .map(Box::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry() -> Runners {
        Runners::new(vec![Box::new(PythonRunner::new(
            "python3".into(),
            RunLimits {
                time_limit: Duration::from_secs(2),
                startup_grace: Duration::from_secs(1),
                memory_limit_mb: 50,
            },
        ))])
    }

    #[test]
    fn test_language_lookup() {
        let runners = registry();
        assert!(runners.get("python").is_some());
        assert!(runners.get("Python3").is_some());
        assert!(runners.get("java").is_none());
    }
}
