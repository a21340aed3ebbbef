use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use common::Value;

use super::{CodeRunner, RunOutcome};

/// Driver executed next to the candidate module; reports the outcome as one
/// JSON line on stdout.
const HARNESS: &str = include_str!("harness.py");

/// Resource ceilings applied to one candidate invocation.
#[derive(Clone, Debug)]
pub struct RunLimits {
    /// Wall-clock ceiling on the candidate invocation; the verdict boundary.
    pub time_limit: Duration,
    /// Extra allowance on the hard kill deadline for interpreter startup.
    pub startup_grace: Duration,
    /// Address-space ceiling in MiB, enforced via rlimit where the platform
    /// supports it.
    pub memory_limit_mb: u64,
}

/// Executes Python candidates in a throwaway subprocess: fresh temp
/// directory per invocation, restricted environment, rlimit memory ceiling,
/// and a hard kill once the deadline passes.
pub struct PythonRunner {
    python_bin: String,
    limits: RunLimits,
}

impl PythonRunner {
    pub fn new(python_bin: String, limits: RunLimits) -> Self {
        Self { python_bin, limits }
    }

    async fn run_inner(&self, code: &str, input: &Value) -> std::io::Result<RunOutcome> {
        // Single-use execution unit; the directory and both files are removed
        // on every exit path when the TempDir drops.
        let dir = TempDir::with_prefix("arbiter-run-")?;
        tokio::fs::write(dir.path().join("solution.py"), code).await?;
        tokio::fs::write(dir.path().join("harness.py"), HARNESS).await?;

        let payload = serde_json::json!({ "input": serde_json::Value::from(input) });

        let mut command = Command::new(&self.python_bin);
        command
            .arg("harness.py")
            .current_dir(dir.path())
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        apply_memory_ceiling(&mut command, self.limits.memory_limit_mb);

        let started = Instant::now();
        let mut child = command.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A write failure means the child already died; the exit status
            // tells the rest of the story.
            if let Err(e) = stdin.write_all(payload.to_string().as_bytes()).await {
                debug!(error = %e, "Candidate exited before reading its input");
            }
        }

        let deadline = self.limits.time_limit + self.limits.startup_grace;
        let outcome = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(output) => classify_output(&output?, started.elapsed(), deadline, &self.limits),
            // kill_on_drop reaps the overrunning child.
            Err(_) => RunOutcome::TimeLimitExceeded,
        };

        // Cleanup failures must not change the verdict, only leave a trace.
        if let Err(e) = dir.close() {
            warn!(error = %e, "Failed to remove execution directory");
        }

        Ok(outcome)
    }
}

fn classify_output(
    output: &std::process::Output,
    elapsed: Duration,
    deadline: Duration,
    limits: &RunLimits,
) -> RunOutcome {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    match parse_report(&stdout) {
        Some(report) => classify_report(report, limits),
        None => {
            // The interpreter died without reporting: hard OOM kill, signal,
            // or a missing interpreter.
            if elapsed >= deadline {
                RunOutcome::TimeLimitExceeded
            } else if looks_like_memory_failure(&stderr) {
                RunOutcome::MemoryLimitExceeded
            } else if stderr.trim().is_empty() {
                RunOutcome::RuntimeError(format!("interpreter exited with {}", output.status))
            } else {
                RunOutcome::RuntimeError(stderr.trim().to_string())
            }
        }
    }
}

#[async_trait]
impl CodeRunner for PythonRunner {
    fn language(&self) -> &'static str {
        "python"
    }

    fn accepts(&self, language: &str) -> bool {
        matches!(language.to_ascii_lowercase().as_str(), "python" | "python3" | "py")
    }

    async fn run(&self, code: &str, input: &Value) -> RunOutcome {
        match self.run_inner(code, input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Sandbox setup failed");
                RunOutcome::RuntimeError(format!("sandbox failure: {e}"))
            }
        }
    }
}

/// Structured report printed by the harness as its last stdout line.
#[derive(Debug, Deserialize)]
struct HarnessReport {
    ok: bool,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    execution_time: Option<f64>,
    #[serde(default)]
    peak_memory: Option<f64>,
}

fn parse_report(stdout: &str) -> Option<HarnessReport> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    serde_json::from_str(line).ok()
}

fn classify_report(report: HarnessReport, limits: &RunLimits) -> RunOutcome {
    if report.ok {
        let execution_time = report.execution_time.unwrap_or_default();
        // A call that returned after the ceiling is still a limit violation;
        // the late result is not accepted.
        if execution_time > limits.time_limit.as_secs_f64() {
            return RunOutcome::TimeLimitExceeded;
        }
        let result = report
            .result
            .map(Value::from)
            .unwrap_or(Value::Null)
            .into_comparison_form();
        return RunOutcome::Completed {
            result,
            execution_time,
            peak_memory: report.peak_memory.unwrap_or_default(),
        };
    }

    let detail = report.detail.unwrap_or_default();
    match report.kind.as_deref() {
        Some("compilation_error") => RunOutcome::CompilationError(detail),
        Some("memory_limit_exceeded") => RunOutcome::MemoryLimitExceeded,
        Some("no_entry_point") => RunOutcome::NoEntryPoint,
        Some("parameter_mismatch") => RunOutcome::ParameterMismatch(detail),
        Some("runtime_error") => RunOutcome::RuntimeError(detail),
        other => RunOutcome::RuntimeError(format!("unrecognized harness report: {other:?}")),
    }
}

fn looks_like_memory_failure(stderr: &str) -> bool {
    stderr.contains("MemoryError") || stderr.contains("Cannot allocate memory")
}

#[cfg(unix)]
fn apply_memory_ceiling(command: &mut Command, limit_mb: u64) {
    let bytes = limit_mb.saturating_mul(1024 * 1024);
    // SAFETY: setrlimit is async-signal-safe and runs in the forked child
    // before exec, with no other threads in that process.
    unsafe {
        command.pre_exec(move || {
            let limit = libc::rlimit {
                rlim_cur: bytes as libc::rlim_t,
                rlim_max: bytes as libc::rlim_t,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn apply_memory_ceiling(_command: &mut Command, limit_mb: u64) {
    warn!(
        limit_mb,
        "Memory ceiling cannot be enforced on this platform; running without it"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RunLimits {
        RunLimits {
            time_limit: Duration::from_secs(2),
            startup_grace: Duration::from_secs(1),
            memory_limit_mb: 50,
        }
    }

    #[test]
    fn test_parse_report_takes_last_line() {
        let stdout = "candidate noise\n{\"ok\": true, \"result\": 5, \"execution_time\": 0.1, \"peak_memory\": 0.2}\n";
        let report = parse_report(stdout).unwrap();
        assert!(report.ok);
        assert_eq!(report.execution_time, Some(0.1));
    }

    #[test]
    fn test_parse_report_rejects_garbage() {
        assert!(parse_report("").is_none());
        assert!(parse_report("Traceback (most recent call last):").is_none());
    }

    #[test]
    fn test_classify_success_wraps_scalar() {
        let report = parse_report("{\"ok\": true, \"result\": 5, \"execution_time\": 0.01, \"peak_memory\": 0.5}").unwrap();
        match classify_report(report, &limits()) {
            RunOutcome::Completed { result, .. } => {
                assert_eq!(result, Value::Sequence(vec![Value::Number(5.0)]));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_late_return_is_time_limit() {
        let report = parse_report("{\"ok\": true, \"result\": 5, \"execution_time\": 2.4, \"peak_memory\": 0.5}").unwrap();
        assert_eq!(
            classify_report(report, &limits()),
            RunOutcome::TimeLimitExceeded
        );
    }

    #[test]
    fn test_classify_failure_kinds() {
        let cases = [
            ("no_entry_point", RunOutcome::NoEntryPoint),
            ("memory_limit_exceeded", RunOutcome::MemoryLimitExceeded),
        ];
        for (kind, expected) in cases {
            let raw = format!("{{\"ok\": false, \"kind\": \"{kind}\"}}");
            let report = parse_report(&raw).unwrap();
            assert_eq!(classify_report(report, &limits()), expected);
        }

        let raw = "{\"ok\": false, \"kind\": \"runtime_error\", \"detail\": \"ZeroDivisionError: division by zero\"}";
        let report = parse_report(raw).unwrap();
        assert_eq!(
            classify_report(report, &limits()),
            RunOutcome::RuntimeError("ZeroDivisionError: division by zero".into())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_interpreter_death_classification() {
        use std::os::unix::process::ExitStatusExt;

        let dead = |stderr: &[u8]| std::process::Output {
            status: std::process::ExitStatus::from_raw(256),
            stdout: Vec::new(),
            stderr: stderr.to_vec(),
        };

        // Hard OOM kill leaves a MemoryError trace and no report.
        assert_eq!(
            classify_output(&dead(b"MemoryError\n"), Duration::from_millis(100), Duration::from_secs(3), &limits()),
            RunOutcome::MemoryLimitExceeded
        );

        // Death at the deadline without a report is a time limit violation.
        assert_eq!(
            classify_output(&dead(b""), Duration::from_secs(3), Duration::from_secs(3), &limits()),
            RunOutcome::TimeLimitExceeded
        );

        // Anything else surfaces the interpreter's stderr.
        match classify_output(&dead(b"Traceback: boom"), Duration::from_millis(100), Duration::from_secs(3), &limits()) {
            RunOutcome::RuntimeError(detail) => assert!(detail.contains("boom")),
            other => panic!("expected RuntimeError, got {other:?}"),
        }
    }

    #[test]
    fn test_memory_failure_detection() {
        assert!(looks_like_memory_failure("MemoryError\n"));
        assert!(looks_like_memory_failure("fatal: Cannot allocate memory"));
        assert!(!looks_like_memory_failure("NameError: x"));
    }
}
