use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use super::{clip_raw, TargetExecutor};
use crate::types::{OperationOutcome, Target};

/// Runs the privileged cutover script with the environment name as its only
/// argument. Exit code 0 is success; anything else, including a timeout, is
/// a failure.
pub struct SwitchScriptExecutor {
    script: PathBuf,
    timeout: Duration,
}

impl SwitchScriptExecutor {
    pub fn new(script: PathBuf, timeout: Duration) -> Self {
        Self { script, timeout }
    }
}

#[async_trait]
impl TargetExecutor for SwitchScriptExecutor {
    async fn execute(&self, target: &Target, environment: &str) -> OperationOutcome {
        let start = Instant::now();
        let script = self.script.display().to_string();
        tracing::info!(script = %script, environment, target = %target.id, "running switch script");

        let mut cmd = Command::new(&self.script);
        cmd.arg(environment)
            .env("DEPLOYBOT_TARGET", &target.id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the output future on timeout must take the child down too.
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                tracing::warn!(script = %script, environment, "switch script timed out");
                return OperationOutcome::failure(
                    &target.id,
                    format!(
                        "{environment} switch timed out after {}s",
                        self.timeout.as_secs()
                    ),
                    None,
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(script = %script, error = %e, "failed to spawn switch script");
                return OperationOutcome::failure(
                    &target.id,
                    format!("failed to run switch script '{script}'"),
                    Some(e.to_string()),
                );
            }
            Ok(Ok(output)) => output,
        };

        let duration = start.elapsed().as_secs_f64();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            tracing::info!(environment, duration_seconds = duration, "switch script succeeded");
            return OperationOutcome::success(
                &target.id,
                format!("{environment} switch succeeded"),
            );
        }

        let reason = match output.status.code() {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        };
        tracing::warn!(environment, %reason, duration_seconds = duration, "switch script failed");

        let raw = if stderr.trim().is_empty() { stdout } else { stderr };
        OperationOutcome::failure(
            &target.id,
            format!("{environment} switch failed: script {reason}"),
            Some(clip_raw(&raw)),
        )
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn run(script: &str, environment: &str, timeout: Duration) -> OperationOutcome {
        SwitchScriptExecutor::new(PathBuf::from(script), timeout)
            .execute(&Target::new("cutover"), environment)
            .await
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let outcome = run("/bin/echo", "pm", Duration::from_secs(5)).await;
        assert!(outcome.succeeded, "{outcome:?}");
        assert_eq!(outcome.target_id, "cutover");
        assert_eq!(outcome.message, "pm switch succeeded");
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure_with_code() {
        let outcome = run("/bin/false", "pm", Duration::from_secs(5)).await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.message, "pm switch failed: script exited with code 1");
    }

    #[tokio::test]
    async fn stderr_is_captured_as_raw_error() {
        let outcome = run("/bin/ls", "/nonexistent-deploybot-dir", Duration::from_secs(5)).await;
        assert!(!outcome.succeeded);
        let raw = outcome.raw_error.expect("stderr should be captured");
        assert!(raw.contains("nonexistent-deploybot-dir"), "got: {raw}");
    }

    #[tokio::test]
    async fn timeout_is_reported_distinctly() {
        let started = Instant::now();
        let outcome = run("/bin/sleep", "5", Duration::from_millis(200)).await;
        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("timed out"), "got: {}", outcome.message);
        assert!(!outcome.message.contains("exited with code"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_script_is_failure_not_panic() {
        let outcome = run("/nonexistent/switch.sh", "pm", Duration::from_secs(5)).await;
        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("failed to run switch script"));
        assert!(outcome.raw_error.is_some());
    }
}
