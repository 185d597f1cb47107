use deploybot_core::{Orchestrator, ReplySink};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state passed to all route handlers. Read-only after
/// startup.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: Instant,
    /// Destination for `/detect` alerts, when a channel is configured.
    pub notify: Option<Arc<dyn ReplySink>>,
    pub recovery_marker: String,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: Instant::now(),
            notify: None,
            recovery_marker: String::new(),
        }
    }

    pub fn with_notifier(mut self, sink: Arc<dyn ReplySink>, recovery_marker: impl Into<String>) -> Self {
        self.notify = Some(sink);
        self.recovery_marker = recovery_marker.into();
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// "Use 'pm' or 'prd'" hint for invalid environment names.
    pub fn environment_hint(&self) -> String {
        let names: Vec<String> = self
            .orchestrator
            .environments()
            .iter()
            .map(|e| format!("'{}'", e.name))
            .collect();
        match names.len() {
            0 => String::new(),
            1 => format!("Use {}", names[0]),
            n => format!("Use {} or {}", names[..n - 1].join(", "), names[n - 1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deploybot_core::{DeployMode, Environment, OperationOutcome, Target, TargetExecutor};

    struct Noop;

    #[async_trait]
    impl TargetExecutor for Noop {
        async fn execute(&self, target: &Target, _environment: &str) -> OperationOutcome {
            OperationOutcome::success(&target.id, "ok")
        }
    }

    fn state(envs: Vec<Environment>) -> AppState {
        AppState::new(Arc::new(Orchestrator::new(DeployMode::Sync, envs, Arc::new(Noop))))
    }

    #[test]
    fn new_state_starts_with_zero_uptime() {
        let state = state(vec![Environment::new("pm", ["a"])]);
        assert_eq!(state.uptime_seconds(), 0);
        assert!(state.notify.is_none());
    }

    #[test]
    fn environment_hint_lists_configured_names() {
        let two = state(vec![
            Environment::new("pm", ["a"]),
            Environment::new("prd", ["b"]),
        ]);
        assert_eq!(two.environment_hint(), "Use 'pm' or 'prd'");

        let three = state(vec![
            Environment::new("dev", ["a"]),
            Environment::new("pm", ["b"]),
            Environment::new("prd", ["c"]),
        ]);
        assert_eq!(three.environment_hint(), "Use 'dev', 'pm' or 'prd'");
    }
}
