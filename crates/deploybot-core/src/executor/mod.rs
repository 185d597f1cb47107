//! Target operation executors.
//!
//! An executor performs exactly one operation against one target and always
//! returns an [`OperationOutcome`]. Transport errors, non-success statuses,
//! non-zero exits and timeouts are all folded into a failed outcome here so
//! the batch orchestrator never has to handle an error path.

pub mod argocd;
pub mod script;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{DeployBotError, Result};
use crate::types::{DeployMode, OperationOutcome, Target};

pub use argocd::ArgoCdSyncExecutor;
pub use script::SwitchScriptExecutor;

/// Longest slice of a raw error (response body, stderr) kept in an outcome.
pub const MAX_RAW_ERROR_CHARS: usize = 2000;

#[async_trait]
pub trait TargetExecutor: Send + Sync {
    /// Run the operation for `target` within `environment`. Never fails.
    async fn execute(&self, target: &Target, environment: &str) -> OperationOutcome;
}

/// Build the executor matching the configured deploy mode.
pub fn from_config(config: &Config) -> Result<Arc<dyn TargetExecutor>> {
    match config.mode {
        DeployMode::Sync => {
            let creds = config.argocd.clone().ok_or_else(|| {
                DeployBotError::InvalidConfig("sync mode requires Argo CD credentials".into())
            })?;
            let executor = ArgoCdSyncExecutor::new(
                creds,
                Duration::from_secs(config.settings.argocd.timeout_seconds),
                config.settings.argocd.insecure_tls,
            )?;
            Ok(Arc::new(executor))
        }
        DeployMode::Switch => {
            let script = config.switch_script.clone().ok_or_else(|| {
                DeployBotError::InvalidConfig("switch mode requires a script path".into())
            })?;
            Ok(Arc::new(SwitchScriptExecutor::new(
                script,
                Duration::from_secs(config.settings.switch.timeout_seconds),
            )))
        }
    }
}

/// Trim captured error text to [`MAX_RAW_ERROR_CHARS`] on a char boundary.
pub(crate) fn clip_raw(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_RAW_ERROR_CHARS {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(MAX_RAW_ERROR_CHARS).collect();
    clipped.push('…');
    clipped
}
