use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{clip_raw, TargetExecutor};
use crate::config::ArgoCdCredentials;
use crate::error::{DeployBotError, Result};
use crate::types::{OperationOutcome, Target};

/// Requests an application sync from the Argo CD API.
///
/// Uses conservative options: no pruning, no forced apply, no dry run.
pub struct ArgoCdSyncExecutor {
    client: reqwest::Client,
    server_url: String,
    auth_token: String,
    timeout: Duration,
}

impl ArgoCdSyncExecutor {
    pub fn new(creds: ArgoCdCredentials, timeout: Duration, insecure_tls: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()
            .map_err(|e| DeployBotError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            server_url: creds.server_url.trim_end_matches('/').to_string(),
            auth_token: creds.auth_token,
            timeout,
        })
    }

    fn sync_url(&self, app: &str) -> String {
        format!("{}/api/v1/applications/{app}/sync", self.server_url)
    }
}

fn sync_body() -> serde_json::Value {
    json!({
        "prune": false,
        "dryRun": false,
        "strategy": {
            "apply": {
                "force": false
            }
        }
    })
}

#[async_trait]
impl TargetExecutor for ArgoCdSyncExecutor {
    async fn execute(&self, target: &Target, environment: &str) -> OperationOutcome {
        let app = target.id.as_str();
        tracing::debug!(app, environment, "requesting argocd sync");

        let response = self
            .client
            .post(self.sync_url(app))
            .bearer_auth(&self.auth_token)
            .json(&sync_body())
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                tracing::warn!(app, "argocd sync timed out");
                return OperationOutcome::failure(
                    app,
                    format!(
                        "{app} sync failed: timed out after {}s",
                        self.timeout.as_secs()
                    ),
                    Some(e.to_string()),
                );
            }
            Err(e) => {
                tracing::warn!(app, error = %e, "argocd sync request failed");
                return OperationOutcome::failure(
                    app,
                    format!("{app} sync failed: {e}"),
                    Some(e.to_string()),
                );
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            tracing::info!(app, "argocd sync accepted");
            return OperationOutcome::success(app, format!("{app} sync succeeded"));
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(app, status = status.as_u16(), "argocd sync rejected");
        OperationOutcome::failure(
            app,
            format!("{app} sync failed: HTTP {}", status.as_u16()),
            Some(clip_raw(&body)),
        )
    }
}
