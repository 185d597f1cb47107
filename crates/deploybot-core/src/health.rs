//! Liveness probe for the HTTP listener, used by the `health` chat command.

use serde::Deserialize;
use std::time::Duration;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Healthy {
        uptime_minutes: Option<u64>,
        timestamp: String,
    },
    Unhealthy(String),
    Down(String),
    Timeout,
    Error(String),
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    uptime_seconds: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
}

pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HealthProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Probe for the listener bound on `port` of this host.
    pub fn local(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{port}/health"))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn check(&self) -> ProbeStatus {
        let response = match self.client.get(&self.url).timeout(PROBE_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return ProbeStatus::Timeout,
            Err(e) if e.is_connect() => {
                return ProbeStatus::Down(format!("connection refused: {e}"))
            }
            Err(e) => return ProbeStatus::Error(e.to_string()),
        };

        if !response.status().is_success() {
            return ProbeStatus::Unhealthy(format!("HTTP {}", response.status().as_u16()));
        }

        match response.json::<HealthBody>().await {
            Ok(body) => ProbeStatus::Healthy {
                uptime_minutes: body.uptime_seconds.map(|s| s / 60),
                timestamp: body.timestamp.unwrap_or_else(|| "unknown".to_string()),
            },
            Err(e) => ProbeStatus::Error(format!("unreadable health response: {e}")),
        }
    }
}

/// Chat text for a probe result.
pub fn describe(status: &ProbeStatus, url: &str) -> String {
    match status {
        ProbeStatus::Healthy {
            uptime_minutes,
            timestamp,
        } => {
            let uptime = uptime_minutes
                .map(|m| format!("{m} min"))
                .unwrap_or_else(|| "n/a".to_string());
            format!(
                "✅ *HTTP listener: healthy*\n📊 Uptime: {uptime}\n🕐 Checked at: {timestamp}\n🌐 Endpoint: {url}"
            )
        }
        ProbeStatus::Down(err) => format!(
            "❌ *HTTP listener: down*\n🔥 Error: {err}\n💡 Restart the bot process"
        ),
        ProbeStatus::Timeout => {
            "⏰ *HTTP listener: slow to respond*\n🔥 Error: request timed out\n💡 The server may be overloaded".to_string()
        }
        ProbeStatus::Unhealthy(err) | ProbeStatus::Error(err) => format!(
            "⚠️ *HTTP listener: error*\n🔥 Error: {err}\n💡 Check the server logs"
        ),
    }
}
