use axum::extract::State;
use axum::Json;
use chrono::Local;
use deploybot_core::DeployMode;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    pub mode: DeployMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    pub timestamp: String,
}

/// GET /health: liveness. Sync mode also reports uptime.
pub async fn health(State(app): State<AppState>) -> Json<HealthResponse> {
    let mode = app.orchestrator.mode();
    let uptime_seconds = match mode {
        DeployMode::Sync => Some(app.uptime_seconds()),
        DeployMode::Switch => None,
    };
    Json(HealthResponse {
        status: "healthy",
        message: format!("deploybot {mode} bot is running"),
        mode,
        uptime_seconds,
        timestamp: deploybot_core::report::timestamp(Local::now()),
    })
}
