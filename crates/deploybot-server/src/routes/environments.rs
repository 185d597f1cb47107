use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    #[serde(default)]
    pub environment: String,
}

/// POST /sync-env | /switch-env: run a batch for one environment.
///
/// 200 with the aggregate on full success, 500 with the aggregate as
/// `details` on any failed target, 400 for an unknown environment.
pub async fn trigger(
    State(app): State<AppState>,
    body: Result<Json<TriggerBody>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let Json(body) = body.map_err(|e| AppError::bad_request(format!("Invalid request body: {e}")))?;

    let Some(environment) = app.orchestrator.environment(&body.environment) else {
        tracing::warn!(environment = %body.environment, "rejected trigger for unknown environment");
        return Err(AppError::bad_request(format!(
            "Invalid environment. {}",
            app.environment_hint()
        )));
    };

    let result = app.orchestrator.run_batch(environment).await;

    if result.overall_succeeded {
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "result": result,
            })),
        ))
    } else {
        Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": "error",
                "message": result.message,
                "details": result,
            })),
        ))
    }
}

/// GET /environments: configured environments and their targets.
pub async fn list_environments(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "mode": app.orchestrator.mode(),
        "environments": app.orchestrator.environments(),
    }))
}
