use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DetectBody {
    pub data: String,
}

/// POST /detect: forward a monitoring alert to the notification channel.
pub async fn detect(
    State(app): State<AppState>,
    body: Result<Json<DetectBody>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let Ok(Json(body)) = body else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "status": "error",
                "message": "Invalid request data",
            })),
        ));
    };

    let Some(sink) = app.notify.as_ref() else {
        return Err(AppError::unavailable("no notification channel configured"));
    };

    let text = deploybot_core::report::alert(&body.data, &app.recovery_marker);
    let status = match sink.send(text).await {
        Ok(()) => {
            tracing::info!("alert delivered");
            "success"
        }
        Err(e) => {
            tracing::warn!(error = %e, "alert delivery failed");
            "fail"
        }
    };

    Ok((StatusCode::OK, Json(serde_json::json!({ "status": status }))))
}
