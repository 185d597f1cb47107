use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use deploybot_core::DeployBotError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit status codes
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 through the `anyhow::Error` chain.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

/// Carries an explicit HTTP 503 through the `anyhow::Error` chain.
#[derive(Debug)]
struct UnavailableError(String);

impl std::fmt::Display for UnavailableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UnavailableError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Renders as `{"error": "..."}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self(UnavailableError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequestError>().is_some() {
            StatusCode::BAD_REQUEST
        } else if self.0.downcast_ref::<UnavailableError>().is_some() {
            StatusCode::SERVICE_UNAVAILABLE
        } else if let Some(e) = self.0.downcast_ref::<DeployBotError>() {
            match e {
                DeployBotError::UnknownEnvironment(_) | DeployBotError::UnknownMode(_) => {
                    StatusCode::BAD_REQUEST
                }
                DeployBotError::Reply(_) => StatusCode::BAD_GATEWAY,
                DeployBotError::MissingEnvVar(_)
                | DeployBotError::InvalidConfig(_)
                | DeployBotError::HttpClient(_)
                | DeployBotError::Io(_)
                | DeployBotError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
