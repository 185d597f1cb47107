pub mod error;
pub mod routes;
pub mod runtime;
pub mod slack;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use tower_http::trace::TraceLayer;

pub use runtime::{run, serve_listeners};
pub use state::AppState;

/// Build the axum Router with all routes and middleware.
///
/// The command-trigger path follows the deploy mode: `/sync-env` in sync
/// mode, `/switch-env` in switch mode.
pub fn build_router(app_state: AppState) -> Router {
    let trigger_path = app_state.orchestrator.mode().trigger_path();

    Router::new()
        .route("/health", get(routes::health::health))
        .route(trigger_path, post(routes::environments::trigger))
        .route("/environments", get(routes::environments::list_environments))
        .route("/detect", post(routes::detect::detect))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the HTTP API on a pre-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(
    listener: tokio::net::TcpListener,
    app_state: AppState,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("HTTP listener on http://0.0.0.0:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
