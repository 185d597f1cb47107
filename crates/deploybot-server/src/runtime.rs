//! Dual-listener runtime: the Slack chat listener and the HTTP listener run
//! side by side over one orchestrator until Ctrl-C.

use anyhow::Context;
use deploybot_core::health::HealthProbe;
use deploybot_core::{executor, CommandRouter, Config, Orchestrator};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::slack::{ChannelSink, ChatListener, SlackApiClient};
use crate::state::AppState;

/// How long listeners get to wind down after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listener {
    Chat,
    Http,
}

/// Bind the configured port and serve both listeners until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    serve_listeners(config, listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await
}

/// Build every component from `config` and serve the chat listener plus the
/// HTTP API on `listener`.
///
/// A listener that ends early is logged and the other one keeps running.
/// Returns once both have ended or `shutdown` has resolved.
pub async fn serve_listeners<F>(
    config: Config,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let slack = config
        .slack
        .as_ref()
        .context("chat listener requires Slack credentials")?;
    let api = SlackApiClient::new(slack);

    let executor = executor::from_config(&config)?;
    let orchestrator = Arc::new(Orchestrator::new(
        config.mode,
        config.environments.clone(),
        executor,
    ));

    let mut app_state = AppState::new(Arc::clone(&orchestrator));
    if let Some(channel) = &config.notify_channel {
        app_state = app_state.with_notifier(
            Arc::new(ChannelSink::new(api.clone(), channel)),
            config.settings.notify.recovery_marker.clone(),
        );
    } else {
        tracing::warn!("RATER_CHANNEL not set; /detect will answer 503");
    }

    let port = listener.local_addr()?.port();
    let router = Arc::new(
        CommandRouter::new(Arc::clone(&orchestrator)).with_health_probe(HealthProbe::local(port)),
    );

    tracing::info!(
        mode = %config.mode,
        environments = ?config.environment_names(),
        "deploybot starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    let http_shutdown = shutdown_rx.clone();
    tasks.spawn(async move {
        let result = crate::serve_on(listener, app_state, wait_for_shutdown(http_shutdown)).await;
        (Listener::Http, result)
    });

    let chat = ChatListener::new(api, router);
    let chat_shutdown = shutdown_rx;
    tasks.spawn(async move {
        let result = chat.run(chat_shutdown).await.map(|_| ());
        (Listener::Chat, result)
    });

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("shutting down");
                let _ = shutdown_tx.send(true);
                break;
            }
            joined = tasks.join_next() => match joined {
                Some(Ok((listener, result))) => log_listener_exit(listener, &result),
                Some(Err(e)) => tracing::error!(error = %e, "listener task panicked"),
                None => return Ok(()),
            },
        }
    }

    let drain = async {
        while let Some(joined) = tasks.join_next().await {
            if let Ok((listener, result)) = joined {
                log_listener_exit(listener, &result);
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!("listeners did not stop within {}s, aborting", SHUTDOWN_GRACE.as_secs());
        tasks.abort_all();
    }
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn log_listener_exit(listener: Listener, result: &anyhow::Result<()>) {
    match result {
        Ok(()) => tracing::info!(?listener, "listener stopped"),
        Err(e) => tracing::error!(?listener, error = %e, "listener failed"),
    }
}
