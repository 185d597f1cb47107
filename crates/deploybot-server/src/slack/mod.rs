//! Slack socket-mode chat listener.
//!
//! The websocket runs on a blocking thread ([`socket`]) which acks every
//! envelope and forwards user messages over a bounded channel. A single async
//! task ([`ChatListener`]) drains that channel and routes one message at a
//! time, so commands from chat are handled strictly in arrival order.

pub mod api;
pub mod socket;

use async_trait::async_trait;
use deploybot_core::{CommandRouter, DeployBotError, ReplySink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

pub use api::SlackApiClient;
pub use socket::{InboundMessage, SocketExit};

const SOCKET_BUFFER_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack api request failed: {0}")]
    ApiRequest(String),

    #[error("slack api returned an error: {0}")]
    ApiResponse(String),

    #[error("slack socket failed: {0}")]
    Socket(String),
}

/// Posts replies into one Slack channel.
pub struct ChannelSink {
    api: SlackApiClient,
    channel: String,
}

impl ChannelSink {
    pub fn new(api: SlackApiClient, channel: impl Into<String>) -> Self {
        Self {
            api,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl ReplySink for ChannelSink {
    async fn send(&self, text: String) -> deploybot_core::Result<()> {
        self.api
            .post_message(&self.channel, &text)
            .await
            .map_err(|e| DeployBotError::Reply(e.to_string()))
    }
}

/// Sets the stop flag when dropped so the socket thread never outlives its
/// listener, even if the listener task is aborted.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct ChatListener {
    api: SlackApiClient,
    router: Arc<CommandRouter>,
}

impl ChatListener {
    pub fn new(api: SlackApiClient, router: Arc<CommandRouter>) -> Self {
        Self { api, router }
    }

    /// Connect and serve chat commands until the connection ends or
    /// `shutdown` flips to true. There is no reconnect: a dropped connection
    /// ends the listener with [`SocketExit::Disconnected`].
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<SocketExit> {
        let url = self.api.open_connection_url().await?;
        tracing::info!("slack socket-mode connection opened");

        let (sender, mut receiver) = mpsc::channel::<InboundMessage>(SOCKET_BUFFER_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopOnDrop(Arc::clone(&stop));

        let thread_stop = Arc::clone(&stop);
        let socket =
            tokio::task::spawn_blocking(move || socket::run(&url, &sender, &thread_stop));

        // The socket thread owns the sender, so `None` means it has exited and
        // every message it acked has been routed.
        loop {
            tokio::select! {
                maybe = receiver.recv() => match maybe {
                    Some(message) => self.handle(message).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("chat listener stopping");
                        break;
                    }
                }
            }
        }

        stop.store(true, Ordering::Relaxed);
        finish(socket.await)
    }

    async fn handle(&self, message: InboundMessage) {
        tracing::info!(
            user = %message.user,
            channel = %message.channel,
            "message: {}",
            message.text
        );
        let sink = ChannelSink::new(self.api.clone(), &message.channel);
        self.router
            .route(&message.text, Some(message.user.as_str()), &sink)
            .await;
    }
}

fn finish(
    joined: Result<Result<SocketExit, SlackError>, tokio::task::JoinError>,
) -> anyhow::Result<SocketExit> {
    let exit = joined.map_err(|e| anyhow::anyhow!("slack socket thread failed: {e}"))??;
    tracing::info!(?exit, "slack socket closed");
    Ok(exit)
}
