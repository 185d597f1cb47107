use super::SlackError;
use serde::Deserialize;
use serde_json::json;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

/// Bounds how long a read blocks, so the stop flag is noticed promptly.
const SOCKET_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// A user-authored chat message that passed the event filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub user: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketExit {
    /// The stop flag was set or the consumer went away.
    Stopped,
    /// Slack closed the connection or asked us to disconnect.
    Disconnected,
}

#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    payload: Option<SocketPayload>,
}

#[derive(Debug, Deserialize)]
struct SocketPayload {
    #[serde(default)]
    event: Option<SocketEvent>,
}

#[derive(Debug, Deserialize)]
struct SocketEvent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// What one text frame asks the read loop to do.
#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    Ack(String),
    Disconnect,
}

/// Blocking read loop for one socket-mode connection.
pub fn run(
    url: &str,
    events: &Sender<InboundMessage>,
    stop: &AtomicBool,
) -> Result<SocketExit, SlackError> {
    let (mut socket, _) = connect(url).map_err(|e| SlackError::Socket(e.to_string()))?;
    set_read_timeout(&mut socket)?;

    let exit = loop {
        if stop.load(Ordering::Relaxed) {
            break SocketExit::Stopped;
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                let (actions, message) = interpret_frame(text.as_str());
                let mut disconnect = false;
                for action in actions {
                    match action {
                        FrameAction::Ack(ack) => {
                            if let Err(e) = socket.send(Message::Text(ack)) {
                                tracing::warn!(error = %e, "failed to ack envelope");
                            }
                        }
                        FrameAction::Disconnect => disconnect = true,
                    }
                }
                if let Some(message) = message {
                    match events.try_send(message) {
                        Ok(()) => {}
                        Err(TrySendError::Full(dropped)) => {
                            tracing::warn!(
                                channel = %dropped.channel,
                                "chat backlog full, dropping message"
                            );
                        }
                        Err(TrySendError::Closed(_)) => break SocketExit::Stopped,
                    }
                }
                if disconnect {
                    break SocketExit::Disconnected;
                }
            }
            Ok(Message::Close(_)) => break SocketExit::Disconnected,
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {}
            Err(tungstenite::Error::ConnectionClosed) => break SocketExit::Disconnected,
            Err(err) => return Err(SlackError::Socket(err.to_string())),
        }
    };

    let _ = socket.close(None);
    Ok(exit)
}

/// Decode one text frame into the acks it needs and the message it carries.
fn interpret_frame(text: &str) -> (Vec<FrameAction>, Option<InboundMessage>) {
    let envelope = match serde_json::from_str::<SocketEnvelope>(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring undecodable socket frame");
            return (Vec::new(), None);
        }
    };

    let mut actions = Vec::new();
    if let Some(envelope_id) = &envelope.envelope_id {
        actions.push(FrameAction::Ack(
            json!({ "envelope_id": envelope_id }).to_string(),
        ));
    }

    match envelope.kind.as_str() {
        "hello" => tracing::info!("slack socket-mode connected"),
        "disconnect" => {
            tracing::warn!(reason = ?envelope.reason, "slack requested disconnect");
            actions.push(FrameAction::Disconnect);
        }
        _ => {}
    }

    let message = envelope
        .payload
        .and_then(|payload| payload.event)
        .and_then(accept_event);
    (actions, message)
}

/// Only plain user messages pass: no bot posts, no edits or joins, no
/// system events. This also keeps the bot from answering itself.
fn accept_event(event: SocketEvent) -> Option<InboundMessage> {
    if event.kind != "message" {
        return None;
    }
    if event.bot_id.is_some() || event.subtype.is_some() {
        return None;
    }
    let user = event.user.filter(|u| !u.trim().is_empty())?;
    if event.channel.trim().is_empty() {
        return None;
    }
    Some(InboundMessage {
        channel: event.channel,
        user,
        text: event.text.unwrap_or_default(),
    })
}

fn set_read_timeout(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) -> Result<(), SlackError> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(SOCKET_READ_TIMEOUT)),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_read_timeout(Some(SOCKET_READ_TIMEOUT)),
        _ => Ok(()),
    }
    .map_err(|e| SlackError::Socket(format!("failed to configure socket stream: {e}")))
}
