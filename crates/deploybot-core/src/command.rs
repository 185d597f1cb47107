//! Command routing: chat text (or any other transport) in, replies out.
//!
//! The vocabulary is closed: configured environment names plus a handful of
//! fixed words. Anything else is [`CommandKind::Unrecognized`] and produces no
//! reply, so ordinary channel traffic never gets an answer from the bot.

use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;

use crate::batch::Orchestrator;
use crate::error::Result;
use crate::health::{self, HealthProbe};
use crate::report;
use crate::types::Environment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Sync or switch, depending on the deploy mode, for this environment.
    SyncOrSwitch(String),
    Help,
    Ping,
    Status,
    Health,
    Hello,
    Unrecognized,
}

impl CommandKind {
    /// Trimmed, case-insensitive exact match against the vocabulary.
    pub fn parse(text: &str, environments: &[Environment]) -> Self {
        let token = text.trim().to_lowercase();
        if let Some(env) = environments
            .iter()
            .find(|e| e.name.to_lowercase() == token)
        {
            return CommandKind::SyncOrSwitch(env.name.clone());
        }
        match token.as_str() {
            "help" => CommandKind::Help,
            "ping" => CommandKind::Ping,
            "status" => CommandKind::Status,
            "health" => CommandKind::Health,
            "hello" => CommandKind::Hello,
            _ => CommandKind::Unrecognized,
        }
    }
}

/// Delivers formatted text back to whoever issued a command.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: String) -> Result<()>;
}

/// One inbound command bound to its reply destination.
pub struct Command<'a> {
    pub kind: CommandKind,
    pub requester: Option<&'a str>,
    pub reply: &'a dyn ReplySink,
}

pub struct CommandRouter {
    orchestrator: Arc<Orchestrator>,
    health: Option<HealthProbe>,
}

impl CommandRouter {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            health: None,
        }
    }

    /// Enable the `health` command against this probe.
    pub fn with_health_probe(mut self, probe: HealthProbe) -> Self {
        self.health = Some(probe);
        self
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Parse `text` and dispatch it. Returns the recognised command kind.
    pub async fn route(
        &self,
        text: &str,
        requester: Option<&str>,
        reply: &dyn ReplySink,
    ) -> CommandKind {
        let kind = CommandKind::parse(text, self.orchestrator.environments());
        let command = Command {
            kind: kind.clone(),
            requester,
            reply,
        };
        self.dispatch(command).await;
        kind
    }

    pub async fn dispatch(&self, command: Command<'_>) {
        let mode = self.orchestrator.mode();
        match command.kind {
            CommandKind::Unrecognized => {
                tracing::debug!(requester = ?command.requester, "ignoring unrecognized message");
            }
            CommandKind::SyncOrSwitch(name) => {
                let Some(environment) = self.orchestrator.environment(&name) else {
                    tracing::error!(environment = %name, "parsed environment is not configured");
                    return;
                };
                tracing::info!(
                    environment = %environment.name,
                    requester = ?command.requester,
                    "{} requested",
                    mode.verb()
                );
                send(command.reply, report::in_progress(environment, mode)).await;
                let result = self.orchestrator.run_batch(environment).await;
                send(
                    command.reply,
                    report::completion(&result, command.requester, Local::now()),
                )
                .await;
            }
            CommandKind::Help => {
                send(
                    command.reply,
                    report::help(self.orchestrator.environments(), mode),
                )
                .await;
            }
            CommandKind::Ping => send(command.reply, "pong! 🏓".to_string()).await,
            CommandKind::Status => {
                send(
                    command.reply,
                    format!(
                        "deploybot is running! ✅ ({} mode, environments: {})",
                        mode,
                        self.orchestrator
                            .environments()
                            .iter()
                            .map(|e| e.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                )
                .await;
            }
            CommandKind::Hello => {
                let greeting = match command.requester {
                    Some(user) => format!("Hey there <@{user}>!"),
                    None => "Hey there!".to_string(),
                };
                send(command.reply, greeting).await;
            }
            CommandKind::Health => {
                let Some(probe) = &self.health else {
                    send(
                        command.reply,
                        "⚠️ Health probing is not configured for this bot.".to_string(),
                    )
                    .await;
                    return;
                };
                send(command.reply, "🔍 Checking HTTP listener...".to_string()).await;
                let status = probe.check().await;
                send(command.reply, health::describe(&status, probe.url())).await;
            }
        }
    }
}

async fn send(sink: &dyn ReplySink, text: String) {
    if let Err(e) = sink.send(text).await {
        tracing::warn!(error = %e, "failed to deliver reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployBotError;
    use crate::executor::TargetExecutor;
    use crate::types::{DeployMode, OperationOutcome, Target};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, text: String) -> Result<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ReplySink for FailingSink {
        async fn send(&self, _text: String) -> Result<()> {
            Err(DeployBotError::Reply("channel_not_found".into()))
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl TargetExecutor for AlwaysOk {
        async fn execute(&self, target: &Target, _environment: &str) -> OperationOutcome {
            OperationOutcome::success(&target.id, "ok")
        }
    }

    struct AlwaysBroken;

    #[async_trait]
    impl TargetExecutor for AlwaysBroken {
        async fn execute(&self, target: &Target, _environment: &str) -> OperationOutcome {
            OperationOutcome::failure(&target.id, "connection refused", Some("ECONNREFUSED".into()))
        }
    }

    fn envs() -> Vec<Environment> {
        vec![
            Environment::new("pm", ["a-pm", "b-pm", "c-pm"]),
            Environment::new("prd", ["a-prd"]),
        ]
    }

    fn router(executor: Arc<dyn TargetExecutor>) -> CommandRouter {
        CommandRouter::new(Arc::new(Orchestrator::new(DeployMode::Sync, envs(), executor)))
    }

    #[test]
    fn parse_matches_whole_tokens_case_insensitively() {
        let envs = envs();
        assert_eq!(
            CommandKind::parse("  PM ", &envs),
            CommandKind::SyncOrSwitch("pm".into())
        );
        assert_eq!(CommandKind::parse("Help", &envs), CommandKind::Help);
        assert_eq!(CommandKind::parse("ping", &envs), CommandKind::Ping);
        assert_eq!(CommandKind::parse("pm please", &envs), CommandKind::Unrecognized);
        assert_eq!(CommandKind::parse("", &envs), CommandKind::Unrecognized);
    }

    #[tokio::test]
    async fn unrecognized_text_gets_no_reply() {
        let sink = RecordingSink::default();
        let kind = router(Arc::new(AlwaysOk))
            .route("lunch anyone?", Some("U1"), &sink)
            .await;
        assert_eq!(kind, CommandKind::Unrecognized);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn environment_token_gets_ack_then_one_report() {
        let sink = RecordingSink::default();
        router(Arc::new(AlwaysOk)).route("pm", Some("U1"), &sink).await;

        let messages = sink.messages();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages[0].contains("Running sync for PM"));
        assert!(messages[1].contains("Succeeded: 3/3"));
        assert!(messages[1].contains("<@U1>"));
    }

    #[tokio::test]
    async fn failing_batch_reports_every_failed_target() {
        let sink = RecordingSink::default();
        router(Arc::new(AlwaysBroken)).route("pm", None, &sink).await;

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        let report = &messages[1];
        assert!(report.contains("PM sync failed"));
        for target in ["a-pm", "b-pm", "c-pm"] {
            assert!(report.contains(&format!("• {target}: connection refused")));
        }
        assert!(report.contains("ECONNREFUSED"));
        assert!(report.contains("Succeeded: 0/3"));
    }

    #[tokio::test]
    async fn fixed_commands_reply_once() {
        let router = router(Arc::new(AlwaysOk));
        for (text, needle) in [
            ("help", "deploybot usage"),
            ("ping", "pong"),
            ("status", "environments: pm, prd"),
            ("hello", "<@U9>"),
        ] {
            let sink = RecordingSink::default();
            router.route(text, Some("U9"), &sink).await;
            let messages = sink.messages();
            assert_eq!(messages.len(), 1, "{text}: {messages:?}");
            assert!(messages[0].contains(needle), "{text}: {}", messages[0]);
        }
    }

    #[tokio::test]
    async fn health_without_probe_says_so() {
        let sink = RecordingSink::default();
        router(Arc::new(AlwaysOk)).route("health", None, &sink).await;
        assert_eq!(sink.messages().len(), 1);
        assert!(sink.messages()[0].contains("not configured"));
    }

    #[tokio::test]
    async fn sink_errors_do_not_abort_the_command() {
        let kind = router(Arc::new(AlwaysOk)).route("prd", None, &FailingSink).await;
        assert_eq!(kind, CommandKind::SyncOrSwitch("prd".into()));
    }
}
