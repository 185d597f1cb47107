use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DeployBotError;

// ---------------------------------------------------------------------------
// DeployMode
// ---------------------------------------------------------------------------

/// Operation style used for every target of this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// Ask the CD controller to sync each application.
    #[default]
    Sync,
    /// Run the cutover script that makes one environment active.
    Switch,
}

impl DeployMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeployMode::Sync => "sync",
            DeployMode::Switch => "switch",
        }
    }

    /// HTTP path of the command-trigger endpoint for this mode.
    pub fn trigger_path(self) -> &'static str {
        match self {
            DeployMode::Sync => "/sync-env",
            DeployMode::Switch => "/switch-env",
        }
    }

    /// Verb used in chat replies ("sync" / "switch").
    pub fn verb(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeployMode {
    type Err = DeployBotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(DeployMode::Sync),
            "switch" => Ok(DeployMode::Switch),
            other => Err(DeployBotError::UnknownMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Target / Environment
// ---------------------------------------------------------------------------

/// One deployable application unit managed by the CD controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target {
    pub id: String,
}

impl Target {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A named, ordered set of targets operated on together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub targets: Vec<Target>,
}

impl Environment {
    pub fn new<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            targets: targets.into_iter().map(Target::new).collect(),
        }
    }

    /// Upper-case label used in human-readable reports ("PM", "PRD").
    pub fn label(&self) -> String {
        self.name.to_uppercase()
    }
}

// ---------------------------------------------------------------------------
// OperationOutcome
// ---------------------------------------------------------------------------

/// Result of one target operation. Exactly one per target per batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub target_id: String,
    pub succeeded: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_error: Option<String>,
}

impl OperationOutcome {
    pub fn success(target_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            succeeded: true,
            message: message.into(),
            raw_error: None,
        }
    }

    pub fn failure(
        target_id: impl Into<String>,
        message: impl Into<String>,
        raw_error: Option<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            succeeded: false,
            message: message.into(),
            raw_error: raw_error.filter(|e| !e.trim().is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// AggregateResult
// ---------------------------------------------------------------------------

/// Combined report for one batch over one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub environment: String,
    pub mode: DeployMode,
    #[serde(rename = "success_count")]
    pub succeeded_count: usize,
    pub total_count: usize,
    pub overall_succeeded: bool,
    pub message: String,
    pub outcomes: Vec<OperationOutcome>,
}

impl AggregateResult {
    /// Derive the aggregate from outcomes already in configured target order.
    pub fn from_outcomes(
        environment: &Environment,
        mode: DeployMode,
        outcomes: Vec<OperationOutcome>,
    ) -> Self {
        let succeeded_count = outcomes.iter().filter(|o| o.succeeded).count();
        let total_count = outcomes.len();
        let message = format!(
            "{} environment {} finished: {succeeded_count}/{total_count} succeeded",
            environment.label(),
            mode.verb(),
        );
        Self {
            environment: environment.name.clone(),
            mode,
            succeeded_count,
            total_count,
            overall_succeeded: succeeded_count == total_count,
            message,
            outcomes,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm() -> Environment {
        Environment::new("pm", ["a", "b", "c"])
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("SYNC".parse::<DeployMode>().unwrap(), DeployMode::Sync);
        assert_eq!(" switch ".parse::<DeployMode>().unwrap(), DeployMode::Switch);
        assert!("rollout".parse::<DeployMode>().is_err());
    }

    #[test]
    fn failure_drops_blank_raw_error() {
        let outcome = OperationOutcome::failure("a", "boom", Some("  ".into()));
        assert!(outcome.raw_error.is_none());
    }

    #[test]
    fn aggregate_counts_and_overall_flag() {
        let result = AggregateResult::from_outcomes(
            &pm(),
            DeployMode::Sync,
            vec![
                OperationOutcome::success("a", "ok"),
                OperationOutcome::failure("b", "bad", None),
                OperationOutcome::success("c", "ok"),
            ],
        );
        assert_eq!(result.succeeded_count, 2);
        assert_eq!(result.total_count, 3);
        assert!(!result.overall_succeeded);
        assert_eq!(result.message, "PM environment sync finished: 2/3 succeeded");
        assert_eq!(result.failed().count(), 1);
    }

    #[test]
    fn aggregate_serializes_success_count() {
        let result = AggregateResult::from_outcomes(
            &pm(),
            DeployMode::Sync,
            vec![OperationOutcome::success("a", "ok")],
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success_count"], 1);
        assert_eq!(json["overall_succeeded"], true);
        assert_eq!(json["mode"], "sync");
        assert!(json["outcomes"][0].get("raw_error").is_none());
    }
}
