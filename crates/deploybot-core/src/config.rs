use crate::error::{DeployBotError, Result};
use crate::types::{DeployMode, Environment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Words the command router owns; environments may not shadow them.
pub const RESERVED_TOKENS: &[&str] = &["help", "ping", "status", "health", "hello"];

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SWITCH_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Settings (optional YAML file)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgoCdSettings {
    /// Skip TLS certificate verification for the controller API.
    #[serde(default)]
    pub insecure_tls: bool,
    #[serde(default = "default_sync_timeout")]
    pub timeout_seconds: u64,
}

fn default_sync_timeout() -> u64 {
    DEFAULT_SYNC_TIMEOUT_SECS
}

impl Default for ArgoCdSettings {
    fn default() -> Self {
        Self {
            insecure_tls: false,
            timeout_seconds: default_sync_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchSettings {
    #[serde(default = "default_switch_timeout")]
    pub timeout_seconds: u64,
}

fn default_switch_timeout() -> u64 {
    DEFAULT_SWITCH_TIMEOUT_SECS
}

impl Default for SwitchSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_switch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Alerts containing this marker are posted as recoveries instead of warnings.
    #[serde(default = "default_recovery_marker")]
    pub recovery_marker: String,
}

fn default_recovery_marker() -> String {
    "resolved".to_string()
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            recovery_marker: default_recovery_marker(),
        }
    }
}

/// Non-secret settings, read from `deploybot.yaml` when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mode: DeployMode,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub environments: Option<Vec<Environment>>,
    #[serde(default)]
    pub argocd: ArgoCdSettings,
    #[serde(default)]
    pub switch: SwitchSettings,
    #[serde(default)]
    pub notify: NotifySettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&data)?;
        Ok(settings)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Configured environments, or the built-in pair for the current mode.
    pub fn environments(&self) -> Vec<Environment> {
        match &self.environments {
            Some(envs) => envs.clone(),
            None => default_environments(self.mode),
        }
    }
}

/// The stock `pm` / `prd` layout.
///
/// Sync mode targets the three rater applications per environment. Switch
/// mode runs the cutover script once per environment, so each environment
/// carries a single cutover target.
pub fn default_environments(mode: DeployMode) -> Vec<Environment> {
    match mode {
        DeployMode::Sync => ["pm", "prd"]
            .iter()
            .map(|env| {
                Environment::new(
                    *env,
                    [
                        format!("k-rater-uq-remains-data-{env}"),
                        format!("k-rater-uq-summary-{env}"),
                        format!("k-rater-uq-summary-customer-{env}"),
                    ],
                )
            })
            .collect(),
        DeployMode::Switch => ["pm", "prd"]
            .iter()
            .map(|env| Environment::new(*env, [format!("{env}-cutover")]))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Credentials (environment variables)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SlackCredentials {
    pub bot_token: String,
    pub signing_secret: String,
    pub app_token: String,
    /// Override for the Web API base URL (tests, proxies).
    pub api_base: Option<String>,
}

impl std::fmt::Debug for SlackCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackCredentials")
            .field("bot_token", &"<redacted>")
            .field("signing_secret", &"<redacted>")
            .field("app_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone)]
pub struct ArgoCdCredentials {
    pub server_url: String,
    pub auth_token: String,
}

impl std::fmt::Debug for ArgoCdCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgoCdCredentials")
            .field("server_url", &self.server_url)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Which surfaces a resolved [`Config`] has to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Chat and HTTP listeners. Slack credentials are required.
    Listeners,
    /// One batch run from the command line. Only executor credentials.
    Batch,
}

/// Fully resolved process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: DeployMode,
    pub port: u16,
    pub environments: Vec<Environment>,
    /// Present whenever the scope is [`Scope::Listeners`].
    pub slack: Option<SlackCredentials>,
    pub argocd: Option<ArgoCdCredentials>,
    pub switch_script: Option<PathBuf>,
    /// Channel that receives `/detect` notifications.
    pub notify_channel: Option<String>,
    pub settings: Settings,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env(settings: Settings, scope: Scope) -> Result<Self> {
        Self::from_lookup(settings, scope, |key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// Environment variables override the mode, port and TLS flag from the
    /// settings file. Empty values count as missing.
    pub fn from_lookup<F>(mut settings: Settings, scope: Scope, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| DeployBotError::MissingEnvVar(key.into()));

        let slack = match scope {
            Scope::Listeners => Some(SlackCredentials {
                bot_token: require("SLACK_BOT_TOKEN")?,
                signing_secret: require("SLACK_SIGNING_SECRET")?,
                app_token: require("SLACK_APP_TOKEN")?,
                api_base: get("SLACK_API_BASE"),
            }),
            Scope::Batch => None,
        };

        if let Some(mode) = get("DEPLOYBOT_MODE") {
            settings.mode = mode.parse()?;
        }
        if let Some(port) = get("DEPLOYBOT_PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|_| DeployBotError::InvalidConfig(format!("invalid port '{port}'")))?;
            settings.port = Some(port);
        }
        if let Some(flag) = get("ARGOCD_INSECURE") {
            settings.argocd.insecure_tls = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        let (argocd, switch_script) = match settings.mode {
            DeployMode::Sync => (
                Some(ArgoCdCredentials {
                    server_url: require("ARGOCD_SERVER_URL")?
                        .trim_end_matches('/')
                        .to_string(),
                    auth_token: require("ARGOCD_AUTH_TOKEN")?,
                }),
                None,
            ),
            DeployMode::Switch => (None, Some(PathBuf::from(require("SWITCH_SCRIPT_PATH")?))),
        };

        let config = Self {
            mode: settings.mode,
            port: settings.port(),
            environments: settings.environments(),
            slack,
            argocd,
            switch_script,
            notify_channel: get("RATER_CHANNEL"),
            settings,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject environment layouts the router could not address unambiguously.
    pub fn validate(&self) -> Result<()> {
        if self.environments.is_empty() {
            return Err(DeployBotError::InvalidConfig(
                "at least one environment must be configured".into(),
            ));
        }
        let mut seen = Vec::new();
        for env in &self.environments {
            let name = env.name.trim().to_ascii_lowercase();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(DeployBotError::InvalidConfig(format!(
                    "environment name '{}' must be a single non-empty word",
                    env.name
                )));
            }
            if RESERVED_TOKENS.contains(&name.as_str()) {
                return Err(DeployBotError::InvalidConfig(format!(
                    "environment name '{name}' collides with a chat command"
                )));
            }
            if seen.contains(&name) {
                return Err(DeployBotError::InvalidConfig(format!(
                    "duplicate environment '{name}'"
                )));
            }
            if env.targets.is_empty() {
                return Err(DeployBotError::InvalidConfig(format!(
                    "environment '{name}' has no targets"
                )));
            }
            seen.push(name);
        }
        Ok(())
    }

    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.iter().map(|e| e.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn slack_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("SLACK_SIGNING_SECRET", "secret"),
            ("SLACK_APP_TOKEN", "xapp-1"),
        ]
    }

    fn resolve(pairs: &[(&str, &str)], settings: Settings) -> Result<Config> {
        let map = vars(pairs);
        Config::from_lookup(settings, Scope::Listeners, |k| map.get(k).cloned())
    }

    #[test]
    fn sync_mode_resolves_defaults() {
        let mut pairs = slack_vars();
        pairs.push(("ARGOCD_SERVER_URL", "https://argo.example/"));
        pairs.push(("ARGOCD_AUTH_TOKEN", "tok"));
        let config = resolve(&pairs, Settings::default()).unwrap();

        assert_eq!(config.mode, DeployMode::Sync);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.environment_names(), vec!["pm", "prd"]);
        assert_eq!(config.environments[0].targets.len(), 3);
        assert_eq!(config.environments[0].targets[0].id, "k-rater-uq-remains-data-pm");
        assert_eq!(config.argocd.unwrap().server_url, "https://argo.example");
        assert!(config.notify_channel.is_none());
        assert!(config.slack.is_some());
    }

    #[test]
    fn batch_scope_skips_slack_credentials() {
        let map = vars(&[
            ("ARGOCD_SERVER_URL", "https://argo.example"),
            ("ARGOCD_AUTH_TOKEN", "tok"),
        ]);
        let config =
            Config::from_lookup(Settings::default(), Scope::Batch, |k| map.get(k).cloned()).unwrap();
        assert!(config.slack.is_none());
        assert!(config.argocd.is_some());
    }

    #[test]
    fn missing_slack_credential_is_fatal() {
        let err = resolve(&[("SLACK_BOT_TOKEN", "xoxb")], Settings::default()).unwrap_err();
        assert!(matches!(err, DeployBotError::MissingEnvVar(ref k) if k == "SLACK_SIGNING_SECRET"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut pairs = slack_vars();
        pairs[2] = ("SLACK_APP_TOKEN", "   ");
        let err = resolve(&pairs, Settings::default()).unwrap_err();
        assert!(matches!(err, DeployBotError::MissingEnvVar(ref k) if k == "SLACK_APP_TOKEN"));
    }

    #[test]
    fn sync_mode_requires_argocd_credentials() {
        let err = resolve(&slack_vars(), Settings::default()).unwrap_err();
        assert!(matches!(err, DeployBotError::MissingEnvVar(ref k) if k == "ARGOCD_SERVER_URL"));
    }

    #[test]
    fn switch_mode_from_env_requires_script() {
        let mut pairs = slack_vars();
        pairs.push(("DEPLOYBOT_MODE", "switch"));
        let err = resolve(&pairs, Settings::default()).unwrap_err();
        assert!(matches!(err, DeployBotError::MissingEnvVar(ref k) if k == "SWITCH_SCRIPT_PATH"));

        pairs.push(("SWITCH_SCRIPT_PATH", "/opt/switch.sh"));
        pairs.push(("DEPLOYBOT_PORT", "8080"));
        let config = resolve(&pairs, Settings::default()).unwrap();
        assert_eq!(config.mode, DeployMode::Switch);
        assert_eq!(config.port, 8080);
        assert_eq!(config.switch_script.unwrap(), PathBuf::from("/opt/switch.sh"));
        assert_eq!(config.environments[1].targets[0].id, "prd-cutover");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut pairs = slack_vars();
        pairs.push(("DEPLOYBOT_MODE", "switch"));
        pairs.push(("SWITCH_SCRIPT_PATH", "/opt/switch.sh"));
        pairs.push(("DEPLOYBOT_PORT", "http"));
        assert!(matches!(
            resolve(&pairs, Settings::default()),
            Err(DeployBotError::InvalidConfig(_))
        ));
    }

    #[test]
    fn settings_file_overrides_environments() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deploybot.yaml");
        std::fs::write(
            &path,
            "mode: sync\nport: 7000\nargocd:\n  insecure_tls: true\nenvironments:\n  - name: qa\n    targets: [svc-a-qa, svc-b-qa]\n",
        )
        .unwrap();

        let settings = Settings::load_or_default(Some(path.as_path())).unwrap();
        let mut pairs = slack_vars();
        pairs.push(("ARGOCD_SERVER_URL", "https://argo"));
        pairs.push(("ARGOCD_AUTH_TOKEN", "tok"));
        let config = resolve(&pairs, settings).unwrap();

        assert_eq!(config.port, 7000);
        assert!(config.settings.argocd.insecure_tls);
        assert_eq!(config.settings.argocd.timeout_seconds, DEFAULT_SYNC_TIMEOUT_SECS);
        assert_eq!(config.environment_names(), vec!["qa"]);
        assert_eq!(config.environments[0].targets[1].id, "svc-b-qa");
    }

    #[test]
    fn reserved_and_duplicate_names_are_rejected() {
        let mut pairs = slack_vars();
        pairs.push(("ARGOCD_SERVER_URL", "https://argo"));
        pairs.push(("ARGOCD_AUTH_TOKEN", "tok"));

        let settings = Settings {
            environments: Some(vec![Environment::new("help", ["x"])]),
            ..Settings::default()
        };
        assert!(matches!(resolve(&pairs, settings), Err(DeployBotError::InvalidConfig(_))));

        let settings = Settings {
            environments: Some(vec![
                Environment::new("pm", ["x"]),
                Environment::new("PM", ["y"]),
            ]),
            ..Settings::default()
        };
        assert!(matches!(resolve(&pairs, settings), Err(DeployBotError::InvalidConfig(_))));

        let settings = Settings {
            environments: Some(vec![Environment::new("pm", Vec::<String>::new())]),
            ..Settings::default()
        };
        assert!(matches!(resolve(&pairs, settings), Err(DeployBotError::InvalidConfig(_))));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let creds = SlackCredentials {
            bot_token: "xoxb-secret".into(),
            signing_secret: "s".into(),
            app_token: "xapp-secret".into(),
            api_base: None,
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("xoxb-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
