use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployBotError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown deploy mode '{0}': expected 'sync' or 'switch'")]
    UnknownMode(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("reply delivery failed: {0}")]
    Reply(String),

    #[error("failed to build http client: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, DeployBotError>;
