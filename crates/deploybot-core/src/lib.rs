//! `deploybot-core`: environment sync/cutover orchestration.
//!
//! ```text
//! chat text / HTTP body
//!     │
//!     ▼
//! CommandRouter   ← closed vocabulary, replies through a ReplySink
//!     │
//!     ▼
//! Orchestrator    ← one task per target, outcomes kept in configured order
//!     │
//!     ▼
//! TargetExecutor  ← Argo CD sync call or cutover script, never fails
//! ```

pub mod batch;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod health;
pub mod report;
pub mod types;

pub use batch::Orchestrator;
pub use command::{Command, CommandKind, CommandRouter, ReplySink};
pub use config::{Config, Scope, Settings};
pub use error::{DeployBotError, Result};
pub use executor::TargetExecutor;
pub use types::{AggregateResult, DeployMode, Environment, OperationOutcome, Target};
