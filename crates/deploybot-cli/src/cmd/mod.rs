pub mod config;
pub mod run;
pub mod serve;

use anyhow::Result;
use deploybot_core::{Config, Scope, Settings};
use std::path::Path;

/// Load the optional settings file and resolve credentials from the
/// process environment.
pub fn load_config(settings_path: Option<&Path>, scope: Scope) -> Result<Config> {
    let settings = Settings::load_or_default(settings_path)?;
    Ok(Config::from_env(settings, scope)?)
}
