use anyhow::Result;
use deploybot_core::Scope;
use std::path::Path;

pub fn run(settings_path: Option<&Path>, port: Option<u16>) -> Result<()> {
    let mut config = super::load_config(settings_path, Scope::Listeners)?;
    if let Some(port) = port {
        config.port = port;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(deploybot_server::run(config))
}
