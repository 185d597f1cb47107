use crate::output::{print_json, print_table};
use anyhow::Result;
use deploybot_core::{Config, Scope};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ConfigSummary<'a> {
    mode: &'a str,
    port: u16,
    environments: &'a [deploybot_core::Environment],
    argocd_server_url: Option<&'a str>,
    switch_script: Option<String>,
    notify_channel: Option<&'a str>,
    recovery_marker: &'a str,
}

/// Resolve the full listener configuration and print it without secrets.
/// Fails with the first missing or invalid setting.
pub fn run(settings_path: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load_config(settings_path, Scope::Listeners)?;
    let summary = summarize(&config);

    if json {
        return print_json(&summary);
    }

    println!("mode: {}", summary.mode);
    println!("port: {}", summary.port);
    if let Some(url) = summary.argocd_server_url {
        println!("argocd: {url}");
    }
    if let Some(script) = &summary.switch_script {
        println!("switch script: {script}");
    }
    println!(
        "notify channel: {}",
        summary.notify_channel.unwrap_or("(none, /detect disabled)")
    );
    println!();

    let rows = summary
        .environments
        .iter()
        .map(|env| {
            vec![
                env.name.clone(),
                env.targets
                    .iter()
                    .map(|t| t.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect();
    print_table(&["ENVIRONMENT", "TARGETS"], rows);
    Ok(())
}

fn summarize(config: &Config) -> ConfigSummary<'_> {
    ConfigSummary {
        mode: config.mode.as_str(),
        port: config.port,
        environments: &config.environments,
        argocd_server_url: config.argocd.as_ref().map(|a| a.server_url.as_str()),
        switch_script: config
            .switch_script
            .as_ref()
            .map(|p| p.display().to_string()),
        notify_channel: config.notify_channel.as_deref(),
        recovery_marker: &config.settings.notify.recovery_marker,
    }
}
