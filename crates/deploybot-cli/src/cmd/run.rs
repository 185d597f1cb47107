use crate::output::{print_json, print_table};
use anyhow::{bail, Result};
use deploybot_core::{executor, AggregateResult, Orchestrator, Scope};
use std::path::Path;

/// Run one batch for `environment` without starting any listener.
pub fn run(settings_path: Option<&Path>, environment: &str, json: bool) -> Result<()> {
    let config = super::load_config(settings_path, Scope::Batch)?;
    let orchestrator = Orchestrator::new(
        config.mode,
        config.environments.clone(),
        executor::from_config(&config)?,
    );

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(orchestrator.run_named(environment))?;

    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }

    if !result.overall_succeeded {
        bail!("{}", result.message);
    }
    Ok(())
}

fn print_result(result: &AggregateResult) {
    let rows = result
        .outcomes
        .iter()
        .map(|o| {
            vec![
                o.target_id.clone(),
                if o.succeeded { "ok" } else { "FAILED" }.to_string(),
                o.message.clone(),
            ]
        })
        .collect();
    print_table(&["TARGET", "RESULT", "MESSAGE"], rows);
    println!();
    println!("{}", result.message);
}
