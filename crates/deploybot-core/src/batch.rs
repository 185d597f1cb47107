//! Batch orchestration: run one operation per target of an environment and
//! fold the outcomes into an [`AggregateResult`].

use std::sync::Arc;
use tracing::Instrument;

use crate::error::{DeployBotError, Result};
use crate::executor::TargetExecutor;
use crate::types::{AggregateResult, DeployMode, Environment, OperationOutcome};

pub struct Orchestrator {
    mode: DeployMode,
    environments: Vec<Environment>,
    executor: Arc<dyn TargetExecutor>,
}

impl Orchestrator {
    pub fn new(
        mode: DeployMode,
        environments: Vec<Environment>,
        executor: Arc<dyn TargetExecutor>,
    ) -> Self {
        Self {
            mode,
            environments,
            executor,
        }
    }

    pub fn mode(&self) -> DeployMode {
        self.mode
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Case-insensitive lookup of a configured environment.
    pub fn environment(&self, name: &str) -> Option<&Environment> {
        let name = name.trim();
        self.environments
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Resolve `name` and run its batch.
    pub async fn run_named(&self, name: &str) -> Result<AggregateResult> {
        let environment = self
            .environment(name)
            .ok_or_else(|| DeployBotError::UnknownEnvironment(name.to_string()))?;
        Ok(self.run_batch(environment).await)
    }

    /// Run every target of `environment`, concurrently, and aggregate.
    ///
    /// Every target is attempted regardless of earlier failures and yields
    /// exactly one outcome, in configured order. A panicking executor task is
    /// recorded as a failed outcome for its target.
    pub async fn run_batch(&self, environment: &Environment) -> AggregateResult {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "batch",
            %run_id,
            environment = %environment.name,
            mode = %self.mode,
        );

        async {
            tracing::info!(targets = environment.targets.len(), "starting batch");

            let handles: Vec<_> = environment
                .targets
                .iter()
                .cloned()
                .map(|target| {
                    let executor = Arc::clone(&self.executor);
                    let env_name = environment.name.clone();
                    tokio::spawn(
                        async move { executor.execute(&target, &env_name).await }
                            .in_current_span(),
                    )
                })
                .collect();

            // Awaiting handles in spawn order keeps outcomes in configured order
            // no matter which target finishes first.
            let mut outcomes = Vec::with_capacity(handles.len());
            for (target, handle) in environment.targets.iter().zip(handles) {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(target = %target.id, error = %e, "executor task aborted");
                        OperationOutcome::failure(
                            &target.id,
                            format!("{} {} failed: executor aborted", target.id, self.mode.verb()),
                            Some(e.to_string()),
                        )
                    }
                };
                outcomes.push(outcome);
            }

            let result = AggregateResult::from_outcomes(environment, self.mode, outcomes);
            if result.overall_succeeded {
                tracing::info!(
                    succeeded = result.succeeded_count,
                    total = result.total_count,
                    "batch succeeded"
                );
            } else {
                tracing::warn!(
                    succeeded = result.succeeded_count,
                    total = result.total_count,
                    "batch finished with failures"
                );
            }
            result
        }
        .instrument(span)
        .await
    }
}
