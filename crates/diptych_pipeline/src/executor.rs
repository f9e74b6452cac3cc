//! Single-run execution.
//!
//! The executor moves one run through `queued -> running -> {succeeded,
//! failed}` using a synchronous provider call. Every state change is
//! committed before the next step, and no store transaction is open while
//! the provider is working.

use crate::{PipelineConfig, ResultParser, build_prompt};
use chrono::Utc;
use diptych_core::{Run, RunStatus};
use diptych_error::{DiptychResult, Entity, NotFoundError};
use diptych_interface::{ContentStore, GenerationDriver};
use std::sync::Arc;
use uuid::Uuid;

/// Result of asking the executor to run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run finished successfully during this call
    Succeeded(Run),
    /// The run was already running or succeeded, or is owned by a batch,
    /// and was left alone
    Skipped(Run),
}

impl RunOutcome {
    /// The run as it stands after the call.
    pub fn run(&self) -> &Run {
        match self {
            RunOutcome::Succeeded(run) | RunOutcome::Skipped(run) => run,
        }
    }

    /// Whether the call was a no-op.
    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped(_))
    }
}

/// Drives single runs to a terminal state.
pub struct RunExecutor<D: GenerationDriver> {
    driver: D,
    store: Arc<dyn ContentStore>,
    parser: ResultParser,
    config: PipelineConfig,
}

impl<D: GenerationDriver> RunExecutor<D> {
    /// Create an executor with the standard result parser.
    pub fn new(driver: D, store: Arc<dyn ContentStore>, config: PipelineConfig) -> Self {
        Self {
            driver,
            store,
            parser: ResultParser::new(),
            config,
        }
    }

    /// Replace the result parser.
    pub fn with_parser(mut self, parser: ResultParser) -> Self {
        self.parser = parser;
        self
    }

    /// Execute a run.
    ///
    /// Runs already `running` or `succeeded` are skipped without any
    /// mutation, as are runs created by a batch: those only change through
    /// reconciliation, in step with their batch item. On failure the run is committed as `failed` with the cause
    /// and the error is returned so the task queue can retry.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the run or its topic does not exist
    /// - `Provider` if the generation call fails
    /// - `MalformedOutput` if the response does not match the schema
    /// - `Store` if persisting fails
    #[tracing::instrument(skip(self), fields(provider = self.driver.provider_name()))]
    pub async fn execute(&self, run_id: Uuid) -> DiptychResult<RunOutcome> {
        let Some(mut run) = self.store.get_run(run_id).await? else {
            return Err(NotFoundError::new(Entity::Run, [run_id]).into());
        };

        if let Some(item) = self.store.batch_item_for_run(run_id).await? {
            tracing::info!(
                batch_id = %item.batch_id,
                item_status = %item.status,
                "Run belongs to a batch; skipping"
            );
            return Ok(RunOutcome::Skipped(run));
        }

        if !run.status.is_executable() {
            tracing::info!(status = %run.status, "Run already in progress or done; skipping");
            return Ok(RunOutcome::Skipped(run));
        }

        let Some(topic) = self.store.get_topic(run.topic_id).await? else {
            return Err(NotFoundError::new(Entity::Topic, [run.topic_id]).into());
        };

        let retrying = run.status == RunStatus::Failed;
        run.begin(Utc::now());
        let mut run = self.store.update_run(&run).await?;
        tracing::info!(retrying, topic = %topic.slug, "Run started");

        let model = self.config.model_for(run.model.as_deref());
        let prompt = build_prompt(&topic);

        let generated = self
            .driver
            .generate(&model, &prompt)
            .await
            .and_then(|response| self.parser.parse(&response));

        let committed = match generated {
            Ok(payload) => {
                let writes = payload.writes(run.id);
                let mut finished = run.clone();
                finished.succeed(payload.meta, Utc::now());
                self.store.commit_run(&finished, &writes).await
            }
            Err(e) => Err(e),
        };

        match committed {
            Ok(run) => {
                tracing::info!(model = %model, "Run succeeded");
                Ok(RunOutcome::Succeeded(run))
            }
            Err(e) => {
                let cause = e.summary();
                tracing::warn!(error = %cause, retryable = e.should_retry(), "Run failed");
                run.fail(cause, Utc::now());
                if let Err(persist) = self.store.update_run(&run).await {
                    tracing::error!(error = %persist, "Failed to record run failure");
                }
                Err(e)
            }
        }
    }
}
