//! Background task worker.
//!
//! A worker claims tasks from a [`TaskSource`], dispatches them to the run
//! executor or batch reconciler, and decides what happens to the task:
//! completed, rescheduled with backoff, or buried.

use crate::{BatchReconciler, Reconciliation, RunExecutor};
use diptych_error::DiptychResult;
use diptych_interface::{BatchProvider, ClaimedTask, GenerationDriver, Task, TaskKind, TaskSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use uuid::Uuid;

/// Bounded exponential backoff with jitter for task retries.
///
/// # Examples
///
/// ```
/// use diptych_pipeline::RetryPolicy;
///
/// let policy = RetryPolicy::builder().max_attempts(3u32).build().unwrap();
/// assert!(policy.allows_retry(2));
/// assert!(!policy.allows_retry(3));
/// assert!(policy.delay_for(10) <= std::time::Duration::from_secs(*policy.max_delay_secs()));
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(setter(into), default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    max_attempts: u32,
    /// Delay before the first retry
    initial_backoff_ms: u64,
    /// Upper bound on any single delay
    max_delay_secs: u64,
}

impl RetryPolicy {
    /// Start building a policy from the defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Whether a task that has made `attempts` attempts may try again.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before the next attempt after `attempts` failures.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let max_delay = Duration::from_secs(self.max_delay_secs);
        ExponentialBackoff::from_millis(self.initial_backoff_ms)
            .factor(2)
            .max_delay(max_delay)
            .map(jitter)
            .nth(attempts.saturating_sub(1) as usize)
            .unwrap_or(max_delay)
            .min(max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff_ms: 2000,
            max_delay_secs: 600,
        }
    }
}

/// What happened to a claimed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Finished; removed from the queue
    Completed,
    /// Failed with a retryable error; scheduled again
    Retrying {
        /// Delay before the next attempt
        delay: Duration,
        /// Failure summary
        error: String,
    },
    /// Failed permanently or out of attempts
    Buried {
        /// Failure summary
        error: String,
    },
}

/// Report for one processed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Queue entry id
    pub id: Uuid,
    /// The task
    pub task: Task,
    /// Attempt number just made
    pub attempts: u32,
    /// Outcome
    pub disposition: Disposition,
}

/// Consumes generation and poll tasks.
pub struct TaskWorker<D: GenerationDriver, P: BatchProvider> {
    source: Arc<dyn TaskSource>,
    executor: RunExecutor<D>,
    reconciler: BatchReconciler<P>,
    policy: RetryPolicy,
    idle_interval: Duration,
}

impl<D: GenerationDriver, P: BatchProvider> TaskWorker<D, P> {
    /// Create a worker.
    pub fn new(
        source: Arc<dyn TaskSource>,
        executor: RunExecutor<D>,
        reconciler: BatchReconciler<P>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            executor,
            reconciler,
            policy,
            idle_interval: Duration::from_secs(1),
        }
    }

    /// How long to sleep when no task is due.
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Claim and process at most one task.
    ///
    /// Task failures are absorbed into the report; only queue failures are
    /// returned as errors.
    pub async fn run_once(&self) -> DiptychResult<Option<TaskReport>> {
        let Some(claimed) = self.source.claim().await? else {
            return Ok(None);
        };
        let disposition = self.process(&claimed).await?;
        Ok(Some(TaskReport {
            id: claimed.id,
            task: claimed.task,
            attempts: claimed.attempts,
            disposition,
        }))
    }

    /// Process tasks until none is due. Returns the reports in order.
    pub async fn drain(&self) -> DiptychResult<Vec<TaskReport>> {
        let mut reports = Vec::new();
        while let Some(report) = self.run_once().await? {
            reports.push(report);
        }
        Ok(reports)
    }

    /// Process tasks until `shutdown` turns true.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Worker started");
        while !*shutdown.borrow() {
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Task queue unavailable"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.idle_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Worker stopped");
    }

    #[tracing::instrument(
        skip(self, claimed),
        fields(task_id = %claimed.id, kind = %claimed.task.kind, argument = %claimed.task.argument, attempt = claimed.attempts)
    )]
    async fn process(&self, claimed: &ClaimedTask) -> DiptychResult<Disposition> {
        let outcome = match claimed.task.kind {
            TaskKind::GenerateRun => self.executor.execute(claimed.task.argument).await.map(|_| ()),
            TaskKind::PollBatch => self.poll(claimed.task.argument).await,
        };

        let disposition = match outcome {
            Ok(()) => {
                self.source.complete(claimed.id).await?;
                Disposition::Completed
            }
            Err(e) if e.should_retry() && self.policy.allows_retry(claimed.attempts) => {
                let error = e.summary();
                let delay = self.policy.delay_for(claimed.attempts);
                tracing::warn!(error = %error, delay_ms = delay.as_millis() as u64, "Task failed; retrying");
                self.source.retry(claimed.id, &error, delay).await?;
                Disposition::Retrying { delay, error }
            }
            Err(e) => {
                let error = e.summary();
                tracing::error!(error = %error, retryable = e.should_retry(), "Task failed permanently");
                self.source.bury(claimed.id, &error).await?;
                Disposition::Buried { error }
            }
        };
        Ok(disposition)
    }

    async fn poll(&self, batch_id: Uuid) -> DiptychResult<()> {
        match self.reconciler.reconcile(batch_id).await? {
            Reconciliation::Pending(snapshot) => {
                tracing::info!(batch_id = %snapshot.batch.id, "Batch still pending; poll again later");
            }
            Reconciliation::Settled(snapshot) | Reconciliation::AlreadyTerminal(snapshot) => {
                tracing::info!(batch_id = %snapshot.batch.id, status = %snapshot.batch.status, "Batch settled");
            }
        }
        Ok(())
    }
}
