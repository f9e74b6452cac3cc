//! Background task queue.

use async_trait::async_trait;
use diptych_error::DiptychResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Kind of background work.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
    /// Execute one run; the argument is the run id
    GenerateRun,
    /// Reconcile one batch; the argument is the batch id
    PollBatch,
}

/// A unit of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    /// What to do
    pub kind: TaskKind,
    /// Run or batch id
    pub argument: Uuid,
}

impl Task {
    /// Execute a run.
    pub fn generate_run(run_id: Uuid) -> Self {
        Self {
            kind: TaskKind::GenerateRun,
            argument: run_id,
        }
    }

    /// Reconcile a batch.
    pub fn poll_batch(batch_id: Uuid) -> Self {
        Self {
            kind: TaskKind::PollBatch,
            argument: batch_id,
        }
    }
}

/// Opaque handle returned when a task is enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub String);

/// A task handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    /// Queue entry id
    pub id: Uuid,
    /// The work
    pub task: Task,
    /// Attempts so far, including this one
    pub attempts: u32,
}

/// Producer side of the queue. Delivery is at least once.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task and return its handle.
    async fn enqueue(&self, task: Task) -> DiptychResult<TaskHandle>;
}

/// Consumer side of the queue.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Claim the next due task, if any.
    async fn claim(&self) -> DiptychResult<Option<ClaimedTask>>;

    /// Mark a claimed task done.
    async fn complete(&self, id: Uuid) -> DiptychResult<()>;

    /// Release a claimed task for another attempt after `delay`.
    async fn retry(&self, id: Uuid, error: &str, delay: Duration) -> DiptychResult<()>;

    /// Give up on a claimed task.
    async fn bury(&self, id: Uuid, error: &str) -> DiptychResult<()>;
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
