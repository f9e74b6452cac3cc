//! In-memory task queue for tests and single-process use.

use async_trait::async_trait;
use diptych_error::{DiptychResult, StoreError, StoreErrorKind};
use diptych_interface::{ClaimedTask, Task, TaskHandle, TaskQueue, TaskSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Claimed,
    Done,
    Buried,
}

#[derive(Debug, Clone)]
struct Entry {
    id: Uuid,
    task: Task,
    state: EntryState,
    attempts: u32,
    not_before: Instant,
    last_error: Option<String>,
}

/// FIFO queue with delayed retries, held in process memory.
///
/// Clones share the same queue, so one clone can be handed to the service
/// as a [`TaskQueue`] and another to a worker as a [`TaskSource`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskQueue {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl InMemoryTaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks waiting to be claimed, due or not (for testing).
    pub async fn pending_count(&self) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.state == EntryState::Pending)
            .count()
    }

    /// Every task ever enqueued, in order (for testing).
    pub async fn tasks(&self) -> Vec<Task> {
        self.entries.lock().await.iter().map(|e| e.task).collect()
    }

    /// Buried tasks with their last error (for testing).
    pub async fn buried(&self) -> Vec<(Task, String)> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.state == EntryState::Buried)
            .map(|e| (e.task, e.last_error.clone().unwrap_or_default()))
            .collect()
    }

    async fn settle(&self, id: Uuid, state: EntryState, error: Option<&str>, delay: Duration) -> DiptychResult<()> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.id == id && e.state == EntryState::Claimed)
        else {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        };
        entry.state = state;
        entry.not_before = Instant::now() + delay;
        if let Some(error) = error {
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: Task) -> DiptychResult<TaskHandle> {
        let id = Uuid::new_v4();
        self.entries.lock().await.push(Entry {
            id,
            task,
            state: EntryState::Pending,
            attempts: 0,
            not_before: Instant::now(),
            last_error: None,
        });
        tracing::debug!(task_id = %id, kind = %task.kind, "Task enqueued");
        Ok(TaskHandle(id.to_string()))
    }
}

#[async_trait]
impl TaskSource for InMemoryTaskQueue {
    async fn claim(&self) -> DiptychResult<Option<ClaimedTask>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.state == EntryState::Pending && e.not_before <= now)
        else {
            return Ok(None);
        };
        entry.state = EntryState::Claimed;
        entry.attempts += 1;
        Ok(Some(ClaimedTask {
            id: entry.id,
            task: entry.task,
            attempts: entry.attempts,
        }))
    }

    async fn complete(&self, id: Uuid) -> DiptychResult<()> {
        self.settle(id, EntryState::Done, None, Duration::ZERO).await
    }

    async fn retry(&self, id: Uuid, error: &str, delay: Duration) -> DiptychResult<()> {
        self.settle(id, EntryState::Pending, Some(error), delay).await
    }

    async fn bury(&self, id: Uuid, error: &str) -> DiptychResult<()> {
        self.settle(id, EntryState::Buried, Some(error), Duration::ZERO)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retried_task_waits_for_its_delay() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(Task::generate_run(Uuid::new_v4())).await.unwrap();

        let claimed = queue.claim().await.unwrap().unwrap();
        assert_eq!(claimed.attempts, 1);
        assert!(queue.claim().await.unwrap().is_none());

        queue
            .retry(claimed.id, "timeout", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(queue.claim().await.unwrap().is_none());

        tokio::time::advance(Duration::from_secs(5)).await;
        let again = queue.claim().await.unwrap().unwrap();
        assert_eq!(again.id, claimed.id);
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn buried_task_keeps_its_error() {
        let queue = InMemoryTaskQueue::new();
        let task = Task::poll_batch(Uuid::new_v4());
        queue.enqueue(task).await.unwrap();
        let claimed = queue.claim().await.unwrap().unwrap();
        queue.bury(claimed.id, "gone").await.unwrap();

        assert_eq!(queue.buried().await, vec![(task, "gone".to_string())]);
        assert_eq!(queue.pending_count().await, 0);
        assert!(queue.complete(claimed.id).await.is_err());
    }
}
