//! Batches, their items, and the lock-step moves between item and run.

use crate::{BatchStatus, JsonMap, Run};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id that ties a batch request line back to its run.
///
/// # Examples
///
/// ```
/// use diptych_core::correlation_id;
/// use uuid::Uuid;
///
/// let id = Uuid::nil();
/// assert_eq!(correlation_id(id), "run:00000000-0000-0000-0000-000000000000");
/// ```
pub fn correlation_id(run_id: Uuid) -> String {
    format!("run:{}", run_id)
}

/// A provider batch job covering many runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch id
    pub id: Uuid,
    /// Model every line is generated with
    pub model: String,
    /// Current status
    pub status: BatchStatus,
    /// Provider job handle, set once submission succeeds
    pub provider_job_id: Option<String>,
    /// Batch-level failure
    pub error: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// A fresh queued batch.
    pub fn queued(model: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.into(),
            status: BatchStatus::Queued,
            provider_job_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the accepted provider job.
    pub fn start(&mut self, job_id: impl Into<String>, now: DateTime<Utc>) {
        self.provider_job_id = Some(job_id.into());
        self.status = BatchStatus::Running;
        self.error = None;
        self.updated_at = now;
    }

    /// Enter `succeeded`.
    pub fn succeed(&mut self, now: DateTime<Utc>) {
        self.status = BatchStatus::Succeeded;
        self.error = None;
        self.updated_at = now;
    }

    /// Enter `failed`.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = BatchStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = now;
    }
}

/// One run inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Item id
    pub id: Uuid,
    /// Owning batch
    pub batch_id: Uuid,
    /// Run generated by this item
    pub run_id: Uuid,
    /// Topic the run generates from
    pub topic_id: Uuid,
    /// `run:<run id>`, unique across all batches
    pub correlation_id: String,
    /// Current status
    pub status: BatchStatus,
    /// HTTP status of the item's response line
    pub response_code: Option<i32>,
    /// Item failure
    pub error: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl BatchItem {
    /// A queued item for `run`.
    pub fn queued(batch_id: Uuid, run: &Run, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            run_id: run.id,
            topic_id: run.topic_id,
            correlation_id: correlation_id(run.id),
            status: BatchStatus::Queued,
            response_code: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An item paired with its run. The two always move together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// The batch item
    pub item: BatchItem,
    /// The item's run
    pub run: Run,
}

impl BatchEntry {
    /// Whether reconciliation already decided this entry.
    pub fn is_settled(&self) -> bool {
        self.item.status.is_terminal()
    }

    /// Mark item and run succeeded.
    pub fn succeed(&mut self, meta: JsonMap, response_code: Option<i32>, now: DateTime<Utc>) {
        self.item.status = BatchStatus::Succeeded;
        self.item.response_code = response_code;
        self.item.error = None;
        self.item.updated_at = now;
        self.run.succeed(meta, now);
    }

    /// Mark item and run failed with the same error.
    pub fn fail(&mut self, error: impl Into<String>, response_code: Option<i32>, now: DateTime<Utc>) {
        let error = error.into();
        self.item.status = BatchStatus::Failed;
        self.item.response_code = response_code.or(self.item.response_code);
        self.item.error = Some(error.clone());
        self.item.updated_at = now;
        self.run.fail(error, now);
    }
}

/// A batch with all of its entries, loaded and written as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    /// The batch
    pub batch: Batch,
    /// Items paired with their runs, in submission order
    pub entries: Vec<BatchEntry>,
}

impl BatchSnapshot {
    /// Fail the batch and every entry after the provider refused the job.
    pub fn fail_submission(&mut self, cause: &str, now: DateTime<Utc>) {
        self.batch.fail(cause, now);
        for entry in &mut self.entries {
            entry.item.status = BatchStatus::Failed;
            entry.item.error = Some(format!("Batch submission failed: {}", cause));
            entry.item.updated_at = now;
            entry.run.fail(cause, now);
        }
    }

    /// Fail the batch and every entry not yet settled, leaving settled
    /// entries untouched. Returns how many entries were failed.
    pub fn fail_unsettled(&mut self, error: &str, now: DateTime<Utc>) -> usize {
        self.batch.fail(error, now);
        let mut failed = 0;
        for entry in self.entries.iter_mut().filter(|entry| !entry.is_settled()) {
            entry.fail(error, None, now);
            failed += 1;
        }
        failed
    }

    /// Derive the batch outcome from its items: succeeded when every item
    /// succeeded, otherwise failed with a count.
    pub fn settle(&mut self, now: DateTime<Utc>) {
        let total = self.entries.len();
        let failed = self
            .entries
            .iter()
            .filter(|entry| entry.item.status != BatchStatus::Succeeded)
            .count();
        if failed == 0 {
            self.batch.succeed(now);
        } else {
            self.batch
                .fail(format!("{} of {} items failed", failed, total), now);
        }
    }

    /// Find the entry for a correlation id.
    pub fn entry(&self, correlation_id: &str) -> Option<&BatchEntry> {
        self.entries
            .iter()
            .find(|entry| entry.item.correlation_id == correlation_id)
    }
}
