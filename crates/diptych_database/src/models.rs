//! Row types and conversions to domain records.
//!
//! JSON object columns are stored as `jsonb` and must decode to objects;
//! status columns must hold a known value. Anything else is reported as
//! [`StoreErrorKind::InvalidValue`] rather than silently coerced.

use crate::schema::{artifacts, batch_items, batches, runs, tasks, topics};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diptych_core::{Artifact, Batch, BatchItem, BatchStatus, JsonMap, Lang, Run, RunStatus, Topic};
use diptych_error::{StoreError, StoreErrorKind};
use diptych_interface::{ClaimedTask, Task, TaskKind};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

/// Database row for the `topics` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = topics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TopicRow {
    pub id: Uuid,
    pub slug: String,
    pub tags: Value,
    pub fr: Value,
    pub en: Value,
    pub context: Value,
    pub constraints: Value,
    pub author_inputs: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for the `runs` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct RunRow {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub status: String,
    pub model: Option<String>,
    pub error: Option<String>,
    pub meta: Value,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for the `artifacts` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = artifacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct ArtifactRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub lang: String,
    pub frontmatter: Value,
    pub body: String,
    pub reviewed: bool,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for the `batches` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = batches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct BatchRow {
    pub id: Uuid,
    pub model: String,
    pub status: String,
    pub provider_job_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for the `batch_items` table.
///
/// `position` keeps items in submission order; it has no domain
/// counterpart.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = batch_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct BatchItemRow {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub run_id: Uuid,
    pub topic_id: Uuid,
    pub position: i32,
    pub correlation_id: String,
    pub status: String,
    pub response_code: Option<i32>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for the `tasks` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    pub id: Uuid,
    pub kind: String,
    pub argument: Uuid,
    pub state: String,
    pub attempts: i32,
    pub not_before: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn object(column: &str, value: Value) -> Result<JsonMap, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::new(StoreErrorKind::InvalidValue {
            column: column.to_string(),
            value: other.to_string(),
        })),
    }
}

fn parse<T: FromStr>(column: &str, value: &str) -> Result<T, StoreError> {
    T::from_str(value).map_err(|_| {
        StoreError::new(StoreErrorKind::InvalidValue {
            column: column.to_string(),
            value: value.to_string(),
        })
    })
}

impl From<&Topic> for TopicRow {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id,
            slug: topic.slug.clone(),
            tags: Value::Object(topic.tags.clone()),
            fr: Value::Object(topic.fr.clone()),
            en: Value::Object(topic.en.clone()),
            context: Value::Object(topic.context.clone()),
            constraints: Value::Object(topic.constraints.clone()),
            author_inputs: Value::Object(topic.author_inputs.clone()),
            created_at: topic.created_at,
            updated_at: topic.updated_at,
        }
    }
}

impl TryFrom<TopicRow> for Topic {
    type Error = StoreError;

    fn try_from(row: TopicRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            slug: row.slug,
            tags: object("topics.tags", row.tags)?,
            fr: object("topics.fr", row.fr)?,
            en: object("topics.en", row.en)?,
            context: object("topics.context", row.context)?,
            constraints: object("topics.constraints", row.constraints)?,
            author_inputs: object("topics.author_inputs", row.author_inputs)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Run> for RunRow {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            topic_id: run.topic_id,
            status: run.status.to_string(),
            model: run.model.clone(),
            error: run.error.clone(),
            meta: Value::Object(run.meta.clone()),
            started_at: run.started_at,
            finished_at: run.finished_at,
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

impl TryFrom<RunRow> for Run {
    type Error = StoreError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            topic_id: row.topic_id,
            status: parse::<RunStatus>("runs.status", &row.status)?,
            model: row.model,
            error: row.error,
            meta: object("runs.meta", row.meta)?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Artifact> for ArtifactRow {
    fn from(artifact: &Artifact) -> Self {
        Self {
            id: artifact.id,
            run_id: artifact.run_id,
            lang: artifact.lang.to_string(),
            frontmatter: Value::Object(artifact.frontmatter.clone()),
            body: artifact.body.clone(),
            reviewed: artifact.reviewed,
            review_notes: artifact.review_notes.clone(),
            created_at: artifact.created_at,
            updated_at: artifact.updated_at,
        }
    }
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = StoreError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            run_id: row.run_id,
            lang: parse::<Lang>("artifacts.lang", &row.lang)?,
            frontmatter: object("artifacts.frontmatter", row.frontmatter)?,
            body: row.body,
            reviewed: row.reviewed,
            review_notes: row.review_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Batch> for BatchRow {
    fn from(batch: &Batch) -> Self {
        Self {
            id: batch.id,
            model: batch.model.clone(),
            status: batch.status.to_string(),
            provider_job_id: batch.provider_job_id.clone(),
            error: batch.error.clone(),
            created_at: batch.created_at,
            updated_at: batch.updated_at,
        }
    }
}

impl TryFrom<BatchRow> for Batch {
    type Error = StoreError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            model: row.model,
            status: parse::<BatchStatus>("batches.status", &row.status)?,
            provider_job_id: row.provider_job_id,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl BatchItemRow {
    /// Row for an item at `position` within its batch.
    pub fn new(item: &BatchItem, position: usize) -> Result<Self, StoreError> {
        let position = i32::try_from(position).map_err(|_| {
            StoreError::new(StoreErrorKind::InvalidValue {
                column: "batch_items.position".to_string(),
                value: position.to_string(),
            })
        })?;
        Ok(Self {
            id: item.id,
            batch_id: item.batch_id,
            run_id: item.run_id,
            topic_id: item.topic_id,
            position,
            correlation_id: item.correlation_id.clone(),
            status: item.status.to_string(),
            response_code: item.response_code,
            error: item.error.clone(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        })
    }
}

impl TryFrom<BatchItemRow> for BatchItem {
    type Error = StoreError;

    fn try_from(row: BatchItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            batch_id: row.batch_id,
            run_id: row.run_id,
            topic_id: row.topic_id,
            correlation_id: row.correlation_id,
            status: parse::<BatchStatus>("batch_items.status", &row.status)?,
            response_code: row.response_code,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TaskRow {
    /// State of a task waiting to be claimed.
    pub const PENDING: &'static str = "pending";
    /// State of a task held by a worker.
    pub const CLAIMED: &'static str = "claimed";
    /// State of a finished task.
    pub const DONE: &'static str = "done";
    /// State of a task that will not be retried.
    pub const BURIED: &'static str = "buried";

    /// A fresh pending row, due immediately.
    pub fn pending(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: task.kind.to_string(),
            argument: task.argument,
            state: Self::PENDING.to_string(),
            attempts: 0,
            not_before: now,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<TaskRow> for ClaimedTask {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let attempts = u32::try_from(row.attempts).map_err(|_| {
            StoreError::new(StoreErrorKind::InvalidValue {
                column: "tasks.attempts".to_string(),
                value: row.attempts.to_string(),
            })
        })?;
        Ok(Self {
            id: row.id,
            task: Task {
                kind: parse::<TaskKind>("tasks.kind", &row.kind)?,
                argument: row.argument,
            },
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_row(status: &str, meta: Value) -> RunRow {
        let now = Utc::now();
        RunRow {
            id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            status: status.to_string(),
            model: None,
            error: None,
            meta,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = Run::try_from(run_row("paused", json!({}))).unwrap_err();
        assert_eq!(
            err.kind,
            StoreErrorKind::InvalidValue {
                column: "runs.status".to_string(),
                value: "paused".to_string(),
            }
        );
    }

    #[test]
    fn non_object_json_is_rejected() {
        let err = Run::try_from(run_row("queued", json!([1, 2]))).unwrap_err();
        assert!(matches!(err.kind, StoreErrorKind::InvalidValue { ref column, .. } if column == "runs.meta"));
    }

    #[test]
    fn claimed_task_decodes_kind() {
        let run_id = Uuid::new_v4();
        let mut row = TaskRow::pending(&Task::generate_run(run_id), Utc::now());
        row.attempts = 2;
        let claimed = ClaimedTask::try_from(row).unwrap();
        assert_eq!(claimed.task, Task::generate_run(run_id));
        assert_eq!(claimed.attempts, 2);
    }

    #[test]
    fn negative_attempts_are_rejected() {
        let mut row = TaskRow::pending(&Task::poll_batch(Uuid::new_v4()), Utc::now());
        row.attempts = -1;
        assert!(ClaimedTask::try_from(row).is_err());
    }

    #[test]
    fn run_row_keeps_every_field() {
        let mut run = Run::queued(Uuid::new_v4(), Some("gpt-4o".to_string()), Utc::now());
        run.begin(Utc::now());
        run.fail("boom", Utc::now());
        let back = Run::try_from(RunRow::from(&run)).unwrap();
        assert_eq!(back, run);
    }
}
