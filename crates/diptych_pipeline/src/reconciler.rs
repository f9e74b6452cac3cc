//! Batch reconciliation.
//!
//! Polls a provider job and, once it has finished, maps every output line
//! back to its item by correlation id. Items are decided independently: one
//! bad line never blocks the others. Items already in a terminal state are
//! never touched again, so reconciling twice is harmless.

use crate::{PipelineConfig, ResultParser};
use chrono::{DateTime, Utc};
use diptych_core::{ArtifactWrite, BatchEntry, BatchSnapshot, GenerationPayload};
use diptych_error::{DiptychResult, Entity, NotFoundError, ValidationError, ValidationErrorKind};
use diptych_interface::{BatchProvider, ContentStore, JobPhase, RemoteJob};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Error recorded on an item whose correlation id has no output line.
pub const MISSING_OUTPUT_ROW: &str = "missing output row";

/// What a reconciliation pass did.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The provider is still working; nothing changed
    Pending(BatchSnapshot),
    /// The batch reached a terminal state during this pass
    Settled(BatchSnapshot),
    /// The batch was already terminal; the provider was not contacted
    AlreadyTerminal(BatchSnapshot),
}

impl Reconciliation {
    /// The batch as it stands after the pass.
    pub fn snapshot(&self) -> &BatchSnapshot {
        match self {
            Reconciliation::Pending(s)
            | Reconciliation::Settled(s)
            | Reconciliation::AlreadyTerminal(s) => s,
        }
    }

    /// Consume the outcome, returning the batch.
    pub fn into_snapshot(self) -> BatchSnapshot {
        match self {
            Reconciliation::Pending(s)
            | Reconciliation::Settled(s)
            | Reconciliation::AlreadyTerminal(s) => s,
        }
    }
}

/// Decision for one item.
enum ItemResult {
    Generated {
        payload: GenerationPayload,
        response_code: Option<i32>,
    },
    Failed {
        error: String,
        response_code: Option<i32>,
    },
}

/// Reconciles provider batch jobs with local state.
pub struct BatchReconciler<P: BatchProvider> {
    provider: P,
    store: Arc<dyn ContentStore>,
    parser: ResultParser,
    config: PipelineConfig,
}

impl<P: BatchProvider> BatchReconciler<P> {
    /// Create a reconciler with the standard result parser.
    pub fn new(provider: P, store: Arc<dyn ContentStore>, config: PipelineConfig) -> Self {
        Self {
            provider,
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

    /// Poll the provider and reconcile the batch.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the batch does not exist
    /// - `Validation` (`MissingJobHandle`) if the batch was never submitted
    /// - `Provider` if polling or downloading fails; nothing is written
    /// - `Store` if the final commit fails
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, batch_id: Uuid) -> DiptychResult<Reconciliation> {
        let Some(mut snapshot) = self.store.get_batch(batch_id).await? else {
            return Err(NotFoundError::new(Entity::Batch, [batch_id]).into());
        };
        let Some(job_id) = snapshot.batch.provider_job_id.clone() else {
            return Err(ValidationError::new(ValidationErrorKind::MissingJobHandle(
                batch_id.to_string(),
            ))
            .into());
        };

        if snapshot.batch.status.is_terminal() {
            tracing::info!(status = %snapshot.batch.status, "Batch already terminal");
            return Ok(Reconciliation::AlreadyTerminal(snapshot));
        }

        let job = self.provider.get_job(&job_id).await?;
        tracing::debug!(job_id = %job_id, status = %job.status, "Polled batch job");

        let writes = match job.status.phase() {
            JobPhase::InProgress => {
                tracing::info!(status = %job.status, "Batch job still in progress");
                return Ok(Reconciliation::Pending(snapshot));
            }
            JobPhase::Ended => {
                let error = format!("batch job ended with status={}", job.status);
                let failed = snapshot.fail_unsettled(&error, Utc::now());
                tracing::warn!(status = %job.status, failed_items = failed, "Batch job ended abnormally");
                Vec::new()
            }
            JobPhase::Completed => self.apply_output(&mut snapshot, &job).await?,
        };

        self.store.commit_batch(&snapshot, &writes).await?;
        tracing::info!(
            status = %snapshot.batch.status,
            error = ?snapshot.batch.error,
            artifacts = writes.len(),
            "Batch reconciled"
        );
        Ok(Reconciliation::Settled(snapshot))
    }

    /// Settle every unsettled entry from the job's output and error files.
    async fn apply_output(
        &self,
        snapshot: &mut BatchSnapshot,
        job: &RemoteJob,
    ) -> DiptychResult<Vec<ArtifactWrite>> {
        if job.output_file_id.is_none() && job.error_file_id.is_none() {
            let failed =
                snapshot.fail_unsettled("batch job completed without an output file", Utc::now());
            tracing::warn!(failed_items = failed, "Completed batch job has no output file");
            return Ok(Vec::new());
        }

        // Requests the provider rejected land in the error file; a line in
        // the output file wins over one with the same custom_id there.
        let mut records = HashMap::new();
        if let Some(error_file_id) = job.error_file_id.as_deref() {
            let contents = self.provider.download_file(error_file_id).await?;
            records.extend(index_output(&contents));
        }
        if let Some(output_file_id) = job.output_file_id.as_deref() {
            let contents = self.provider.download_file(output_file_id).await?;
            records.extend(index_output(&contents));
        }
        tracing::debug!(lines = records.len(), "Indexed batch output");

        let now = Utc::now();
        let mut writes = Vec::new();
        for entry in snapshot.entries.iter_mut().filter(|e| !e.is_settled()) {
            let result = self.resolve(records.get(entry.item.correlation_id.as_str()));
            settle_entry(entry, result, now, &mut writes);
        }
        snapshot.settle(now);
        Ok(writes)
    }

    fn resolve(&self, record: Option<&Value>) -> ItemResult {
        let Some(record) = record else {
            return ItemResult::Failed {
                error: MISSING_OUTPUT_ROW.to_string(),
                response_code: None,
            };
        };

        let response = record.get("response");
        let response_code = response
            .and_then(|r| r.get("status_code"))
            .and_then(Value::as_i64)
            .and_then(|code| i32::try_from(code).ok());

        if let Some(error) = record.get("error").filter(|e| !e.is_null()) {
            return ItemResult::Failed {
                error: describe_error(error),
                response_code,
            };
        }

        let body = response.and_then(|r| r.get("body")).unwrap_or(&Value::Null);
        if response_code.is_some_and(|code| code >= 400) {
            return ItemResult::Failed {
                error: truncate_chars(&body.to_string(), *self.config.error_body_limit()),
                response_code,
            };
        }

        match self.parser.parse(body) {
            Ok(payload) => ItemResult::Generated {
                payload,
                response_code,
            },
            Err(e) => ItemResult::Failed {
                error: e.summary(),
                response_code,
            },
        }
    }
}

fn settle_entry(
    entry: &mut BatchEntry,
    result: ItemResult,
    now: DateTime<Utc>,
    writes: &mut Vec<ArtifactWrite>,
) {
    match result {
        ItemResult::Generated {
            payload,
            response_code,
        } => {
            writes.extend(payload.writes(entry.run.id));
            entry.succeed(payload.meta, response_code, now);
        }
        ItemResult::Failed {
            error,
            response_code,
        } => {
            tracing::warn!(
                correlation_id = %entry.item.correlation_id,
                error = %error,
                "Batch item failed"
            );
            entry.fail(error, response_code, now);
        }
    }
}

/// Index output lines by `custom_id`. Blank and unparseable lines are
/// skipped; their items end up with a missing output row.
fn index_output(contents: &str) -> HashMap<String, Value> {
    let mut records = HashMap::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<Value>(line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = number + 1, error = %e, "Skipping unparseable batch output line");
                continue;
            }
        };
        let custom_id = record
            .get("custom_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        match custom_id {
            Some(custom_id) => {
                records.insert(custom_id, record);
            }
            None => tracing::warn!(line = number + 1, "Batch output line has no custom_id"),
        }
    }
    records
}

fn describe_error(error: &Value) -> String {
    match error {
        Value::String(text) => text.clone(),
        Value::Object(map) => {
            let message = map.get("message").and_then(Value::as_str);
            let code = map.get("code").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (None, Some(message)) => message.to_string(),
                _ => error.to_string(),
            }
        }
        other => other.to_string(),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
