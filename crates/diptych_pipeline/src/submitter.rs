//! Batch submission.
//!
//! A batch is persisted with all of its runs and items before the provider
//! is contacted. If the upload or job creation fails, the whole batch is
//! moved to `failed` in one commit and the error is returned.

use crate::{PipelineConfig, build_prompt, request_line};
use chrono::Utc;
use diptych_core::{Batch, BatchEntry, BatchItem, BatchSnapshot, Run, Topic};
use diptych_error::{
    DiptychResult, Entity, JsonError, NotFoundError, ValidationError, ValidationErrorKind,
};
use diptych_interface::{BatchProvider, ContentStore, RemoteJob};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Submits many topics as one provider batch job.
pub struct BatchSubmitter<P: BatchProvider> {
    provider: P,
    store: Arc<dyn ContentStore>,
    config: PipelineConfig,
}

impl<P: BatchProvider> BatchSubmitter<P> {
    /// Create a submitter.
    pub fn new(provider: P, store: Arc<dyn ContentStore>, config: PipelineConfig) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    /// Submit one run per topic id, in the given order.
    ///
    /// Returns the batch in `running` state with its provider job handle.
    ///
    /// # Errors
    ///
    /// - `Validation` if `topic_ids` is empty
    /// - `NotFound` naming every unknown topic id
    /// - `Provider` if the upload or job creation fails; the batch, its
    ///   items and runs are all `failed` by the time this returns
    #[tracing::instrument(skip(self, topic_ids), fields(topics = topic_ids.len()))]
    pub async fn submit(
        &self,
        topic_ids: &[Uuid],
        model: Option<&str>,
    ) -> DiptychResult<BatchSnapshot> {
        if topic_ids.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::EmptyTopicIds).into());
        }

        let topics = self.load_topics(topic_ids).await?;
        let model = self.config.model_for(model);
        let now = Utc::now();

        let batch = Batch::queued(&model, now);
        let mut entries = Vec::with_capacity(topic_ids.len());
        let mut lines = Vec::with_capacity(topic_ids.len());
        for topic_id in topic_ids {
            let topic = &topics[topic_id];
            let run = Run::queued(topic.id, Some(model.clone()), now);
            let item = BatchItem::queued(batch.id, &run, now);
            let line = request_line(&item.correlation_id, &model, &build_prompt(topic));
            lines.push(serde_json::to_string(&line).map_err(|e| JsonError::new(e.to_string()))?);
            entries.push(BatchEntry { item, run });
        }

        let mut snapshot = BatchSnapshot { batch, entries };
        self.store.insert_batch(&snapshot).await?;
        tracing::info!(batch_id = %snapshot.batch.id, model = %model, "Batch persisted");

        let contents = lines.join("\n") + "\n";
        match self.dispatch(snapshot.batch.id, contents).await {
            Ok(job) => {
                snapshot.batch.start(&job.id, Utc::now());
                self.store.commit_batch(&snapshot, &[]).await?;
                tracing::info!(
                    batch_id = %snapshot.batch.id,
                    job_id = %job.id,
                    status = %job.status,
                    "Batch submitted"
                );
                Ok(snapshot)
            }
            Err(e) => {
                let cause = e.summary();
                tracing::error!(batch_id = %snapshot.batch.id, error = %cause, "Batch submission failed");
                snapshot.fail_submission(&cause, Utc::now());
                if let Err(persist) = self.store.commit_batch(&snapshot, &[]).await {
                    tracing::error!(error = %persist, "Failed to record batch submission failure");
                }
                Err(e)
            }
        }
    }

    async fn load_topics(&self, topic_ids: &[Uuid]) -> DiptychResult<HashMap<Uuid, Topic>> {
        let topics: HashMap<Uuid, Topic> = self
            .store
            .get_topics(topic_ids)
            .await?
            .into_iter()
            .map(|topic| (topic.id, topic))
            .collect();

        let mut seen = HashSet::new();
        let missing: Vec<Uuid> = topic_ids
            .iter()
            .filter(|id| !topics.contains_key(*id) && seen.insert(**id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(NotFoundError::new(Entity::Topic, missing).into());
        }
        Ok(topics)
    }

    async fn dispatch(&self, batch_id: Uuid, contents: String) -> DiptychResult<RemoteJob> {
        let file_name = format!("batch-{}.jsonl", batch_id);
        let file_id = self.provider.upload_batch_file(&file_name, contents).await?;
        tracing::debug!(file_id = %file_id, "Batch input uploaded");
        self.provider.create_job(&file_id).await
    }
}
