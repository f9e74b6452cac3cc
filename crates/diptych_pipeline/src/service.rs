//! The produced surface: topic, run, artifact and batch operations.

use crate::{BatchSubmitter, ExportReceipt, Exporter, PipelineConfig};
use chrono::Utc;
use diptych_core::{
    Artifact, ArtifactPatch, Batch, BatchSnapshot, NewTopic, Run, Topic, TopicPatch,
};
use diptych_error::{
    DiptychResult, Entity, NotFoundError, ValidationError, ValidationErrorKind,
};
use diptych_interface::{BatchProvider, ContentStore, Task, TaskHandle, TaskQueue, TopicFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// An entity together with the background task enqueued for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queued<T> {
    /// The created or referenced entity
    pub entity: T,
    /// Handle of the enqueued task
    pub task: TaskHandle,
}

/// Operations exposed to the CLI and any other front end.
pub struct ContentService<P: BatchProvider> {
    store: Arc<dyn ContentStore>,
    queue: Arc<dyn TaskQueue>,
    submitter: BatchSubmitter<P>,
    exporter: Exporter,
}

impl<P: BatchProvider> ContentService<P> {
    /// Create a service.
    pub fn new(
        store: Arc<dyn ContentStore>,
        queue: Arc<dyn TaskQueue>,
        provider: P,
        config: PipelineConfig,
        exporter: Exporter,
    ) -> Self {
        let submitter = BatchSubmitter::new(provider, store.clone(), config);
        Self {
            store,
            queue,
            submitter,
            exporter,
        }
    }

    /// Create a topic.
    ///
    /// # Errors
    ///
    /// `Validation` for an invalid or already used slug.
    #[tracing::instrument(skip_all, fields(slug = %new.slug))]
    pub async fn create_topic(&self, new: NewTopic) -> DiptychResult<Topic> {
        check_slug(&new.slug)?;
        let topic = self.store.insert_topic(&Topic::create(new, Utc::now())).await?;
        tracing::info!(topic_id = %topic.id, "Topic created");
        Ok(topic)
    }

    /// Load a topic.
    pub async fn get_topic(&self, id: Uuid) -> DiptychResult<Topic> {
        self.store
            .get_topic(id)
            .await?
            .ok_or_else(|| NotFoundError::new(Entity::Topic, [id]).into())
    }

    /// Load a topic by slug.
    pub async fn find_topic(&self, slug: &str) -> DiptychResult<Topic> {
        let filter = TopicFilter::new().with_slug(slug).with_limit(1);
        self.store
            .list_topics(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NotFoundError::new(Entity::Topic, [slug]).into())
    }

    /// List topics.
    pub async fn list_topics(&self, filter: &TopicFilter) -> DiptychResult<Vec<Topic>> {
        self.store.list_topics(filter).await
    }

    /// Apply a partial update to a topic.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_topic(&self, id: Uuid, patch: TopicPatch) -> DiptychResult<Topic> {
        if let Some(slug) = &patch.slug {
            check_slug(slug)?;
        }
        let mut topic = self.get_topic(id).await?;
        topic.apply(patch, Utc::now());
        self.store.update_topic(&topic).await
    }

    /// Delete a topic and everything generated from it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_topic(&self, id: Uuid) -> DiptychResult<()> {
        self.get_topic(id).await?;
        self.store.delete_topic(id).await?;
        tracing::info!("Topic deleted");
        Ok(())
    }

    /// Create a queued run and enqueue its generation.
    ///
    /// The run is committed before the task is enqueued, so a worker never
    /// sees a task for a run that does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn create_run(&self, topic_id: Uuid, model: Option<String>) -> DiptychResult<Queued<Run>> {
        self.get_topic(topic_id).await?;
        let run = self
            .store
            .insert_run(&Run::queued(topic_id, model, Utc::now()))
            .await?;
        let task = self.queue.enqueue(Task::generate_run(run.id)).await?;
        tracing::info!(run_id = %run.id, task = %task, "Run queued");
        Ok(Queued { entity: run, task })
    }

    /// Load a run.
    pub async fn get_run(&self, id: Uuid) -> DiptychResult<Run> {
        self.store
            .get_run(id)
            .await?
            .ok_or_else(|| NotFoundError::new(Entity::Run, [id]).into())
    }

    /// Artifacts of a run.
    pub async fn run_artifacts(&self, run_id: Uuid) -> DiptychResult<Vec<Artifact>> {
        self.get_run(run_id).await?;
        self.store.list_artifacts(run_id).await
    }

    /// Load an artifact.
    pub async fn get_artifact(&self, id: Uuid) -> DiptychResult<Artifact> {
        self.store
            .get_artifact(id)
            .await?
            .ok_or_else(|| NotFoundError::new(Entity::Artifact, [id]).into())
    }

    /// Apply an editor's update to an artifact.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_artifact(&self, id: Uuid, patch: ArtifactPatch) -> DiptychResult<Artifact> {
        let mut artifact = self.get_artifact(id).await?;
        artifact.apply(patch, Utc::now());
        let artifact = self.store.update_artifact(&artifact).await?;
        tracing::info!(reviewed = artifact.reviewed, "Artifact updated");
        Ok(artifact)
    }

    /// Submit a batch for the given topics.
    pub async fn create_batch(
        &self,
        topic_ids: &[Uuid],
        model: Option<&str>,
    ) -> DiptychResult<BatchSnapshot> {
        self.submitter.submit(topic_ids, model).await
    }

    /// Load a batch with its items.
    pub async fn get_batch(&self, id: Uuid) -> DiptychResult<BatchSnapshot> {
        self.store
            .get_batch(id)
            .await?
            .ok_or_else(|| NotFoundError::new(Entity::Batch, [id]).into())
    }

    /// Enqueue reconciliation of a submitted batch.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown batch
    /// - `Validation` (`MissingJobHandle`) if the batch was never submitted
    #[tracing::instrument(skip(self))]
    pub async fn poll_batch(&self, id: Uuid) -> DiptychResult<Queued<Batch>> {
        let snapshot = self.get_batch(id).await?;
        if snapshot.batch.provider_job_id.is_none() {
            return Err(
                ValidationError::new(ValidationErrorKind::MissingJobHandle(id.to_string())).into(),
            );
        }
        let task = self.queue.enqueue(Task::poll_batch(id)).await?;
        tracing::info!(task = %task, "Batch poll queued");
        Ok(Queued {
            entity: snapshot.batch,
            task,
        })
    }

    /// Export a run after the gate passes.
    pub async fn export_run(&self, run_id: Uuid) -> DiptychResult<ExportReceipt> {
        let run = self.get_run(run_id).await?;
        let topic = self.get_topic(run.topic_id).await?;
        let artifacts = self.store.list_artifacts(run_id).await?;
        self.exporter.export(&run, &topic, &artifacts).await
    }
}

fn check_slug(slug: &str) -> DiptychResult<()> {
    match NewTopic::slug_problem(slug) {
        Some(reason) => Err(ValidationError::new(ValidationErrorKind::InvalidField {
            field: "slug".to_string(),
            reason,
        })
        .into()),
        None => Ok(()),
    }
}
