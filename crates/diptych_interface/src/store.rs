//! Persistence for topics, runs, artifacts and batches.

use async_trait::async_trait;
use diptych_core::{Artifact, ArtifactWrite, BatchItem, BatchSnapshot, Run, Topic};
use diptych_error::DiptychResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Repository for every entity the pipeline reads and writes.
///
/// Methods that take several records (`commit_run`, `insert_batch`,
/// `commit_batch`) write them atomically: either all rows change or none
/// do. Implementations never hold a write transaction across a provider
/// call because no provider call happens inside this trait.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a topic. A duplicate slug is a `SlugTaken` validation error.
    async fn insert_topic(&self, topic: &Topic) -> DiptychResult<Topic>;

    /// Load a topic.
    async fn get_topic(&self, id: Uuid) -> DiptychResult<Option<Topic>>;

    /// Load every listed topic that exists, in no particular order.
    async fn get_topics(&self, ids: &[Uuid]) -> DiptychResult<Vec<Topic>>;

    /// List topics matching the filter, newest first.
    async fn list_topics(&self, filter: &TopicFilter) -> DiptychResult<Vec<Topic>>;

    /// Replace a topic's fields. A duplicate slug is a `SlugTaken` validation error.
    async fn update_topic(&self, topic: &Topic) -> DiptychResult<Topic>;

    /// Delete a topic, cascading to its runs, their artifacts and batch items.
    async fn delete_topic(&self, id: Uuid) -> DiptychResult<()>;

    /// Insert a run.
    async fn insert_run(&self, run: &Run) -> DiptychResult<Run>;

    /// Load a run.
    async fn get_run(&self, id: Uuid) -> DiptychResult<Option<Run>>;

    /// Persist a run's current state.
    async fn update_run(&self, run: &Run) -> DiptychResult<Run>;

    /// Persist a run together with its artifact writes in one transaction.
    async fn commit_run(&self, run: &Run, artifacts: &[ArtifactWrite]) -> DiptychResult<Run>;

    /// Create or overwrite the artifact for `(run, lang)`.
    ///
    /// Overwrites reset `reviewed` to false and clear the review notes.
    async fn upsert_artifact(&self, write: &ArtifactWrite) -> DiptychResult<Artifact>;

    /// Load an artifact.
    async fn get_artifact(&self, id: Uuid) -> DiptychResult<Option<Artifact>>;

    /// Artifacts of a run, ordered by language.
    async fn list_artifacts(&self, run_id: Uuid) -> DiptychResult<Vec<Artifact>>;

    /// Persist an edited artifact.
    async fn update_artifact(&self, artifact: &Artifact) -> DiptychResult<Artifact>;

    /// Insert a batch with all of its runs and items in one transaction.
    async fn insert_batch(&self, snapshot: &BatchSnapshot) -> DiptychResult<()>;

    /// Load a batch with its items and their runs.
    async fn get_batch(&self, id: Uuid) -> DiptychResult<Option<BatchSnapshot>>;

    /// The batch item that owns a run, or `None` for a synchronous run.
    async fn batch_item_for_run(&self, run_id: Uuid) -> DiptychResult<Option<BatchItem>>;

    /// Persist a batch, its items, their runs and any artifact writes in one
    /// transaction.
    async fn commit_batch(
        &self,
        snapshot: &BatchSnapshot,
        artifacts: &[ArtifactWrite],
    ) -> DiptychResult<()>;
}

/// Filter criteria for listing topics.
///
/// # Examples
///
/// ```
/// use diptych_interface::TopicFilter;
///
/// let filter = TopicFilter::new().with_slug("hello").with_limit(10);
/// assert_eq!(filter.slug.as_deref(), Some("hello"));
/// assert_eq!(filter.limit, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFilter {
    /// Exact slug match
    pub slug: Option<String>,
    /// Maximum number of results to return
    pub limit: Option<usize>,
    /// Number of results to skip
    pub offset: Option<usize>,
}

impl TopicFilter {
    /// Create a filter that matches every topic.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match one slug.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Limit the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` results.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}
