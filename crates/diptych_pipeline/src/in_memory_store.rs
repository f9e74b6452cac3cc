//! In-memory implementation of ContentStore for testing.
//!
//! All entities share a single `RwLock`, so each multi-record write takes
//! the lock once and is atomic with respect to other callers.

use async_trait::async_trait;
use chrono::Utc;
use diptych_core::{Artifact, ArtifactWrite, Batch, BatchEntry, BatchItem, BatchSnapshot, Run, Topic};
use diptych_error::{
    DiptychResult, StoreError, StoreErrorKind, ValidationError, ValidationErrorKind,
};
use diptych_interface::{ContentStore, TopicFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    topics: HashMap<Uuid, Topic>,
    runs: HashMap<Uuid, Run>,
    artifacts: HashMap<Uuid, Artifact>,
    batches: HashMap<Uuid, Batch>,
    /// Kept in insertion order so a batch lists its items as submitted
    items: Vec<BatchItem>,
}

impl State {
    fn slug_taken(&self, slug: &str, except: Uuid) -> bool {
        self.topics
            .values()
            .any(|topic| topic.slug == slug && topic.id != except)
    }

    fn upsert_artifact(&mut self, write: &ArtifactWrite) -> Artifact {
        let now = Utc::now();
        let existing = self
            .artifacts
            .values_mut()
            .find(|a| a.run_id == write.run_id && a.lang == write.lang);
        let artifact = match existing {
            Some(artifact) => {
                artifact.overwrite(&write.content, now);
                artifact.clone()
            }
            None => Artifact::create(write, now),
        };
        self.artifacts.insert(artifact.id, artifact.clone());
        artifact
    }

    fn put_item(&mut self, item: &BatchItem) {
        match self.items.iter_mut().find(|stored| stored.id == item.id) {
            Some(stored) => *stored = item.clone(),
            None => self.items.push(item.clone()),
        }
    }

    fn replace_run(&mut self, run: &Run) -> DiptychResult<()> {
        match self.runs.get_mut(&run.id) {
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(StoreError::new(StoreErrorKind::RowMissing).into()),
        }
    }
}

/// In-memory content store.
///
/// All data is lost when the last clone is dropped.
///
/// # Example
/// ```no_run
/// use diptych_pipeline::InMemoryContentStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryContentStore::new();
///     assert!(store.is_empty().await);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored topics (for testing).
    pub async fn len(&self) -> usize {
        self.state.read().await.topics.len()
    }

    /// Whether the store holds no topics (for testing).
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.topics.is_empty()
    }

    /// Number of stored artifacts (for testing).
    pub async fn artifact_count(&self) -> usize {
        self.state.read().await.artifacts.len()
    }

    /// Remove everything (for testing).
    pub async fn clear(&self) {
        *self.state.write().await = State::default();
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn insert_topic(&self, topic: &Topic) -> DiptychResult<Topic> {
        let mut state = self.state.write().await;
        if state.slug_taken(&topic.slug, topic.id) {
            return Err(ValidationError::new(ValidationErrorKind::SlugTaken(topic.slug.clone())).into());
        }
        state.topics.insert(topic.id, topic.clone());
        Ok(topic.clone())
    }

    async fn get_topic(&self, id: Uuid) -> DiptychResult<Option<Topic>> {
        Ok(self.state.read().await.topics.get(&id).cloned())
    }

    async fn get_topics(&self, ids: &[Uuid]) -> DiptychResult<Vec<Topic>> {
        let state = self.state.read().await;
        let mut topics: Vec<Topic> = state
            .topics
            .values()
            .filter(|topic| ids.contains(&topic.id))
            .cloned()
            .collect();
        topics.sort_by_key(|topic| topic.id);
        Ok(topics)
    }

    async fn list_topics(&self, filter: &TopicFilter) -> DiptychResult<Vec<Topic>> {
        let state = self.state.read().await;
        let mut topics: Vec<Topic> = state
            .topics
            .values()
            .filter(|topic| {
                filter
                    .slug
                    .as_deref()
                    .is_none_or(|slug| topic.slug == slug)
            })
            .cloned()
            .collect();
        topics.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.slug.cmp(&b.slug)));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(topics.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_topic(&self, topic: &Topic) -> DiptychResult<Topic> {
        let mut state = self.state.write().await;
        if !state.topics.contains_key(&topic.id) {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        if state.slug_taken(&topic.slug, topic.id) {
            return Err(ValidationError::new(ValidationErrorKind::SlugTaken(topic.slug.clone())).into());
        }
        state.topics.insert(topic.id, topic.clone());
        Ok(topic.clone())
    }

    async fn delete_topic(&self, id: Uuid) -> DiptychResult<()> {
        let mut state = self.state.write().await;
        if state.topics.remove(&id).is_none() {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        state.runs.retain(|_, run| run.topic_id != id);
        let State {
            runs,
            artifacts,
            items,
            ..
        } = &mut *state;
        artifacts.retain(|_, artifact| runs.contains_key(&artifact.run_id));
        items.retain(|item| runs.contains_key(&item.run_id));
        Ok(())
    }

    async fn insert_run(&self, run: &Run) -> DiptychResult<Run> {
        let mut state = self.state.write().await;
        if !state.topics.contains_key(&run.topic_id) {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        state.runs.insert(run.id, run.clone());
        Ok(run.clone())
    }

    async fn get_run(&self, id: Uuid) -> DiptychResult<Option<Run>> {
        Ok(self.state.read().await.runs.get(&id).cloned())
    }

    async fn update_run(&self, run: &Run) -> DiptychResult<Run> {
        self.state.write().await.replace_run(run)?;
        Ok(run.clone())
    }

    async fn commit_run(&self, run: &Run, artifacts: &[ArtifactWrite]) -> DiptychResult<Run> {
        let mut state = self.state.write().await;
        if !state.runs.contains_key(&run.id) {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        for write in artifacts {
            state.upsert_artifact(write);
        }
        state.replace_run(run)?;
        Ok(run.clone())
    }

    async fn upsert_artifact(&self, write: &ArtifactWrite) -> DiptychResult<Artifact> {
        let mut state = self.state.write().await;
        if !state.runs.contains_key(&write.run_id) {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        Ok(state.upsert_artifact(write))
    }

    async fn get_artifact(&self, id: Uuid) -> DiptychResult<Option<Artifact>> {
        Ok(self.state.read().await.artifacts.get(&id).cloned())
    }

    async fn list_artifacts(&self, run_id: Uuid) -> DiptychResult<Vec<Artifact>> {
        let state = self.state.read().await;
        let mut artifacts: Vec<Artifact> = state
            .artifacts
            .values()
            .filter(|artifact| artifact.run_id == run_id)
            .cloned()
            .collect();
        artifacts.sort_by_key(|artifact| artifact.lang.to_string());
        Ok(artifacts)
    }

    async fn update_artifact(&self, artifact: &Artifact) -> DiptychResult<Artifact> {
        let mut state = self.state.write().await;
        match state.artifacts.get_mut(&artifact.id) {
            Some(stored) => {
                *stored = artifact.clone();
                Ok(artifact.clone())
            }
            None => Err(StoreError::new(StoreErrorKind::RowMissing).into()),
        }
    }

    async fn insert_batch(&self, snapshot: &BatchSnapshot) -> DiptychResult<()> {
        let mut state = self.state.write().await;
        if let Some(entry) = snapshot
            .entries
            .iter()
            .find(|entry| !state.topics.contains_key(&entry.run.topic_id))
        {
            tracing::debug!(topic_id = %entry.run.topic_id, "Batch references a missing topic");
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        state.batches.insert(snapshot.batch.id, snapshot.batch.clone());
        for entry in &snapshot.entries {
            state.runs.insert(entry.run.id, entry.run.clone());
            state.put_item(&entry.item);
        }
        Ok(())
    }

    async fn get_batch(&self, id: Uuid) -> DiptychResult<Option<BatchSnapshot>> {
        let state = self.state.read().await;
        let Some(batch) = state.batches.get(&id).cloned() else {
            return Ok(None);
        };
        let mut entries = Vec::new();
        for item in state.items.iter().filter(|item| item.batch_id == id) {
            let run = state
                .runs
                .get(&item.run_id)
                .cloned()
                .ok_or_else(|| StoreError::new(StoreErrorKind::RowMissing))?;
            entries.push(BatchEntry {
                item: item.clone(),
                run,
            });
        }
        Ok(Some(BatchSnapshot { batch, entries }))
    }

    async fn batch_item_for_run(&self, run_id: Uuid) -> DiptychResult<Option<BatchItem>> {
        let state = self.state.read().await;
        Ok(state.items.iter().find(|item| item.run_id == run_id).cloned())
    }

    async fn commit_batch(
        &self,
        snapshot: &BatchSnapshot,
        artifacts: &[ArtifactWrite],
    ) -> DiptychResult<()> {
        let mut state = self.state.write().await;
        if !state.batches.contains_key(&snapshot.batch.id)
            || snapshot
                .entries
                .iter()
                .any(|entry| !state.runs.contains_key(&entry.run.id))
        {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        for write in artifacts {
            state.upsert_artifact(write);
        }
        state.batches.insert(snapshot.batch.id, snapshot.batch.clone());
        for entry in &snapshot.entries {
            state.runs.insert(entry.run.id, entry.run.clone());
            state.put_item(&entry.item);
        }
        Ok(())
    }
}
