// Tests for the content service surface.

mod test_utils;

use diptych_core::{ArtifactPatch, BatchStatus, NewTopic, RunStatus, TopicPatch};
use diptych_error::{DiptychErrorKind, ErrorClass, ValidationErrorKind};
use diptych_interface::{ContentStore, TaskKind, TopicFilter};
use diptych_pipeline::{
    ContentService, Exporter, InMemoryTaskQueue, PipelineConfig, RunExecutor,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use test_utils::{MockBatchProvider, MockDriver, good_response, store};
use uuid::Uuid;

fn service(
    store: Arc<dyn ContentStore>,
    queue: &InMemoryTaskQueue,
    provider: &MockBatchProvider,
    root: Option<PathBuf>,
) -> ContentService<MockBatchProvider> {
    ContentService::new(
        store,
        Arc::new(queue.clone()),
        provider.clone(),
        PipelineConfig::default(),
        Exporter::new(root),
    )
}

fn new_topic(slug: &str) -> NewTopic {
    NewTopic::builder()
        .slug(slug)
        .tags(json!({"section": "science"}).as_object().cloned().unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_topic_crud() -> anyhow::Result<()> {
    let (memory, store) = store();
    let queue = InMemoryTaskQueue::new();
    let service = service(store, &queue, &MockBatchProvider::new(), None);

    let topic = service.create_topic(new_topic("moon")).await?;
    assert_eq!(service.get_topic(topic.id).await?, topic);
    assert_eq!(service.find_topic("moon").await?.id, topic.id);

    let err = service.create_topic(new_topic("moon")).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conflict);

    let patched = service
        .update_topic(
            topic.id,
            TopicPatch {
                slug: Some("the-moon".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(patched.slug, "the-moon");
    assert_eq!(patched.tags, topic.tags);
    assert!(patched.updated_at >= topic.updated_at);

    let listed = service
        .list_topics(&TopicFilter::new().with_slug("the-moon"))
        .await?;
    assert_eq!(listed, vec![patched]);

    service.delete_topic(topic.id).await?;
    assert!(memory.is_empty().await);
    let err = service.get_topic(topic.id).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_blank_slug_is_rejected() {
    let (_, store) = store();
    let queue = InMemoryTaskQueue::new();
    let service = service(store, &queue, &MockBatchProvider::new(), None);
    let topic = service.create_topic(new_topic("valid")).await.unwrap();

    let err = service
        .update_topic(
            topic.id,
            TopicPatch {
                slug: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    match err.kind() {
        DiptychErrorKind::Validation(e) => assert!(matches!(
            e.kind(),
            ValidationErrorKind::InvalidField { field, .. } if field == "slug"
        )),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_run_enqueues_generation() -> anyhow::Result<()> {
    let (_, store) = store();
    let queue = InMemoryTaskQueue::new();
    let service = service(store.clone(), &queue, &MockBatchProvider::new(), None);
    let topic = service.create_topic(new_topic("queued")).await?;

    let queued = service.create_run(topic.id, Some("gpt-4o".to_string())).await?;
    assert_eq!(queued.entity.status, RunStatus::Queued);
    assert_eq!(queued.entity.model.as_deref(), Some("gpt-4o"));
    assert_eq!(service.get_run(queued.entity.id).await?, queued.entity);

    let tasks = queue.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::GenerateRun);
    assert_eq!(tasks[0].argument, queued.entity.id);

    let err = service.create_run(Uuid::new_v4(), None).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(queue.tasks().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_review_and_export_flow() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (_, store) = store();
    let queue = InMemoryTaskQueue::new();
    let service = service(
        store.clone(),
        &queue,
        &MockBatchProvider::new(),
        Some(dir.path().to_path_buf()),
    );
    let topic = service.create_topic(new_topic("review-me")).await?;
    let run = service.create_run(topic.id, None).await?.entity;

    RunExecutor::new(
        MockDriver::new_response(good_response()),
        store.clone(),
        PipelineConfig::default(),
    )
    .execute(run.id)
    .await?;

    let err = service.export_run(run.id).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::GateBlocked);

    for artifact in service.run_artifacts(run.id).await? {
        let updated = service
            .update_artifact(
                artifact.id,
                ArtifactPatch {
                    reviewed: Some(true),
                    review_notes: Some(Some("looks right".to_string())),
                    ..Default::default()
                },
            )
            .await?;
        assert!(updated.reviewed);
        assert_eq!(updated.body, artifact.body);
    }

    let receipt = service.export_run(run.id).await?;
    assert_eq!(receipt.files.len(), 2);
    assert!(dir.path().join("src/content/blog/en/review-me.mdx").exists());
    Ok(())
}

#[tokio::test]
async fn test_poll_batch_requires_job_handle() -> anyhow::Result<()> {
    let (_, store) = store();
    let queue = InMemoryTaskQueue::new();
    let failing = MockBatchProvider::new_upload_error(diptych_error::ProviderErrorKind::Request(
        "connection reset".to_string(),
    ));
    let service = service(store.clone(), &queue, &failing, None);
    let topic = service.create_topic(new_topic("batched")).await?;

    assert!(service.create_batch(&[topic.id], None).await.is_err());
    let (file_name, _) = failing.uploads().pop().unwrap();
    let batch_id = Uuid::parse_str(
        file_name
            .trim_start_matches("batch-")
            .trim_end_matches(".jsonl"),
    )?;
    let snapshot = service.get_batch(batch_id).await?;
    assert_eq!(snapshot.batch.status, BatchStatus::Failed);

    let err = service.poll_batch(batch_id).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conflict);
    assert!(queue.tasks().await.is_empty());

    let working = MockBatchProvider::new();
    let service = self::service(store, &queue, &working, None);
    let submitted = service.create_batch(&[topic.id], None).await?;
    let queued = service.poll_batch(submitted.batch.id).await?;
    assert_eq!(queued.entity.id, submitted.batch.id);
    let tasks = queue.tasks().await;
    assert_eq!(tasks[0].kind, TaskKind::PollBatch);
    assert_eq!(tasks[0].argument, submitted.batch.id);
    Ok(())
}
