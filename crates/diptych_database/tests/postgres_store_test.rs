//! Integration tests for the PostgreSQL content store and task queue.
//!
//! These need a live database at `DATABASE_URL` and run only with the
//! `database-tests` feature.

#![cfg(feature = "database-tests")]

use chrono::Utc;
use diesel::pg::PgConnection;
use diptych_core::{
    ArtifactContent, ArtifactWrite, Batch, BatchEntry, BatchItem, BatchSnapshot, BatchStatus,
    Lang, NewTopic, Run, RunStatus, Topic,
};
use diptych_database::{PostgresContentStore, PostgresTaskQueue, establish_connection, run_migrations};
use diptych_error::{DiptychErrorKind, StoreErrorKind, ValidationErrorKind};
use diptych_interface::{ClaimedTask, ContentStore, Task, TaskQueue, TaskSource, TopicFilter};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

fn connect() -> anyhow::Result<PgConnection> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL")?;
    let mut conn = establish_connection(&url)?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

fn unique_slug(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn topic(slug: &str) -> anyhow::Result<Topic> {
    let new = NewTopic::builder()
        .slug(slug)
        .fr(json!({"title": "Les marées"}).as_object().cloned().unwrap_or_default())
        .en(json!({"title": "Tides"}).as_object().cloned().unwrap_or_default())
        .build()?;
    Ok(Topic::create(new, Utc::now()))
}

fn write(run_id: Uuid, lang: Lang, body: &str) -> ArtifactWrite {
    ArtifactWrite {
        run_id,
        lang,
        content: ArtifactContent {
            frontmatter: json!({"title": body}).as_object().cloned().unwrap_or_default(),
            body: body.to_string(),
        },
    }
}

#[tokio::test]
async fn test_topic_crud_and_slug_conflict() -> anyhow::Result<()> {
    let store = PostgresContentStore::new(connect()?);
    let slug = unique_slug("tides");
    let created = store.insert_topic(&topic(&slug)?).await?;
    assert_eq!(created.slug, slug);

    let err = store.insert_topic(&topic(&slug)?).await.unwrap_err();
    assert!(matches!(
        err.kind(),
        DiptychErrorKind::Validation(e) if e.kind() == &ValidationErrorKind::SlugTaken(slug.clone())
    ));

    let found = store
        .list_topics(&TopicFilter::new().with_slug(slug.clone()))
        .await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, created.id);

    let mut renamed = created.clone();
    renamed.slug = unique_slug("marees");
    let updated = store.update_topic(&renamed).await?;
    assert_eq!(updated.slug, renamed.slug);

    store.delete_topic(created.id).await?;
    assert!(store.get_topic(created.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_deleting_missing_topic_is_row_missing() -> anyhow::Result<()> {
    let store = PostgresContentStore::new(connect()?);
    let err = store.delete_topic(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(
        err.kind(),
        DiptychErrorKind::Store(e) if e.kind == StoreErrorKind::RowMissing
    ));
    Ok(())
}

#[tokio::test]
async fn test_commit_run_upserts_artifacts_and_resets_review() -> anyhow::Result<()> {
    let store = PostgresContentStore::new(connect()?);
    let topic = store.insert_topic(&topic(&unique_slug("commit"))?).await?;
    let mut run = store.insert_run(&Run::queued(topic.id, None, Utc::now())).await?;

    run.begin(Utc::now());
    run = store.update_run(&run).await?;
    run.succeed(Default::default(), Utc::now());
    let committed = store
        .commit_run(
            &run,
            &[write(run.id, Lang::Fr, "Bonjour"), write(run.id, Lang::En, "Hello")],
        )
        .await?;
    assert_eq!(committed.status, RunStatus::Succeeded);
    assert!(committed.finished_at.is_some());

    let artifacts = store.list_artifacts(run.id).await?;
    assert_eq!(
        artifacts.iter().map(|a| a.lang).collect::<Vec<_>>(),
        vec![Lang::En, Lang::Fr]
    );

    let mut reviewed = artifacts[1].clone();
    reviewed.reviewed = true;
    reviewed.review_notes = Some("ok".to_string());
    store.update_artifact(&reviewed).await?;

    let again = store.upsert_artifact(&write(run.id, Lang::Fr, "Salut")).await?;
    assert_eq!(again.id, reviewed.id);
    assert_eq!(again.body, "Salut");
    assert!(!again.reviewed);
    assert_eq!(again.review_notes, None);
    assert_eq!(store.list_artifacts(run.id).await?.len(), 2);

    store.delete_topic(topic.id).await?;
    Ok(())
}

#[tokio::test]
async fn test_batch_snapshot_keeps_submission_order() -> anyhow::Result<()> {
    let store = PostgresContentStore::new(connect()?);
    let now = Utc::now();
    let mut topics = Vec::new();
    for prefix in ["first", "second", "third"] {
        topics.push(store.insert_topic(&topic(&unique_slug(prefix))?).await?);
    }

    let mut batch = Batch::queued("gpt-4o-mini", now);
    let entries = topics
        .iter()
        .map(|t| {
            let run = Run::queued(t.id, Some("gpt-4o-mini".to_string()), now);
            BatchEntry {
                item: BatchItem::queued(batch.id, &run, now),
                run,
            }
        })
        .collect::<Vec<_>>();
    let mut snapshot = BatchSnapshot {
        batch: batch.clone(),
        entries,
    };
    store.insert_batch(&snapshot).await?;

    let loaded = store.get_batch(batch.id).await?.unwrap();
    assert_eq!(
        loaded.entries.iter().map(|e| e.run.topic_id).collect::<Vec<_>>(),
        topics.iter().map(|t| t.id).collect::<Vec<_>>()
    );
    assert_eq!(loaded.batch.status, BatchStatus::Queued);

    batch.start("batch_abc", Utc::now());
    snapshot.batch = batch.clone();
    for entry in &mut snapshot.entries {
        entry.run.begin(Utc::now());
        entry.item.status = BatchStatus::Running;
    }
    store.commit_batch(&snapshot, &[]).await?;

    let loaded = store.get_batch(batch.id).await?.unwrap();
    assert_eq!(loaded.batch.provider_job_id.as_deref(), Some("batch_abc"));
    assert!(
        loaded
            .entries
            .iter()
            .all(|e| e.run.status == RunStatus::Running && e.item.status == BatchStatus::Running)
    );

    for t in topics {
        store.delete_topic(t.id).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_run_belongs_to_at_most_one_batch() -> anyhow::Result<()> {
    use diesel::RunQueryDsl;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use diesel::sql_types::Uuid as SqlUuid;

    let store = PostgresContentStore::new(connect()?);
    let now = Utc::now();
    let t = store.insert_topic(&topic(&unique_slug("owned"))?).await?;
    let batch = Batch::queued("gpt-4o-mini", now);
    let run = Run::queued(t.id, None, now);
    let item = BatchItem::queued(batch.id, &run, now);
    store
        .insert_batch(&BatchSnapshot {
            batch: batch.clone(),
            entries: vec![BatchEntry {
                item: item.clone(),
                run: run.clone(),
            }],
        })
        .await?;

    let owner = store.batch_item_for_run(run.id).await?.unwrap();
    assert_eq!(owner.id, item.id);
    assert_eq!(owner.batch_id, batch.id);
    let unbatched = Run::queued(t.id, None, now);
    store.insert_run(&unbatched).await?;
    assert!(store.batch_item_for_run(unbatched.id).await?.is_none());

    let mut conn = connect()?;
    let other_batch = Uuid::new_v4();
    diesel::sql_query(
        "INSERT INTO batches (id, model, status) VALUES ($1, 'gpt-4o-mini', 'queued')",
    )
    .bind::<SqlUuid, _>(other_batch)
    .execute(&mut conn)?;
    let err = diesel::sql_query(
        "INSERT INTO batch_items (id, batch_id, run_id, topic_id, position, correlation_id, status) \
         VALUES ($1, $2, $3, $4, 0, $5, 'queued')",
    )
    .bind::<SqlUuid, _>(Uuid::new_v4())
    .bind::<SqlUuid, _>(other_batch)
    .bind::<SqlUuid, _>(run.id)
    .bind::<SqlUuid, _>(t.id)
    .bind::<diesel::sql_types::Text, _>(Uuid::new_v4().to_string())
    .execute(&mut conn)
    .unwrap_err();
    assert!(matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    ));

    diesel::sql_query("DELETE FROM batches WHERE id = $1")
        .bind::<SqlUuid, _>(other_batch)
        .execute(&mut conn)?;
    store.delete_topic(t.id).await?;
    Ok(())
}

#[tokio::test]
async fn test_task_queue_claims_and_retries() -> anyhow::Result<()> {
    let queue = PostgresTaskQueue::new(connect()?);
    let run_id = Uuid::new_v4();
    queue.enqueue(Task::generate_run(run_id)).await?;

    // Other tests may share the table; settle anything that is not ours.
    let claimed = loop {
        let Some(claimed) = queue.claim().await? else {
            anyhow::bail!("enqueued task was never claimed");
        };
        if claimed.task.argument == run_id {
            break claimed;
        }
        queue.complete(claimed.id).await?;
    };
    assert_eq!(claimed.task, Task::generate_run(run_id));
    assert_eq!(claimed.attempts, 1);

    queue
        .retry(claimed.id, "HTTP 429 error: slow down", Duration::from_secs(3600))
        .await?;
    assert!(queue.complete(claimed.id).await.is_err());
    Ok(())
}

/// Claim until the task for `argument` comes up, completing others.
async fn claim_task(queue: &PostgresTaskQueue, argument: Uuid) -> anyhow::Result<ClaimedTask> {
    loop {
        let Some(claimed) = queue.claim().await? else {
            anyhow::bail!("enqueued task was never claimed");
        };
        if claimed.task.argument == argument {
            return Ok(claimed);
        }
        queue.complete(claimed.id).await?;
    }
}

#[tokio::test]
async fn test_release_claimed_respects_the_lease() -> anyhow::Result<()> {
    let queue = PostgresTaskQueue::new(connect()?);
    let batch_id = Uuid::new_v4();
    queue.enqueue(Task::poll_batch(batch_id)).await?;

    let first = claim_task(&queue, batch_id).await?;
    queue.release_claimed(Duration::from_secs(3600)).await?;
    queue.retry(first.id, "still held", Duration::ZERO).await?;

    let second = claim_task(&queue, batch_id).await?;
    assert_eq!(second.id, first.id);
    assert_eq!(second.attempts, 2);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(queue.release_claimed(Duration::from_millis(500)).await? >= 1);
    assert!(queue.complete(second.id).await.is_err());

    let third = claim_task(&queue, batch_id).await?;
    assert_eq!(third.id, first.id);
    queue.complete(third.id).await?;
    Ok(())
}
