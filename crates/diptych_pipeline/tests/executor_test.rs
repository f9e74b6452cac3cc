// Tests for single-run execution.
//
// The executor is driven with a mock driver over the in-memory store, so
// every assertion is on committed state.

mod test_utils;

use chrono::Utc;
use diptych_core::{BatchStatus, Lang, Run, RunStatus};
use diptych_error::{DiptychErrorKind, ErrorClass, ProviderErrorKind};
use diptych_interface::ContentStore;
use diptych_pipeline::{BatchReconciler, BatchSubmitter, PipelineConfig, RunExecutor, RunOutcome};
use serde_json::json;
use std::sync::Arc;
use test_utils::{
    MockBatchProvider, MockDriver, good_response, payload, response_with, seed_topic, store,
};
use uuid::Uuid;

#[tokio::test]
async fn test_execute_commits_run_and_both_artifacts() -> anyhow::Result<()> {
    let (memory, store) = store();
    let topic = seed_topic(&store, "tides").await;
    let run = store.insert_run(&Run::queued(topic.id, None, Utc::now())).await?;

    let driver = Arc::new(MockDriver::new_response(good_response()));
    let executor = RunExecutor::new(driver.clone(), store.clone(), PipelineConfig::default());

    let outcome = executor.execute(run.id).await?;
    let RunOutcome::Succeeded(done) = outcome else {
        panic!("expected success, got {:?}", outcome);
    };

    assert_eq!(done.status, RunStatus::Succeeded);
    assert!(done.started_at.is_some());
    assert!(done.finished_at.is_some());
    assert!(done.error.is_none());
    assert!(done.is_consistent());

    let artifacts = store.list_artifacts(run.id).await?;
    let langs: Vec<Lang> = artifacts.iter().map(|a| a.lang).collect();
    assert_eq!(langs, vec![Lang::En, Lang::Fr]);
    assert!(artifacts.iter().all(|a| !a.reviewed));
    assert_eq!(memory.artifact_count().await, 2);

    let (model, prompt) = &driver.prompts()[0];
    assert_eq!(model, "gpt-4.1-mini");
    assert!(prompt.user.contains("\"slug\":\"tides\""));
    Ok(())
}

#[tokio::test]
async fn test_run_model_overrides_default() -> anyhow::Result<()> {
    let (_, store) = store();
    let topic = seed_topic(&store, "model-choice").await;
    let run = store
        .insert_run(&Run::queued(topic.id, Some("gpt-4o".to_string()), Utc::now()))
        .await?;

    let driver = Arc::new(MockDriver::new_response(good_response()));
    RunExecutor::new(driver.clone(), store, PipelineConfig::default())
        .execute(run.id)
        .await?;

    assert_eq!(driver.prompts()[0].0, "gpt-4o");
    Ok(())
}

#[tokio::test]
async fn test_succeeded_and_running_runs_are_skipped() -> anyhow::Result<()> {
    let (_, store) = store();
    let topic = seed_topic(&store, "skip").await;

    let mut succeeded = Run::queued(topic.id, None, Utc::now());
    succeeded.succeed(Default::default(), Utc::now());
    let mut running = Run::queued(topic.id, None, Utc::now());
    running.begin(Utc::now());
    store.insert_run(&succeeded).await?;
    store.insert_run(&running).await?;

    let driver = Arc::new(MockDriver::new_response(good_response()));
    let executor = RunExecutor::new(driver.clone(), store.clone(), PipelineConfig::default());

    for run in [&succeeded, &running] {
        let outcome = executor.execute(run.id).await?;
        assert!(outcome.is_skipped());
        assert_eq!(outcome.run(), run);
        assert_eq!(store.get_run(run.id).await?.as_ref(), Some(run));
    }
    assert_eq!(driver.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_batch_runs_are_left_to_reconciliation() -> anyhow::Result<()> {
    let (memory, store) = store();
    let queued_topic = seed_topic(&store, "batch-queued").await;
    let failed_topic = seed_topic(&store, "batch-failed").await;
    let provider = MockBatchProvider::new();
    let submitter = BatchSubmitter::new(provider.clone(), store.clone(), PipelineConfig::default());

    let queued = submitter.submit(&[queued_topic.id], None).await?;
    let failed = submitter.submit(&[failed_topic.id], None).await?;
    provider.complete_with("");
    BatchReconciler::new(provider.clone(), store.clone(), PipelineConfig::default())
        .reconcile(failed.batch.id)
        .await?;
    let settled = store.get_batch(failed.batch.id).await?.unwrap();
    assert_eq!(settled.entries[0].item.status, BatchStatus::Failed);
    assert_eq!(settled.entries[0].run.status, RunStatus::Failed);

    let driver = Arc::new(MockDriver::new_response(good_response()));
    let executor = RunExecutor::new(driver.clone(), store.clone(), PipelineConfig::default());
    for snapshot in [&queued, &settled] {
        let run_id = snapshot.entries[0].run.id;
        let outcome = executor.execute(run_id).await?;
        assert!(outcome.is_skipped());
        assert_eq!(outcome.run(), &snapshot.entries[0].run);
    }

    assert_eq!(driver.call_count(), 0);
    assert_eq!(memory.artifact_count().await, 0);
    assert_eq!(store.get_batch(failed.batch.id).await?, Some(settled));
    let still_queued = store.get_batch(queued.batch.id).await?.unwrap();
    assert_eq!(still_queued.entries[0].run.status, RunStatus::Queued);
    assert_eq!(still_queued.entries[0].item.status, BatchStatus::Queued);
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_is_recorded_then_retry_succeeds() -> anyhow::Result<()> {
    let (_, store) = store();
    let topic = seed_topic(&store, "flaky").await;
    let run = store.insert_run(&Run::queued(topic.id, None, Utc::now())).await?;

    let driver = Arc::new(MockDriver::new_fail_then_respond(
        1,
        ProviderErrorKind::Http {
            status_code: 503,
            message: "overloaded".to_string(),
        },
        good_response(),
    ));
    let executor = RunExecutor::new(driver.clone(), store.clone(), PipelineConfig::default());

    let err = executor.execute(run.id).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Provider);
    assert!(err.should_retry());

    let failed = store.get_run(run.id).await?.unwrap();
    assert_eq!(failed.status, RunStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("HTTP 503 error: overloaded"));
    assert!(failed.finished_at.is_some());
    assert!(failed.is_consistent());
    assert!(store.list_artifacts(run.id).await?.is_empty());

    let outcome = executor.execute(run.id).await?;
    assert!(matches!(outcome, RunOutcome::Succeeded(_)));
    let done = store.get_run(run.id).await?.unwrap();
    assert_eq!(done.status, RunStatus::Succeeded);
    assert!(done.error.is_none());
    assert_eq!(driver.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_malformed_output_fails_run_without_artifacts() -> anyhow::Result<()> {
    let (_, store) = store();
    let topic = seed_topic(&store, "malformed").await;
    let run = store.insert_run(&Run::queued(topic.id, None, Utc::now())).await?;

    let missing_en = json!({
        "meta": {},
        "artifacts": {"fr": {"frontmatter": {}, "body": "Bonjour"}}
    });
    let driver = MockDriver::new_response(response_with(&missing_en));
    let err = RunExecutor::new(driver, store.clone(), PipelineConfig::default())
        .execute(run.id)
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), DiptychErrorKind::MalformedOutput(_)));
    let failed = store.get_run(run.id).await?.unwrap();
    assert_eq!(failed.status, RunStatus::Failed);
    assert!(failed.error.unwrap().starts_with("output does not match the generation schema"));
    assert!(store.list_artifacts(run.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rerun_overwrites_artifacts_and_resets_review() -> anyhow::Result<()> {
    let (memory, store) = store();
    let topic = seed_topic(&store, "rerun").await;
    let run = store.insert_run(&Run::queued(topic.id, None, Utc::now())).await?;

    RunExecutor::new(
        MockDriver::new_response(good_response()),
        store.clone(),
        PipelineConfig::default(),
    )
    .execute(run.id)
    .await?;

    let mut reviewed = store.list_artifacts(run.id).await?.remove(0);
    reviewed.reviewed = true;
    reviewed.review_notes = Some("checked".to_string());
    store.update_artifact(&reviewed).await?;

    // Force the run back to failed so the executor picks it up again.
    let mut again = store.get_run(run.id).await?.unwrap();
    again.fail("manual retry", Utc::now());
    store.update_run(&again).await?;

    let second = payload(json!({"claims_to_verify": ["tidal range"]}));
    RunExecutor::new(
        MockDriver::new_response(response_with(&second)),
        store.clone(),
        PipelineConfig::default(),
    )
    .execute(run.id)
    .await?;

    assert_eq!(memory.artifact_count().await, 2);
    let overwritten = store.get_artifact(reviewed.id).await?.unwrap();
    assert!(!overwritten.reviewed);
    assert!(overwritten.review_notes.is_none());
    assert!(store.get_run(run.id).await?.unwrap().has_pending_claims());
    Ok(())
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let (_, store) = store();
    let err = RunExecutor::new(
        MockDriver::new_response(good_response()),
        store,
        PipelineConfig::default(),
    )
    .execute(Uuid::new_v4())
    .await
    .unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
}
