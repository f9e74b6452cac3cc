//! Background worker pool.

use super::AppContext;
use diptych::{DiptychResult, TaskSource, TaskWorker};
use std::sync::Arc;
use tokio::sync::watch;

/// Run `concurrency` workers until Ctrl-C, or once over the due tasks
/// when `drain` is set.
///
/// Claims older than the configured lease are presumed to belong to a
/// crashed worker and are returned to the queue first.
pub async fn run_workers(
    ctx: &AppContext,
    concurrency: Option<usize>,
    drain: bool,
) -> DiptychResult<()> {
    let released = ctx.queue.release_claimed(ctx.config.claim_lease()).await?;
    if released > 0 {
        tracing::info!(released, "Returned abandoned tasks to the queue");
    }

    let source: Arc<dyn TaskSource> = ctx.queue.clone();
    let make_worker = || -> DiptychResult<_> {
        Ok(TaskWorker::new(
            source.clone(),
            ctx.executor()?,
            ctx.reconciler()?,
            ctx.config.retry_policy(),
        )
        .with_idle_interval(ctx.config.idle_interval()))
    };

    if drain {
        let reports = make_worker()?.drain().await?;
        for report in &reports {
            tracing::info!(
                task_id = %report.id,
                kind = %report.task.kind,
                attempts = report.attempts,
                disposition = ?report.disposition,
                "Task processed"
            );
        }
        tracing::info!(processed = reports.len(), "Queue drained");
        return Ok(());
    }

    let concurrency = concurrency.unwrap_or(ctx.config.worker.concurrency).max(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::with_capacity(concurrency);
    for index in 0..concurrency {
        let worker = make_worker()?;
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            tracing::debug!(worker = index, "Spawning worker");
            worker.run_until(shutdown).await;
        }));
    }
    tracing::info!(concurrency, "Workers running; press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C; stopping workers");
    }
    tracing::info!("Shutting down workers");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }
    Ok(())
}
