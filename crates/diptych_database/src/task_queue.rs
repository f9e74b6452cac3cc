//! PostgreSQL-backed task queue.

use crate::models::TaskRow;
use crate::schema::tasks;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diptych_error::{DiptychResult, StoreError, StoreErrorKind};
use diptych_interface::{ClaimedTask, Task, TaskHandle, TaskQueue, TaskSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Task queue stored in the `tasks` table.
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so several worker processes can
/// poll the same table. Delivery is at least once: a task whose worker
/// dies while holding it stays claimed until its lease runs out and
/// [`PostgresTaskQueue::release_claimed`] puts it back.
#[derive(Clone)]
pub struct PostgresTaskQueue {
    conn: Arc<Mutex<PgConnection>>,
}

impl PostgresTaskQueue {
    /// Create a queue that owns `conn`.
    pub fn new(conn: PgConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create a queue over a shared connection.
    pub fn from_arc(conn: Arc<Mutex<PgConnection>>) -> Self {
        Self { conn }
    }

    /// Return tasks claimed longer than `lease` ago to the pending state.
    ///
    /// Recovers tasks held by a process that exited mid-task. Tasks claimed
    /// within the lease are left to their worker, so this is safe to call
    /// while other processes are running. Returns the number released.
    #[tracing::instrument(skip(self))]
    pub async fn release_claimed(&self, lease: Duration) -> DiptychResult<usize> {
        let lease = TimeDelta::from_std(lease).map_err(|e| {
            StoreError::new(StoreErrorKind::InvalidValue {
                column: "tasks.updated_at".to_string(),
                value: e.to_string(),
            })
        })?;
        let cutoff = Utc::now() - lease;
        let mut conn = self.conn.lock().await;
        let released = diesel::update(
            tasks::table
                .filter(tasks::state.eq(TaskRow::CLAIMED))
                .filter(tasks::updated_at.lt(cutoff)),
        )
        .set((
            tasks::state.eq(TaskRow::PENDING),
            tasks::updated_at.eq(Utc::now()),
        ))
        .execute(&mut *conn)
        .map_err(StoreError::from)?;
        if released > 0 {
            tracing::warn!(released, "Released tasks whose claim outlived the lease");
        }
        Ok(released)
    }

    /// Number of tasks waiting to be claimed, due or not.
    pub async fn pending_count(&self) -> DiptychResult<i64> {
        let mut conn = self.conn.lock().await;
        let count = tasks::table
            .filter(tasks::state.eq(TaskRow::PENDING))
            .count()
            .get_result(&mut *conn)
            .map_err(StoreError::from)?;
        Ok(count)
    }
}

fn settled(updated: usize) -> DiptychResult<()> {
    if updated == 0 {
        return Err(StoreError::new(StoreErrorKind::RowMissing).into());
    }
    Ok(())
}

#[async_trait]
impl TaskQueue for PostgresTaskQueue {
    #[tracing::instrument(skip(self), fields(kind = %task.kind, argument = %task.argument))]
    async fn enqueue(&self, task: Task) -> DiptychResult<TaskHandle> {
        let row = TaskRow::pending(&task, Utc::now());
        let mut conn = self.conn.lock().await;
        diesel::insert_into(tasks::table)
            .values(&row)
            .execute(&mut *conn)
            .map_err(StoreError::from)?;
        tracing::debug!(task_id = %row.id, "Task enqueued");
        Ok(TaskHandle(row.id.to_string()))
    }
}

#[async_trait]
impl TaskSource for PostgresTaskQueue {
    async fn claim(&self) -> DiptychResult<Option<ClaimedTask>> {
        let mut conn = self.conn.lock().await;
        let claimed = conn.transaction::<_, StoreError, _>(|conn| {
            let now = Utc::now();
            let Some(next) = tasks::table
                .filter(tasks::state.eq(TaskRow::PENDING))
                .filter(tasks::not_before.le(now))
                .order((tasks::not_before.asc(), tasks::created_at.asc()))
                .select(TaskRow::as_select())
                .for_update()
                .skip_locked()
                .first(conn)
                .optional()?
            else {
                return Ok(None);
            };

            let row = diesel::update(tasks::table.find(next.id))
                .set((
                    tasks::state.eq(TaskRow::CLAIMED),
                    tasks::attempts.eq(tasks::attempts + 1),
                    tasks::updated_at.eq(now),
                ))
                .returning(TaskRow::as_returning())
                .get_result(conn)?;
            Ok(Some(row))
        })?;
        Ok(claimed.map(ClaimedTask::try_from).transpose()?)
    }

    async fn complete(&self, id: Uuid) -> DiptychResult<()> {
        let mut conn = self.conn.lock().await;
        let updated = diesel::update(
            tasks::table
                .find(id)
                .filter(tasks::state.eq(TaskRow::CLAIMED)),
        )
        .set((
            tasks::state.eq(TaskRow::DONE),
            tasks::updated_at.eq(Utc::now()),
        ))
        .execute(&mut *conn)
        .map_err(StoreError::from)?;
        settled(updated)
    }

    #[tracing::instrument(skip(self, error))]
    async fn retry(&self, id: Uuid, error: &str, delay: Duration) -> DiptychResult<()> {
        let delay = TimeDelta::from_std(delay).map_err(|e| {
            StoreError::new(StoreErrorKind::InvalidValue {
                column: "tasks.not_before".to_string(),
                value: e.to_string(),
            })
        })?;
        let now = Utc::now();
        let mut conn = self.conn.lock().await;
        let updated = diesel::update(
            tasks::table
                .find(id)
                .filter(tasks::state.eq(TaskRow::CLAIMED)),
        )
        .set((
            tasks::state.eq(TaskRow::PENDING),
            tasks::not_before.eq(now + delay),
            tasks::last_error.eq(error),
            tasks::updated_at.eq(now),
        ))
        .execute(&mut *conn)
        .map_err(StoreError::from)?;
        settled(updated)
    }

    #[tracing::instrument(skip(self, error))]
    async fn bury(&self, id: Uuid, error: &str) -> DiptychResult<()> {
        let mut conn = self.conn.lock().await;
        let updated = diesel::update(
            tasks::table
                .find(id)
                .filter(tasks::state.eq(TaskRow::CLAIMED)),
        )
        .set((
            tasks::state.eq(TaskRow::BURIED),
            tasks::last_error.eq(error),
            tasks::updated_at.eq(Utc::now()),
        ))
        .execute(&mut *conn)
        .map_err(StoreError::from)?;
        settled(updated)
    }
}
