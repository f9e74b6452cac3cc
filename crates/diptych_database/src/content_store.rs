//! PostgreSQL implementation of ContentStore.

use crate::models::{ArtifactRow, BatchItemRow, BatchRow, RunRow, TopicRow};
use crate::schema::{artifacts, batch_items, batches, runs, topics};
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diptych_core::{
    Artifact, ArtifactWrite, Batch, BatchEntry, BatchItem, BatchSnapshot, Run, Topic,
};
use diptych_error::{
    DiptychError, DiptychResult, StoreError, StoreErrorKind, ValidationError, ValidationErrorKind,
};
use diptych_interface::{ContentStore, TopicFilter};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const TOPIC_SLUG_KEY: &str = "topics_slug_key";

/// PostgreSQL content store.
///
/// Holds one connection behind an async mutex; every multi-record write
/// runs in a single transaction on that connection.
///
/// # Example
/// ```no_run
/// use diptych_database::{PostgresContentStore, establish_connection, run_migrations};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = establish_connection("postgres://localhost/diptych")?;
/// run_migrations(&mut conn)?;
/// let store = PostgresContentStore::new(conn);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresContentStore {
    conn: Arc<Mutex<PgConnection>>,
}

impl PostgresContentStore {
    /// Create a store that owns `conn`.
    pub fn new(conn: PgConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create a store over a shared connection.
    pub fn from_arc(conn: Arc<Mutex<PgConnection>>) -> Self {
        Self { conn }
    }
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn topic_write_error(err: DieselError, slug: &str) -> DiptychError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if info.constraint_name() == Some(TOPIC_SLUG_KEY) =>
        {
            ValidationError::new(ValidationErrorKind::SlugTaken(slug.to_string())).into()
        }
        other => StoreError::from(other).into(),
    }
}

fn upsert_artifact(conn: &mut PgConnection, write: &ArtifactWrite) -> Result<ArtifactRow, StoreError> {
    let now = Utc::now();
    let row = ArtifactRow::from(&Artifact::create(write, now));
    diesel::insert_into(artifacts::table)
        .values(&row)
        .on_conflict((artifacts::run_id, artifacts::lang))
        .do_update()
        .set((
            artifacts::frontmatter.eq(&row.frontmatter),
            artifacts::body.eq(&row.body),
            artifacts::reviewed.eq(false),
            artifacts::review_notes.eq(None::<String>),
            artifacts::updated_at.eq(now),
        ))
        .returning(ArtifactRow::as_returning())
        .get_result(conn)
        .map_err(StoreError::from)
}

fn update_run_row(conn: &mut PgConnection, run: &Run) -> Result<RunRow, StoreError> {
    diesel::update(runs::table.find(run.id))
        .set(&RunRow::from(run))
        .returning(RunRow::as_returning())
        .get_result(conn)
        .map_err(StoreError::from)
}

fn write_entries(conn: &mut PgConnection, entries: &[BatchEntry]) -> Result<(), StoreError> {
    for entry in entries {
        update_run_row(conn, &entry.run)?;
        let item = &entry.item;
        let updated = diesel::update(batch_items::table.find(item.id))
            .set((
                batch_items::status.eq(item.status.to_string()),
                batch_items::response_code.eq(item.response_code),
                batch_items::error.eq(&item.error),
                batch_items::updated_at.eq(item.updated_at),
            ))
            .execute(conn)?;
        if updated == 0 {
            return Err(StoreError::new(StoreErrorKind::RowMissing));
        }
    }
    Ok(())
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ContentStore for PostgresContentStore {
    #[tracing::instrument(skip_all, fields(slug = %topic.slug))]
    async fn insert_topic(&self, topic: &Topic) -> DiptychResult<Topic> {
        let mut conn = self.conn.lock().await;
        let row = diesel::insert_into(topics::table)
            .values(&TopicRow::from(topic))
            .returning(TopicRow::as_returning())
            .get_result(&mut *conn)
            .map_err(|e| topic_write_error(e, &topic.slug))?;
        Ok(Topic::try_from(row)?)
    }

    async fn get_topic(&self, id: Uuid) -> DiptychResult<Option<Topic>> {
        let mut conn = self.conn.lock().await;
        let row = topics::table
            .find(id)
            .select(TopicRow::as_select())
            .first(&mut *conn)
            .optional()
            .map_err(StoreError::from)?;
        Ok(row.map(Topic::try_from).transpose()?)
    }

    async fn get_topics(&self, ids: &[Uuid]) -> DiptychResult<Vec<Topic>> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<TopicRow> = topics::table
            .filter(topics::id.eq_any(ids))
            .select(TopicRow::as_select())
            .load(&mut *conn)
            .map_err(StoreError::from)?;
        Ok(collect(rows)?)
    }

    async fn list_topics(&self, filter: &TopicFilter) -> DiptychResult<Vec<Topic>> {
        let mut conn = self.conn.lock().await;
        let mut query = topics::table.select(TopicRow::as_select()).into_boxed();
        if let Some(slug) = &filter.slug {
            query = query.filter(topics::slug.eq(slug.clone()));
        }
        query = query.order((topics::created_at.desc(), topics::slug.asc()));
        if let Some(offset) = filter.offset {
            query = query.offset(to_i64(offset));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(to_i64(limit));
        }
        let rows: Vec<TopicRow> = query.load(&mut *conn).map_err(StoreError::from)?;
        Ok(collect(rows)?)
    }

    #[tracing::instrument(skip_all, fields(topic_id = %topic.id))]
    async fn update_topic(&self, topic: &Topic) -> DiptychResult<Topic> {
        let mut conn = self.conn.lock().await;
        let row = diesel::update(topics::table.find(topic.id))
            .set(&TopicRow::from(topic))
            .returning(TopicRow::as_returning())
            .get_result(&mut *conn)
            .map_err(|e| topic_write_error(e, &topic.slug))?;
        Ok(Topic::try_from(row)?)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_topic(&self, id: Uuid) -> DiptychResult<()> {
        let mut conn = self.conn.lock().await;
        let deleted = diesel::delete(topics::table.find(id))
            .execute(&mut *conn)
            .map_err(StoreError::from)?;
        if deleted == 0 {
            return Err(StoreError::new(StoreErrorKind::RowMissing).into());
        }
        Ok(())
    }

    async fn insert_run(&self, run: &Run) -> DiptychResult<Run> {
        let mut conn = self.conn.lock().await;
        let row = diesel::insert_into(runs::table)
            .values(&RunRow::from(run))
            .returning(RunRow::as_returning())
            .get_result(&mut *conn)
            .map_err(StoreError::from)?;
        Ok(Run::try_from(row)?)
    }

    async fn get_run(&self, id: Uuid) -> DiptychResult<Option<Run>> {
        let mut conn = self.conn.lock().await;
        let row = runs::table
            .find(id)
            .select(RunRow::as_select())
            .first(&mut *conn)
            .optional()
            .map_err(StoreError::from)?;
        Ok(row.map(Run::try_from).transpose()?)
    }

    #[tracing::instrument(skip_all, fields(run_id = %run.id, status = %run.status))]
    async fn update_run(&self, run: &Run) -> DiptychResult<Run> {
        let mut conn = self.conn.lock().await;
        let row = update_run_row(&mut conn, run)?;
        Ok(Run::try_from(row)?)
    }

    #[tracing::instrument(skip_all, fields(run_id = %run.id, artifacts = artifacts.len()))]
    async fn commit_run(&self, run: &Run, artifacts: &[ArtifactWrite]) -> DiptychResult<Run> {
        let mut conn = self.conn.lock().await;
        let row = conn.transaction::<_, StoreError, _>(|conn| {
            for write in artifacts {
                upsert_artifact(conn, write)?;
            }
            update_run_row(conn, run)
        })?;
        Ok(Run::try_from(row)?)
    }

    async fn upsert_artifact(&self, write: &ArtifactWrite) -> DiptychResult<Artifact> {
        let mut conn = self.conn.lock().await;
        let row = upsert_artifact(&mut conn, write)?;
        Ok(Artifact::try_from(row)?)
    }

    async fn get_artifact(&self, id: Uuid) -> DiptychResult<Option<Artifact>> {
        let mut conn = self.conn.lock().await;
        let row = artifacts::table
            .find(id)
            .select(ArtifactRow::as_select())
            .first(&mut *conn)
            .optional()
            .map_err(StoreError::from)?;
        Ok(row.map(Artifact::try_from).transpose()?)
    }

    async fn list_artifacts(&self, run_id: Uuid) -> DiptychResult<Vec<Artifact>> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<ArtifactRow> = artifacts::table
            .filter(artifacts::run_id.eq(run_id))
            .order(artifacts::lang.asc())
            .select(ArtifactRow::as_select())
            .load(&mut *conn)
            .map_err(StoreError::from)?;
        Ok(collect(rows)?)
    }

    #[tracing::instrument(skip_all, fields(artifact_id = %artifact.id))]
    async fn update_artifact(&self, artifact: &Artifact) -> DiptychResult<Artifact> {
        let mut conn = self.conn.lock().await;
        let row = diesel::update(artifacts::table.find(artifact.id))
            .set(&ArtifactRow::from(artifact))
            .returning(ArtifactRow::as_returning())
            .get_result(&mut *conn)
            .map_err(StoreError::from)?;
        Ok(Artifact::try_from(row)?)
    }

    #[tracing::instrument(skip_all, fields(batch_id = %snapshot.batch.id, items = snapshot.entries.len()))]
    async fn insert_batch(&self, snapshot: &BatchSnapshot) -> DiptychResult<()> {
        let batch = BatchRow::from(&snapshot.batch);
        let run_rows: Vec<RunRow> = snapshot.entries.iter().map(|e| RunRow::from(&e.run)).collect();
        let item_rows = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(position, e)| BatchItemRow::new(&e.item, position))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn.lock().await;
        conn.transaction::<_, StoreError, _>(|conn| {
            diesel::insert_into(batches::table)
                .values(&batch)
                .execute(conn)?;
            if !run_rows.is_empty() {
                diesel::insert_into(runs::table).values(run_rows).execute(conn)?;
                diesel::insert_into(batch_items::table)
                    .values(item_rows)
                    .execute(conn)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn get_batch(&self, id: Uuid) -> DiptychResult<Option<BatchSnapshot>> {
        let mut conn = self.conn.lock().await;
        let Some(row) = batches::table
            .find(id)
            .select(BatchRow::as_select())
            .first(&mut *conn)
            .optional()
            .map_err(StoreError::from)?
        else {
            return Ok(None);
        };

        let pairs: Vec<(BatchItemRow, RunRow)> = batch_items::table
            .inner_join(runs::table)
            .filter(batch_items::batch_id.eq(id))
            .order(batch_items::position.asc())
            .select((BatchItemRow::as_select(), RunRow::as_select()))
            .load(&mut *conn)
            .map_err(StoreError::from)?;

        let entries = pairs
            .into_iter()
            .map(|(item, run)| {
                Ok(BatchEntry {
                    item: BatchItem::try_from(item)?,
                    run: Run::try_from(run)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(BatchSnapshot {
            batch: Batch::try_from(row)?,
            entries,
        }))
    }

    async fn batch_item_for_run(&self, run_id: Uuid) -> DiptychResult<Option<BatchItem>> {
        let mut conn = self.conn.lock().await;
        let row = batch_items::table
            .filter(batch_items::run_id.eq(run_id))
            .select(BatchItemRow::as_select())
            .first(&mut *conn)
            .optional()
            .map_err(StoreError::from)?;
        Ok(row.map(BatchItem::try_from).transpose()?)
    }

    #[tracing::instrument(
        skip_all,
        fields(batch_id = %snapshot.batch.id, status = %snapshot.batch.status, artifacts = artifacts.len())
    )]
    async fn commit_batch(
        &self,
        snapshot: &BatchSnapshot,
        artifacts: &[ArtifactWrite],
    ) -> DiptychResult<()> {
        let batch = BatchRow::from(&snapshot.batch);
        let mut conn = self.conn.lock().await;
        conn.transaction::<_, StoreError, _>(|conn| {
            let updated = diesel::update(batches::table.find(batch.id))
                .set(&batch)
                .execute(conn)?;
            if updated == 0 {
                return Err(StoreError::new(StoreErrorKind::RowMissing));
            }
            write_entries(conn, &snapshot.entries)?;
            for write in artifacts {
                upsert_artifact(conn, write)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}
