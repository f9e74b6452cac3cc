//! Database connection and migration utilities.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use diptych_error::{StoreError, StoreErrorKind};

/// Migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Establish a connection to the PostgreSQL database at `database_url`.
///
/// # Errors
///
/// Returns a `Connection` error if the URL is empty or the connection fails.
pub fn establish_connection(database_url: &str) -> Result<PgConnection, StoreError> {
    if database_url.trim().is_empty() {
        return Err(StoreError::new(StoreErrorKind::Connection(
            "database.url (DATABASE_URL) is not configured".to_string(),
        )));
    }
    PgConnection::establish(database_url).map_err(StoreError::from)
}

/// Apply every pending migration. Returns the versions applied.
///
/// # Errors
///
/// Returns a `Migration` error if any migration fails.
#[tracing::instrument(skip(conn))]
pub fn run_migrations(conn: &mut PgConnection) -> Result<Vec<String>, StoreError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::new(StoreErrorKind::Migration(e.to_string())))?
        .into_iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>();
    tracing::info!(count = applied.len(), "Migrations applied");
    Ok(applied)
}
