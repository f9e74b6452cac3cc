//! PostgreSQL integration for Diptych.
//!
//! This crate provides the Diesel schema, row types, and the PostgreSQL
//! implementations of the content store and the task queue.
//!
//! # Example
//!
//! ```rust,no_run
//! use diptych_database::{PostgresContentStore, PostgresTaskQueue, establish_connection, run_migrations};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = "postgres://localhost/diptych";
//! let mut conn = establish_connection(url)?;
//! run_migrations(&mut conn)?;
//! let store = PostgresContentStore::new(conn);
//! let queue = PostgresTaskQueue::new(establish_connection(url)?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod content_store;
mod models;
mod task_queue;

/// Diesel table definitions.
#[allow(missing_docs)]
pub mod schema;

pub use connection::{MIGRATIONS, establish_connection, run_migrations};
pub use content_store::PostgresContentStore;
pub use models::{ArtifactRow, BatchItemRow, BatchRow, RunRow, TaskRow, TopicRow};
pub use task_queue::PostgresTaskQueue;
