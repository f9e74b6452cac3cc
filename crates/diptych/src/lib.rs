//! Diptych - bilingual content generation pipeline.
//!
//! Diptych turns editorial topics into paired French and English MDX
//! articles. A topic is generated either synchronously (one run, one
//! provider call) or as part of a provider batch job; the resulting
//! artifacts are reviewed by a human and exported once the export gate
//! passes.
//!
//! # Cargo Features
//!
//! - `database` - PostgreSQL content store and task queue
//! - `openai` - OpenAI Responses and Batch API client
//!
//! # Architecture
//!
//! - `diptych_error` - Error types
//! - `diptych_core` - Domain records and state transitions
//! - `diptych_interface` - Driver, provider, store and queue traits
//! - `diptych_pipeline` - Executor, batch submitter and reconciler, export gate
//! - `diptych_database` - PostgreSQL integration
//! - `diptych_models` - OpenAI client
//!
//! This crate re-exports everything for convenience and adds configuration
//! loading and tracing setup for the `diptych` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod settings;
mod observability;

pub use settings::{
    DatabaseSettings, DiptychConfig, ExportSettings, LoggingSettings, OpenAiSettings,
    PipelineSettings, WorkerSettings,
};
pub use observability::{env_filter, init_tracing};

pub use diptych_core::*;
pub use diptych_error::*;
pub use diptych_interface::*;
pub use diptych_pipeline::*;

#[cfg(feature = "database")]
pub use diptych_database::{
    PostgresContentStore, PostgresTaskQueue, establish_connection, run_migrations,
};

#[cfg(feature = "openai")]
pub use diptych_models::OpenAiClient;
