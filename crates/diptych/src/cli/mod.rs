//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the diptych binary.

mod commands;
mod context;
mod handlers;
mod worker;

pub use commands::{ArtifactCommands, BatchCommands, Cli, Commands, RunCommands, TopicCommands};
pub use context::AppContext;
pub use handlers::{
    handle_artifact_command, handle_batch_command, handle_export, handle_migrate,
    handle_run_command, handle_topic_command,
};
pub use worker::run_workers;
