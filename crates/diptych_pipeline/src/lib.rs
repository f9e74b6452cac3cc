//! Generation pipeline for Diptych.
//!
//! This crate drives runs and batches through their state machines:
//!
//! - [`RunExecutor`] takes one run from `queued` to a terminal state with a
//!   synchronous provider call.
//! - [`BatchSubmitter`] persists a batch of runs and hands one request file
//!   to the provider.
//! - [`BatchReconciler`] maps a finished provider job back onto items, runs
//!   and artifacts.
//! - [`evaluate_gate`] and [`Exporter`] decide whether a run can be
//!   published and write its MDX files.
//!
//! [`ContentService`] is the produced surface over all of it, and
//! [`TaskWorker`] consumes the background queue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod executor;
mod export;
mod extraction;
mod gate;
mod in_memory_queue;
mod in_memory_store;
mod prompt;
mod reconciler;
mod service;
mod submitter;
mod worker;

pub use config::{
    DEFAULT_ERROR_BODY_LIMIT, DEFAULT_MODEL, PipelineConfig, PipelineConfigBuilder,
    PipelineConfigBuilderError,
};
pub use executor::{RunExecutor, RunOutcome};
pub use export::{ExportReceipt, ExportedFile, Exporter, render_mdx};
pub use extraction::{
    ContentBlocks, ExtractionStrategy, FencedJson, OutputText, ParsedField, ResultParser,
};
pub use gate::{GateReport, evaluate_gate};
pub use in_memory_queue::InMemoryTaskQueue;
pub use in_memory_store::InMemoryContentStore;
pub use prompt::{SCHEMA_NAME, SYSTEM_PROMPT, build_prompt, prompt_payload, request_line, response_schema};
pub use reconciler::{BatchReconciler, MISSING_OUTPUT_ROW, Reconciliation};
pub use service::{ContentService, Queued};
pub use submitter::BatchSubmitter;
pub use worker::{Disposition, RetryPolicy, RetryPolicyBuilder, RetryPolicyBuilderError, TaskReport, TaskWorker};
