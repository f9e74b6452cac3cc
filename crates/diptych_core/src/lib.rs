//! Core domain types for the Diptych content pipeline.
//!
//! Topics feed generation runs; each run produces one artifact per
//! language; batches group many runs into a single provider job. The
//! records here carry their own state transitions so that every caller
//! moves them the same way.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod batch;
mod lang;
mod payload;
mod prompt;
mod run;
mod status;
mod topic;

pub use artifact::{Artifact, ArtifactContent, ArtifactPatch, ArtifactWrite};
pub use batch::{Batch, BatchEntry, BatchItem, BatchSnapshot, correlation_id};
pub use lang::Lang;
pub use payload::{ArtifactPair, GenerationPayload};
pub use prompt::{Prompt, ResponseSchema};
pub use run::{CLAIMS_TO_VERIFY, Run};
pub use status::{BatchStatus, RunStatus};
pub use topic::{NewTopic, NewTopicBuilder, NewTopicBuilderError, Topic, TopicPatch};

/// Open JSON object used for topic blocks, frontmatter and run metadata.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
