//! Trait definitions for the Diptych content pipeline.
//!
//! The pipeline talks to four collaborators through these traits: a
//! synchronous generation driver, a file-based batch provider, a content
//! store, and a task queue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod provider;
mod queue;
mod store;

pub use driver::GenerationDriver;
pub use provider::{BatchProvider, JobPhase, RemoteJob, RemoteJobStatus};
pub use queue::{ClaimedTask, Task, TaskHandle, TaskKind, TaskQueue, TaskSource};
pub use store::{ContentStore, TopicFilter};
