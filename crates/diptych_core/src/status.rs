//! Closed status enumerations for runs, batches and batch items.

use serde::{Deserialize, Serialize};

/// Lifecycle of a generation run.
///
/// `queued -> running -> {succeeded, failed}`. Parsing rejects any other
/// string.
///
/// # Examples
///
/// ```
/// use diptych_core::RunStatus;
/// use std::str::FromStr;
///
/// assert_eq!(RunStatus::from_str("succeeded").unwrap(), RunStatus::Succeeded);
/// assert!(RunStatus::from_str("paused").is_err());
/// assert!(RunStatus::Failed.is_terminal());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    /// Created, waiting for a worker
    Queued,
    /// A worker is generating
    Running,
    /// Both artifacts written
    Succeeded,
    /// Generation or persistence failed
    Failed,
}

impl RunStatus {
    /// Whether the run has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// Whether the executor may (re)start the run.
    ///
    /// Running and succeeded runs are left alone; failed runs are picked up
    /// again by task retries.
    pub fn is_executable(self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::Failed)
    }
}

/// Lifecycle shared by batches and batch items.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatchStatus {
    /// Persisted, not yet accepted by the provider
    Queued,
    /// Provider job accepted and in flight
    Running,
    /// Every item succeeded
    Succeeded,
    /// Submission failed, the job ended abnormally, or some item failed
    Failed,
}

impl BatchStatus {
    /// Whether the batch or item has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Succeeded | BatchStatus::Failed)
    }
}
