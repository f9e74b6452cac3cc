//! File-based batch jobs.

use async_trait::async_trait;
use diptych_error::DiptychResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Status reported by the provider for a batch job.
///
/// Unknown strings are kept verbatim so the batch can be failed with the
/// status the provider actually sent.
///
/// # Examples
///
/// ```
/// use diptych_interface::{JobPhase, RemoteJobStatus};
///
/// assert_eq!(RemoteJobStatus::from("finalizing").phase(), JobPhase::InProgress);
/// assert_eq!(RemoteJobStatus::from("completed").phase(), JobPhase::Completed);
/// let odd = RemoteJobStatus::from("exploded");
/// assert_eq!(odd.phase(), JobPhase::Ended);
/// assert_eq!(odd.to_string(), "exploded");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteJobStatus {
    /// Input file being validated
    Validating,
    /// Lines being processed
    InProgress,
    /// Output file being written
    Finalizing,
    /// Finished; output may be available
    Completed,
    /// Validation or processing failed
    Failed,
    /// Completion window elapsed
    Expired,
    /// Cancellation requested
    Cancelling,
    /// Cancelled
    Cancelled,
    /// Any status this crate does not know
    Other(String),
}

/// How reconciliation treats a remote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    /// Still working; leave local state alone
    InProgress,
    /// Finished normally
    Completed,
    /// Finished any other way
    Ended,
}

impl RemoteJobStatus {
    /// The provider's spelling of this status.
    pub fn as_str(&self) -> &str {
        match self {
            RemoteJobStatus::Validating => "validating",
            RemoteJobStatus::InProgress => "in_progress",
            RemoteJobStatus::Finalizing => "finalizing",
            RemoteJobStatus::Completed => "completed",
            RemoteJobStatus::Failed => "failed",
            RemoteJobStatus::Expired => "expired",
            RemoteJobStatus::Cancelling => "cancelling",
            RemoteJobStatus::Cancelled => "cancelled",
            RemoteJobStatus::Other(value) => value,
        }
    }

    /// Reconciliation phase for this status.
    pub fn phase(&self) -> JobPhase {
        match self {
            RemoteJobStatus::Validating
            | RemoteJobStatus::InProgress
            | RemoteJobStatus::Finalizing => JobPhase::InProgress,
            RemoteJobStatus::Completed => JobPhase::Completed,
            _ => JobPhase::Ended,
        }
    }
}

impl std::fmt::Display for RemoteJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RemoteJobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "validating" => RemoteJobStatus::Validating,
            "in_progress" => RemoteJobStatus::InProgress,
            "finalizing" => RemoteJobStatus::Finalizing,
            "completed" => RemoteJobStatus::Completed,
            "failed" => RemoteJobStatus::Failed,
            "expired" => RemoteJobStatus::Expired,
            "cancelling" => RemoteJobStatus::Cancelling,
            "cancelled" => RemoteJobStatus::Cancelled,
            _ => RemoteJobStatus::Other(value),
        }
    }
}

impl From<&str> for RemoteJobStatus {
    fn from(value: &str) -> Self {
        RemoteJobStatus::from(value.to_string())
    }
}

impl From<RemoteJobStatus> for String {
    fn from(value: RemoteJobStatus) -> Self {
        value.to_string()
    }
}

/// A provider batch job as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJob {
    /// Provider job handle
    pub id: String,
    /// Reported status
    pub status: RemoteJobStatus,
    /// File holding one result line per request, once completed
    pub output_file_id: Option<String>,
    /// File holding lines the provider rejected, if any
    pub error_file_id: Option<String>,
}

/// A provider that runs many requests as one asynchronous job.
#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// Upload a JSONL request file and return its file id.
    async fn upload_batch_file(&self, file_name: &str, contents: String) -> DiptychResult<String>;

    /// Create a batch job over an uploaded file.
    async fn create_job(&self, input_file_id: &str) -> DiptychResult<RemoteJob>;

    /// Fetch the current state of a job.
    async fn get_job(&self, job_id: &str) -> DiptychResult<RemoteJob>;

    /// Download a file's text content.
    async fn download_file(&self, file_id: &str) -> DiptychResult<String>;
}

#[async_trait]
impl<T: BatchProvider + ?Sized> BatchProvider for Arc<T> {
    async fn upload_batch_file(&self, file_name: &str, contents: String) -> DiptychResult<String> {
        (**self).upload_batch_file(file_name, contents).await
    }

    async fn create_job(&self, input_file_id: &str) -> DiptychResult<RemoteJob> {
        (**self).create_job(input_file_id).await
    }

    async fn get_job(&self, job_id: &str) -> DiptychResult<RemoteJob> {
        (**self).get_job(job_id).await
    }

    async fn download_file(&self, file_id: &str) -> DiptychResult<String> {
        (**self).download_file(file_id).await
    }
}
