//! Wire types for the OpenAI files and batches endpoints.

use diptych_interface::{RemoteJob, RemoteJobStatus};
use serde::{Deserialize, Serialize};

/// Endpoint every batch line targets.
pub const BATCH_ENDPOINT: &str = "/v1/responses";

/// Completion window requested for batch jobs.
pub const COMPLETION_WINDOW: &str = "24h";

/// Uploaded file as returned by `POST /files`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
}

/// Body of `POST /batches`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateBatchRequest<'a> {
    pub input_file_id: &'a str,
    pub endpoint: &'a str,
    pub completion_window: &'a str,
}

impl<'a> CreateBatchRequest<'a> {
    pub fn new(input_file_id: &'a str) -> Self {
        Self {
            input_file_id,
            endpoint: BATCH_ENDPOINT,
            completion_window: COMPLETION_WINDOW,
        }
    }
}

/// Batch job as returned by `POST /batches` and `GET /batches/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchObject {
    pub id: String,
    pub status: RemoteJobStatus,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
}

impl From<BatchObject> for RemoteJob {
    fn from(batch: BatchObject) -> Self {
        Self {
            id: batch.id,
            status: batch.status,
            output_file_id: batch.output_file_id,
            error_file_id: batch.error_file_id,
        }
    }
}

/// Error envelope used by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Human-readable message for a non-success response body.
///
/// Prefers the provider's `error.message`, then the raw body, then the
/// canonical reason phrase.
pub fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}
