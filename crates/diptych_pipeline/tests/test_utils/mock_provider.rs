//! Mock batch provider for testing.

use async_trait::async_trait;
use diptych_error::{DiptychError, DiptychResult, ProviderError, ProviderErrorKind};
use diptych_interface::{BatchProvider, RemoteJob, RemoteJobStatus};
use std::sync::{Arc, Mutex};

const INPUT_FILE_ID: &str = "file-input";
const OUTPUT_FILE_ID: &str = "file-output";
const ERROR_FILE_ID: &str = "file-errors";
const JOB_ID: &str = "batch_mock";

#[derive(Debug, Default)]
struct State {
    upload_error: Option<ProviderErrorKind>,
    create_job_error: Option<ProviderErrorKind>,
    job_status: Option<RemoteJobStatus>,
    output: Option<String>,
    errors: Option<String>,
    uploads: Vec<(String, String)>,
    polls: usize,
    downloads: usize,
}

/// Mock batch provider with a single job whose status the test controls.
#[derive(Clone, Default)]
pub struct MockBatchProvider {
    state: Arc<Mutex<State>>,
}

impl MockBatchProvider {
    /// Provider whose job starts `validating`.
    pub fn new() -> Self {
        let provider = Self::default();
        provider.set_status(RemoteJobStatus::Validating);
        provider
    }

    /// Provider that rejects every upload.
    pub fn new_upload_error(error: ProviderErrorKind) -> Self {
        let provider = Self::new();
        provider.state.lock().unwrap().upload_error = Some(error);
        provider
    }

    /// Provider that accepts uploads but refuses to create the job.
    pub fn new_create_job_error(error: ProviderErrorKind) -> Self {
        let provider = Self::new();
        provider.state.lock().unwrap().create_job_error = Some(error);
        provider
    }

    /// Change the job status reported by `get_job`.
    pub fn set_status(&self, status: RemoteJobStatus) {
        self.state.lock().unwrap().job_status = Some(status);
    }

    /// Complete the job with the given output file contents.
    pub fn complete_with(&self, output: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.job_status = Some(RemoteJobStatus::Completed);
        state.output = Some(output.into());
    }

    /// Complete the job with an error file, and an output file when
    /// `output` is given.
    pub fn complete_with_errors(&self, output: Option<String>, errors: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.job_status = Some(RemoteJobStatus::Completed);
        state.output = output;
        state.errors = Some(errors.into());
    }

    /// Attempted uploads as `(file_name, contents)`, including rejected ones.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Number of get_job calls.
    pub fn poll_count(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    /// Number of download_file calls.
    #[allow(dead_code)]
    pub fn download_count(&self) -> usize {
        self.state.lock().unwrap().downloads
    }

    fn job(state: &State) -> RemoteJob {
        let status = state
            .job_status
            .clone()
            .unwrap_or(RemoteJobStatus::Validating);
        let output_file_id = match (&status, &state.output) {
            (RemoteJobStatus::Completed, Some(_)) => Some(OUTPUT_FILE_ID.to_string()),
            _ => None,
        };
        let error_file_id = match (&status, &state.errors) {
            (RemoteJobStatus::Completed, Some(_)) => Some(ERROR_FILE_ID.to_string()),
            _ => None,
        };
        RemoteJob {
            id: JOB_ID.to_string(),
            status,
            output_file_id,
            error_file_id,
        }
    }
}

#[async_trait]
impl BatchProvider for MockBatchProvider {
    async fn upload_batch_file(&self, file_name: &str, contents: String) -> DiptychResult<String> {
        let mut state = self.state.lock().unwrap();
        state.uploads.push((file_name.to_string(), contents));
        match &state.upload_error {
            Some(error) => Err(DiptychError::from(ProviderError::new(error.clone()))),
            None => Ok(INPUT_FILE_ID.to_string()),
        }
    }

    async fn create_job(&self, input_file_id: &str) -> DiptychResult<RemoteJob> {
        assert_eq!(input_file_id, INPUT_FILE_ID);
        let state = self.state.lock().unwrap();
        match &state.create_job_error {
            Some(error) => Err(DiptychError::from(ProviderError::new(error.clone()))),
            None => Ok(Self::job(&state)),
        }
    }

    async fn get_job(&self, job_id: &str) -> DiptychResult<RemoteJob> {
        assert_eq!(job_id, JOB_ID);
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        Ok(Self::job(&state))
    }

    async fn download_file(&self, file_id: &str) -> DiptychResult<String> {
        let mut state = self.state.lock().unwrap();
        state.downloads += 1;
        let contents = match file_id {
            OUTPUT_FILE_ID => state.output.clone(),
            ERROR_FILE_ID => state.errors.clone(),
            _ => None,
        };
        match contents {
            Some(contents) => Ok(contents),
            None => Err(DiptychError::from(ProviderError::new(ProviderErrorKind::Http {
                status_code: 404,
                message: format!("No such file: {}", file_id),
            }))),
        }
    }
}
