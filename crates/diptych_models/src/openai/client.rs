//! OpenAI HTTP client.

use super::dto::{BatchObject, CreateBatchRequest, FileObject, error_message};
use async_trait::async_trait;
use diptych_core::Prompt;
use diptych_error::{
    ConfigError, DiptychResult, ProviderError, ProviderErrorKind, RetryableError,
};
use diptych_interface::{BatchProvider, GenerationDriver, RemoteJob};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, instrument, warn};

/// Base URL of the hosted OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI Responses, Files and Batches APIs.
///
/// Any server that speaks the same wire format can be targeted with
/// [`OpenAiClient::with_base_url`].
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    /// Override the retry count chosen from the error kind
    max_retries: Option<usize>,
    /// Override the initial backoff chosen from the error kind
    retry_backoff_ms: Option<u64>,
    no_retry: bool,
}

impl OpenAiClient {
    /// Create a client for the hosted API.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> DiptychResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::new("openai.api_key (OPENAI_API_KEY) is not configured").into());
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: None,
            retry_backoff_ms: None,
            no_retry: false,
        })
    }

    /// Create a client from `OPENAI_API_KEY` and, if set, `OPENAI_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `OPENAI_API_KEY` is unset or blank.
    pub fn from_env() -> DiptychResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let client = Self::new(api_key)?;
        Ok(match std::env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
            _ => client,
        })
    }

    /// Point the client at another server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Cap the number of retries for transient failures.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Fix the initial retry backoff instead of choosing it per error.
    pub fn with_retry_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.retry_backoff_ms = Some(backoff_ms);
        self
    }

    /// Fail on the first error of any kind.
    pub fn without_retry(mut self) -> Self {
        self.no_retry = true;
        self
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request and turn a non-success status into an error.
    async fn attempt(request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::Request(e.to_string())))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::new(ProviderErrorKind::Http {
            status_code: status.as_u16(),
            message: error_message(&body, status),
        }))
    }

    /// Send a request, retrying transient failures.
    ///
    /// `build` is called once per attempt because multipart bodies cannot
    /// be cloned. The strategy comes from the first error's kind unless the
    /// client overrides it.
    async fn send<F>(&self, operation: &'static str, build: F) -> Result<Response, ProviderError>
    where
        F: Fn() -> Result<RequestBuilder, ProviderError>,
    {
        let first = Self::attempt(build()?).await;
        let error = match first {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if self.no_retry || !error.is_retryable() {
            warn!(operation, error = %error.kind, "Permanent provider error, failing immediately");
            return Err(error);
        }

        let (mut initial_ms, mut retries, max_delay_secs) = error.retry_strategy_params();
        if let Some(backoff) = self.retry_backoff_ms {
            initial_ms = backoff;
        }
        if let Some(max_retries) = self.max_retries {
            retries = max_retries;
        }
        info!(
            operation,
            error = %error.kind,
            initial_backoff_ms = initial_ms,
            max_retries = retries,
            max_delay_secs,
            "Provider request failed, will retry with configured strategy"
        );
        if retries == 0 {
            return Err(error);
        }

        let strategy = ExponentialBackoff::from_millis(initial_ms)
            .factor(2)
            .max_delay(std::time::Duration::from_secs(max_delay_secs))
            .map(jitter)
            .take(retries);

        Retry::spawn(strategy, || {
            let request = build();
            async move {
                let request = match request {
                    Ok(request) => request,
                    Err(e) => return Err(RetryError::Permanent(e)),
                };
                match Self::attempt(request).await {
                    Ok(response) => Ok(response),
                    Err(e) if e.is_retryable() => {
                        warn!(operation, error = %e.kind, "Provider request failed, will retry");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Err(e) => {
                        warn!(operation, error = %e.kind, "Permanent provider error, failing immediately");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::Decode(e.to_string())))
    }

    fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl GenerationDriver for OpenAiClient {
    #[instrument(skip(self, prompt), fields(provider = "openai"))]
    async fn generate(&self, model: &str, prompt: &Prompt) -> DiptychResult<serde_json::Value> {
        let body = prompt.request_body(model);
        let response = self
            .send("responses.create", || Ok(self.post_json("/responses", &body)))
            .await?;
        let value = Self::decode::<serde_json::Value>(response).await?;
        debug!("Received structured response");
        Ok(value)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait]
impl BatchProvider for OpenAiClient {
    #[instrument(skip(self, contents), fields(bytes = contents.len()))]
    async fn upload_batch_file(&self, file_name: &str, contents: String) -> DiptychResult<String> {
        let response = self
            .send("files.create", || {
                let part = Part::text(contents.clone())
                    .file_name(file_name.to_string())
                    .mime_str("application/jsonl")
                    .map_err(|e| ProviderError::new(ProviderErrorKind::Request(e.to_string())))?;
                let form = Form::new().text("purpose", "batch").part("file", part);
                Ok(self
                    .client
                    .post(self.url("/files"))
                    .bearer_auth(&self.api_key)
                    .multipart(form))
            })
            .await?;
        let file = Self::decode::<FileObject>(response).await?;
        info!(file_id = %file.id, "Uploaded batch input file");
        Ok(file.id)
    }

    #[instrument(skip(self))]
    async fn create_job(&self, input_file_id: &str) -> DiptychResult<RemoteJob> {
        let body = CreateBatchRequest::new(input_file_id);
        let response = self
            .send("batches.create", || Ok(self.post_json("/batches", &body)))
            .await?;
        let job = RemoteJob::from(Self::decode::<BatchObject>(response).await?);
        info!(job_id = %job.id, status = %job.status, "Created batch job");
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn get_job(&self, job_id: &str) -> DiptychResult<RemoteJob> {
        let path = format!("/batches/{}", job_id);
        let response = self.send("batches.retrieve", || Ok(self.get(&path))).await?;
        let job = RemoteJob::from(Self::decode::<BatchObject>(response).await?);
        debug!(status = %job.status, "Fetched batch job");
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn download_file(&self, file_id: &str) -> DiptychResult<String> {
        let path = format!("/files/{}/content", file_id);
        let response = self.send("files.content", || Ok(self.get(&path))).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::Decode(e.to_string())))?;
        debug!(bytes = text.len(), "Downloaded file");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_a_configuration_error() {
        let err = OpenAiClient::new("  ").unwrap_err();
        assert_eq!(err.class(), diptych_error::ErrorClass::Configuration);
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = OpenAiClient::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:9000/v1/");
        assert_eq!(client.base_url(), "http://localhost:9000/v1");
        assert_eq!(client.url("/files"), "http://localhost:9000/v1/files");
    }
}
