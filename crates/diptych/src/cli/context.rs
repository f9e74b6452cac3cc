//! Shared state for command handlers.

use async_trait::async_trait;
use diptych::{
    BatchProvider, BatchReconciler, ConfigError, ContentService, ContentStore, DiptychConfig,
    DiptychResult, OpenAiClient, PostgresContentStore, PostgresTaskQueue, RemoteJob, RunExecutor,
    establish_connection,
};
use std::sync::Arc;

const MISSING_KEY: &str = "openai.api_key (OPENAI_API_KEY) is not configured";

/// Stands in for the provider when no API key is configured, so commands
/// that never reach the provider still work.
#[derive(Debug, Clone, Copy)]
struct UnconfiguredProvider;

#[async_trait]
impl BatchProvider for UnconfiguredProvider {
    async fn upload_batch_file(&self, _file_name: &str, _contents: String) -> DiptychResult<String> {
        Err(ConfigError::new(MISSING_KEY).into())
    }

    async fn create_job(&self, _input_file_id: &str) -> DiptychResult<RemoteJob> {
        Err(ConfigError::new(MISSING_KEY).into())
    }

    async fn get_job(&self, _job_id: &str) -> DiptychResult<RemoteJob> {
        Err(ConfigError::new(MISSING_KEY).into())
    }

    async fn download_file(&self, _file_id: &str) -> DiptychResult<String> {
        Err(ConfigError::new(MISSING_KEY).into())
    }
}

/// Connections and services built from configuration.
pub struct AppContext {
    /// Loaded configuration
    pub config: DiptychConfig,
    /// Content store
    pub store: Arc<dyn ContentStore>,
    /// Task queue, kept concrete for recovery operations
    pub queue: Arc<PostgresTaskQueue>,
    /// Service over store, queue and provider
    pub service: ContentService<Arc<dyn BatchProvider>>,
    client: Option<Arc<OpenAiClient>>,
}

impl AppContext {
    /// Connect to the database and build the OpenAI client if a key is set.
    ///
    /// # Errors
    ///
    /// Fails if the database URL is missing or the connection is refused.
    pub fn connect(config: DiptychConfig) -> DiptychResult<Self> {
        let url = config.database_url()?;
        let store: Arc<dyn ContentStore> =
            Arc::new(PostgresContentStore::new(establish_connection(url)?));
        let queue = Arc::new(PostgresTaskQueue::new(establish_connection(url)?));

        let client = match config.api_key() {
            Some(key) => Some(Arc::new(
                OpenAiClient::new(key)?
                    .with_base_url(config.openai.base_url.as_str())
                    .with_max_retries(config.openai.max_retries),
            )),
            None => {
                tracing::debug!("No OpenAI key configured; provider calls will fail");
                None
            }
        };
        let provider: Arc<dyn BatchProvider> = match &client {
            Some(client) => client.clone(),
            None => Arc::new(UnconfiguredProvider),
        };

        let service = ContentService::new(
            store.clone(),
            queue.clone(),
            provider,
            config.pipeline_config(),
            config.exporter(),
        );

        Ok(Self {
            config,
            store,
            queue,
            service,
            client,
        })
    }

    /// The OpenAI client.
    ///
    /// # Errors
    ///
    /// Configuration error when no API key is set.
    pub fn client(&self) -> DiptychResult<Arc<OpenAiClient>> {
        self.client
            .clone()
            .ok_or_else(|| ConfigError::new(MISSING_KEY).into())
    }

    /// Synchronous run executor over the OpenAI client.
    pub fn executor(&self) -> DiptychResult<RunExecutor<Arc<OpenAiClient>>> {
        Ok(RunExecutor::new(
            self.client()?,
            self.store.clone(),
            self.config.pipeline_config(),
        ))
    }

    /// Batch reconciler over the OpenAI client.
    pub fn reconciler(&self) -> DiptychResult<BatchReconciler<Arc<OpenAiClient>>> {
        Ok(BatchReconciler::new(
            self.client()?,
            self.store.clone(),
            self.config.pipeline_config(),
        ))
    }
}
