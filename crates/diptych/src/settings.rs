//! Layered application configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Bundled defaults (`diptych.toml` shipped with the crate)
//! 2. `./diptych.toml`, or the file passed explicitly
//! 3. Environment variables `DIPTYCH__SECTION__KEY`
//!
//! After merging, empty `database.url`, `openai.api_key` and `export.root`
//! fall back to `DATABASE_URL`, `OPENAI_API_KEY` and `BLOG_REPO_PATH`.

use config::{Config, Environment, File, FileFormat};
use diptych_error::{ConfigError, DiptychError, DiptychResult};
use diptych_pipeline::{Exporter, PipelineConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../diptych.toml");

/// Database settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: String,
}

/// OpenAI client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// Default model for runs and batches
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Retries for transient HTTP failures
    pub max_retries: usize,
}

/// Export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Blog repository root
    #[serde(default)]
    pub root: String,
}

/// Background worker settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Workers started by `diptych worker`
    pub concurrency: usize,
    /// Sleep between polls of an empty queue
    pub idle_interval_ms: u64,
    /// Attempts per task, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff_ms: u64,
    /// Cap on any retry delay
    pub max_delay_secs: u64,
    /// Age after which a claimed task is presumed abandoned
    pub claim_lease_secs: u64,
}

/// Pipeline settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Characters of a provider error body kept on a failed item
    pub error_body_limit: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

/// Top-level configuration.
///
/// # Example
///
/// ```
/// use diptych::DiptychConfig;
///
/// let config = DiptychConfig::from_toml("[worker]\nconcurrency = 8\n").unwrap();
/// assert_eq!(config.worker.concurrency, 8);
/// assert_eq!(config.openai.model, "gpt-4.1-mini");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiptychConfig {
    /// Database section
    pub database: DatabaseSettings,
    /// OpenAI section
    pub openai: OpenAiSettings,
    /// Export section
    pub export: ExportSettings,
    /// Worker section
    pub worker: WorkerSettings,
    /// Pipeline section
    pub pipeline: PipelineSettings,
    /// Logging section
    pub logging: LoggingSettings,
}

fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> DiptychResult<DiptychConfig> {
    builder
        .build()
        .map_err(|e| {
            DiptychError::from(ConfigError::new(format!(
                "Failed to build configuration: {}",
                e
            )))
        })?
        .try_deserialize()
        .map_err(|e| {
            DiptychError::from(ConfigError::new(format!(
                "Failed to parse configuration: {}",
                e
            )))
        })
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl DiptychConfig {
    /// Load configuration from every source.
    ///
    /// With `path`, that file is required; without it, `./diptych.toml` is
    /// read if present.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a source cannot be read or the
    /// merged result does not deserialize.
    #[instrument]
    pub fn load(path: Option<&Path>) -> DiptychResult<Self> {
        debug!("Loading configuration: environment > user file > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("diptych").required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix("DIPTYCH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(build(builder)?.with_fallbacks(|key| std::env::var(key).ok()))
    }

    /// Bundled defaults overlaid with a TOML document. Environment
    /// variables are not consulted.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `toml` does not parse.
    pub fn from_toml(toml: &str) -> DiptychResult<Self> {
        build(
            Config::builder()
                .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
                .add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    /// Fill empty settings from the conventional environment variables,
    /// looked up through `lookup`.
    pub fn with_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fallback = |current: &mut String, key: &str| {
            if non_blank(current).is_none() {
                if let Some(value) = lookup(key) {
                    *current = value;
                }
            }
        };
        fallback(&mut self.database.url, "DATABASE_URL");
        fallback(&mut self.openai.api_key, "OPENAI_API_KEY");
        fallback(&mut self.export.root, "BLOG_REPO_PATH");
        self
    }

    /// The database URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no URL is configured.
    pub fn database_url(&self) -> DiptychResult<&str> {
        non_blank(&self.database.url).ok_or_else(|| {
            ConfigError::new("database.url (DATABASE_URL) is not configured").into()
        })
    }

    /// The OpenAI API key, if configured.
    pub fn api_key(&self) -> Option<&str> {
        non_blank(&self.openai.api_key)
    }

    /// Export root, if configured.
    pub fn export_root(&self) -> Option<PathBuf> {
        non_blank(&self.export.root).map(PathBuf::from)
    }

    /// Pipeline settings for the executor, submitter and reconciler.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig::builder()
            .default_model(
                non_blank(&self.openai.model)
                    .unwrap_or(defaults.default_model())
                    .to_string(),
            )
            .error_body_limit(self.pipeline.error_body_limit)
            .build()
            .unwrap_or(defaults)
    }

    /// Task retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(self.worker.max_attempts.max(1))
            .initial_backoff_ms(self.worker.initial_backoff_ms)
            .max_delay_secs(self.worker.max_delay_secs)
            .build()
            .unwrap_or_default()
    }

    /// Exporter over the configured root.
    pub fn exporter(&self) -> Exporter {
        Exporter::new(self.export_root())
    }

    /// Sleep between polls of an empty queue.
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.worker.idle_interval_ms)
    }

    /// How long a claim may go without progress before `diptych worker`
    /// hands the task back to the queue.
    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.worker.claim_lease_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_defaults_parse() {
        let config = DiptychConfig::from_toml("").unwrap();
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.worker.max_attempts, 6);
        assert_eq!(config.pipeline.error_body_limit, 2000);
        assert!(!config.logging.json);
        assert!(config.api_key().is_none());
        assert!(config.export_root().is_none());
    }

    #[test]
    fn blank_settings_fall_back_to_environment() {
        let config = DiptychConfig::from_toml("[export]\nroot = \"/srv/blog\"\n")
            .unwrap()
            .with_fallbacks(|key| match key {
                "DATABASE_URL" => Some("postgres://localhost/diptych".to_string()),
                "BLOG_REPO_PATH" => Some("/ignored".to_string()),
                _ => None,
            });
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/diptych");
        assert_eq!(config.export_root(), Some(PathBuf::from("/srv/blog")));
        assert!(config.api_key().is_none());
    }

    #[test]
    fn missing_database_url_is_a_configuration_error() {
        let config = DiptychConfig::from_toml("").unwrap();
        let err = config.database_url().unwrap_err();
        assert_eq!(err.summary(), "database.url (DATABASE_URL) is not configured");
    }
}
