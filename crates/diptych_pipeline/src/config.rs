//! Explicit configuration for pipeline components.

use serde::{Deserialize, Serialize};

/// Model used when neither the run nor the batch names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Longest provider error body kept on a failed batch item, in characters.
pub const DEFAULT_ERROR_BODY_LIMIT: usize = 2000;

/// Settings shared by the executor, submitter and reconciler.
///
/// # Examples
///
/// ```
/// use diptych_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .default_model("gpt-4.1")
///     .build()
///     .unwrap();
/// assert_eq!(config.default_model(), "gpt-4.1");
/// assert_eq!(*config.error_body_limit(), 2000);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(setter(into), default)]
pub struct PipelineConfig {
    /// Model for runs and batches without an override
    default_model: String,
    /// Truncation limit for provider error bodies
    error_body_limit: usize,
}

impl PipelineConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Model to use given an optional override.
    pub fn model_for(&self, requested: Option<&str>) -> String {
        requested
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(self.default_model.as_str())
            .to_string()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            error_body_limit: DEFAULT_ERROR_BODY_LIMIT,
        }
    }
}
