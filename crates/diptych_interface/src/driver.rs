//! Synchronous generation.

use async_trait::async_trait;
use diptych_core::Prompt;
use diptych_error::DiptychResult;
use std::sync::Arc;

/// A backend that answers one prompt with one structured response.
///
/// The raw response JSON is returned untouched; extracting the generation
/// payload from it is the result parser's job.
#[async_trait]
pub trait GenerationDriver: Send + Sync {
    /// Generate a response for `prompt` using `model`.
    async fn generate(&self, model: &str, prompt: &Prompt) -> DiptychResult<serde_json::Value>;

    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &'static str;
}

#[async_trait]
impl<T: GenerationDriver + ?Sized> GenerationDriver for Arc<T> {
    async fn generate(&self, model: &str, prompt: &Prompt) -> DiptychResult<serde_json::Value> {
        (**self).generate(model, prompt).await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}
