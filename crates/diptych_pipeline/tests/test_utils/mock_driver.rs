//! Mock generation driver for testing.

use async_trait::async_trait;
use diptych_core::Prompt;
use diptych_error::{DiptychError, DiptychResult, ProviderError, ProviderErrorKind};
use diptych_interface::GenerationDriver;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Behavior configuration for mock responses.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always return the given response JSON
    Respond(Value),
    /// Always return the specified error
    Error(ProviderErrorKind),
    /// Fail N times with the error, then respond
    FailThenRespond {
        fail_count: usize,
        error: ProviderErrorKind,
        response: Value,
    },
}

/// Mock driver that records every prompt it receives.
pub struct MockDriver {
    behavior: MockBehavior,
    call_count: Arc<Mutex<usize>>,
    prompts: Arc<Mutex<Vec<(String, Prompt)>>>,
}

impl MockDriver {
    /// Create a driver that always responds with `response`.
    pub fn new_response(response: Value) -> Self {
        Self::new_with_behavior(MockBehavior::Respond(response))
    }

    /// Create a driver that always fails.
    pub fn new_error(error: ProviderErrorKind) -> Self {
        Self::new_with_behavior(MockBehavior::Error(error))
    }

    /// Create a driver that fails N times, then responds.
    pub fn new_fail_then_respond(
        fail_count: usize,
        error: ProviderErrorKind,
        response: Value,
    ) -> Self {
        Self::new_with_behavior(MockBehavior::FailThenRespond {
            fail_count,
            error,
            response,
        })
    }

    /// Create a driver with custom behavior.
    pub fn new_with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(Mutex::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times generate() was called.
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Model and prompt of every call, in order.
    #[allow(dead_code)]
    pub fn prompts(&self) -> Vec<(String, Prompt)> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_response(&self) -> DiptychResult<Value> {
        let mut count = self.call_count.lock().unwrap();
        let current = *count;
        *count += 1;

        match &self.behavior {
            MockBehavior::Respond(response) => Ok(response.clone()),
            MockBehavior::Error(kind) => Err(DiptychError::from(ProviderError::new(kind.clone()))),
            MockBehavior::FailThenRespond {
                fail_count,
                error,
                response,
            } => {
                if current < *fail_count {
                    Err(DiptychError::from(ProviderError::new(error.clone())))
                } else {
                    Ok(response.clone())
                }
            }
        }
    }
}

#[async_trait]
impl GenerationDriver for MockDriver {
    async fn generate(&self, model: &str, prompt: &Prompt) -> DiptychResult<Value> {
        self.prompts
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.clone()));
        self.next_response()
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
