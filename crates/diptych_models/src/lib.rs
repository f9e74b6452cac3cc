//! LLM provider integrations for Diptych.
//!
//! [`OpenAiClient`] speaks the OpenAI Responses API for synchronous
//! generation and the Files and Batches APIs for batch jobs. Transient
//! failures are retried inside the client with exponential backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use diptych_models::OpenAiClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::new("sk-test")?.with_base_url("http://localhost:8080/v1");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod openai;

pub use openai::{BATCH_ENDPOINT, COMPLETION_WINDOW, DEFAULT_BASE_URL, OpenAiClient};
