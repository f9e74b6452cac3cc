//! OpenAI Responses and Batch API integration.

mod client;
mod dto;

pub use client::{DEFAULT_BASE_URL, OpenAiClient};
pub use dto::{BATCH_ENDPOINT, COMPLETION_WINDOW};
