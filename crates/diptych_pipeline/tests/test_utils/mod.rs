//! Test utilities for pipeline tests.
//!
//! Mock collaborators plus fixtures for topics and provider responses.

#![allow(dead_code)]

pub mod mock_driver;
pub mod mock_provider;

pub use mock_driver::{MockBehavior, MockDriver};
pub use mock_provider::MockBatchProvider;

use diptych_core::{NewTopic, Topic};
use diptych_interface::ContentStore;
use diptych_pipeline::InMemoryContentStore;
use serde_json::{Value, json};
use std::sync::Arc;

/// Fresh in-memory store, both as the concrete type and as a trait object.
pub fn store() -> (InMemoryContentStore, Arc<dyn ContentStore>) {
    let store = InMemoryContentStore::new();
    let shared: Arc<dyn ContentStore> = Arc::new(store.clone());
    (store, shared)
}

/// Insert a topic with the given slug.
pub async fn seed_topic(store: &Arc<dyn ContentStore>, slug: &str) -> Topic {
    let new = NewTopic::builder()
        .slug(slug)
        .fr(json!({"title": "Les marées"}).as_object().cloned().unwrap())
        .en(json!({"title": "Tides"}).as_object().cloned().unwrap())
        .build()
        .unwrap();
    store
        .insert_topic(&Topic::create(new, chrono::Utc::now()))
        .await
        .unwrap()
}

/// A valid generation payload with the given meta.
pub fn payload(meta: Value) -> Value {
    json!({
        "meta": meta,
        "artifacts": {
            "fr": {"frontmatter": {"title": "Les marées"}, "body": "# Les marées\n"},
            "en": {"frontmatter": {"title": "Tides"}, "body": "# Tides\n"},
        }
    })
}

/// A Responses-API document carrying `payload` as output text.
pub fn response_with(payload: &Value) -> Value {
    json!({
        "id": "resp_1",
        "output": [{
            "type": "message",
            "content": [{"type": "output_text", "text": payload.to_string()}],
        }],
        "output_text": payload.to_string(),
    })
}

/// A Responses-API document with the payload only in content blocks, as a
/// batch output line carries it.
pub fn blocks_only_response(payload: &Value) -> Value {
    json!({
        "id": "resp_batch",
        "output": [{
            "type": "message",
            "content": [{"type": "output_text", "text": payload.to_string()}],
        }],
    })
}

/// The standard successful response.
pub fn good_response() -> Value {
    response_with(&payload(json!({"claims_to_verify": []})))
}

/// One batch output line for a correlation id.
pub fn output_line(custom_id: &str, status_code: u16, body: Value) -> String {
    json!({
        "id": format!("line_{}", custom_id),
        "custom_id": custom_id,
        "response": {"status_code": status_code, "body": body},
        "error": null,
    })
    .to_string()
}

/// One batch output line carrying a request-level error.
pub fn error_line(custom_id: &str, code: &str, message: &str) -> String {
    json!({
        "id": format!("line_{}", custom_id),
        "custom_id": custom_id,
        "response": null,
        "error": {"code": code, "message": message},
    })
    .to_string()
}
