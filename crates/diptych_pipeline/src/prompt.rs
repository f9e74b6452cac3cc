//! Prompt construction for topic generation.
//!
//! Everything here is pure: the same topic always yields the same prompt,
//! schema and request line.

use diptych_core::{Prompt, ResponseSchema, Topic};
use serde_json::{Value, json};

/// System instruction sent with every generation.
pub const SYSTEM_PROMPT: &str = "You are a precise content generation engine.";

/// Name of the structured output schema.
pub const SCHEMA_NAME: &str = "run_generation_result";

/// Endpoint every batch request line targets.
const BATCH_LINE_URL: &str = "/v1/responses";

fn artifact_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["frontmatter", "body"],
        "properties": {
            "frontmatter": {"type": "object", "additionalProperties": true},
            "body": {"type": "string"},
        },
    })
}

/// The fixed, strict output schema: `{meta, artifacts: {fr, en}}`.
pub fn response_schema() -> ResponseSchema {
    ResponseSchema {
        name: SCHEMA_NAME.to_string(),
        strict: true,
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["meta", "artifacts"],
            "properties": {
                "meta": {"type": "object", "additionalProperties": true},
                "artifacts": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["fr", "en"],
                    "properties": {
                        "fr": artifact_schema(),
                        "en": artifact_schema(),
                    },
                },
            },
        }),
    }
}

/// JSON document describing the topic and the task.
pub fn prompt_payload(topic: &Topic) -> Value {
    json!({
        "topic": {
            "id": topic.id.to_string(),
            "slug": topic.slug,
            "tags": topic.tags,
            "fr": topic.fr,
            "en": topic.en,
            "context": topic.context,
            "constraints": topic.constraints,
            "author_inputs": topic.author_inputs,
        },
        "instructions": {
            "goal": "Generate two artifacts (fr/en) in MDX with frontmatter.",
            "output": "Must exactly match the JSON schema.",
        },
    })
}

/// Build the generation prompt for a topic.
pub fn build_prompt(topic: &Topic) -> Prompt {
    Prompt::new(SYSTEM_PROMPT, prompt_payload(topic).to_string(), response_schema())
}

/// One line of a batch request file.
pub fn request_line(correlation_id: &str, model: &str, prompt: &Prompt) -> Value {
    json!({
        "custom_id": correlation_id,
        "method": "POST",
        "url": BATCH_LINE_URL,
        "body": prompt.request_body(model),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use diptych_core::NewTopic;

    fn topic() -> Topic {
        let new = NewTopic::builder()
            .slug("tides")
            .fr(json!({"title": "Les marées"}).as_object().cloned().unwrap())
            .en(json!({"title": "Tides"}).as_object().cloned().unwrap())
            .build()
            .unwrap();
        Topic::create(new, Utc::now())
    }

    #[test]
    fn prompt_is_deterministic() {
        let topic = topic();
        assert_eq!(build_prompt(&topic), build_prompt(&topic));
    }

    #[test]
    fn payload_embeds_every_topic_field() {
        let topic = topic();
        let payload = prompt_payload(&topic);
        assert_eq!(payload["topic"]["slug"], "tides");
        assert_eq!(payload["topic"]["fr"]["title"], "Les marées");
        for key in ["tags", "context", "constraints", "author_inputs"] {
            assert!(payload["topic"][key].is_object(), "{} missing", key);
        }
    }

    #[test]
    fn schema_requires_both_languages() {
        let schema = response_schema();
        assert!(schema.strict);
        assert_eq!(
            schema.schema["properties"]["artifacts"]["required"],
            json!(["fr", "en"])
        );
        assert_eq!(schema.schema["additionalProperties"], json!(false));
    }

    #[test]
    fn request_line_targets_responses_endpoint() {
        let topic = topic();
        let prompt = build_prompt(&topic);
        let line = request_line("run:abc", "gpt-4.1-mini", &prompt);
        assert_eq!(line["custom_id"], "run:abc");
        assert_eq!(line["method"], "POST");
        assert_eq!(line["url"], "/v1/responses");
        assert_eq!(line["body"]["model"], "gpt-4.1-mini");
        assert_eq!(line["body"]["text"]["format"]["name"], SCHEMA_NAME);
        assert_eq!(line["body"]["input"][0]["content"][0]["text"], SYSTEM_PROMPT);
    }
}
