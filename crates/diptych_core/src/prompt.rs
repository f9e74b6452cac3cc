//! Provider-agnostic prompt and its structured-output request body.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Named JSON schema the model output must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Schema name sent to the provider
    pub name: String,
    /// Whether the provider must enforce the schema
    pub strict: bool,
    /// JSON schema document
    pub schema: Value,
}

/// System and user text plus the expected output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// System instruction
    pub system: String,
    /// User message, a JSON document describing the topic
    pub user: String,
    /// Output schema
    pub schema: ResponseSchema,
}

impl Prompt {
    /// Create a prompt.
    pub fn new(system: impl Into<String>, user: impl Into<String>, schema: ResponseSchema) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            schema,
        }
    }

    /// Body for a Responses-style structured output request.
    ///
    /// The same body is sent by the synchronous call and embedded in every
    /// batch request line.
    pub fn request_body(&self, model: &str) -> Value {
        json!({
            "model": model,
            "input": [
                {
                    "role": "system",
                    "content": [{"type": "input_text", "text": self.system}],
                },
                {
                    "role": "user",
                    "content": [{"type": "input_text", "text": self.user}],
                },
            ],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": self.schema.name,
                    "strict": self.schema.strict,
                    "schema": self.schema.schema,
                }
            },
        })
    }
}
