//! Extraction of the generation payload from provider responses.
//!
//! Providers wrap structured output in several envelope shapes: an already
//! parsed object, a raw text field, or content blocks nested in an output
//! list. [`ResultParser`] runs an ordered chain of [`ExtractionStrategy`]
//! implementations over the response JSON; the first strategy that yields a
//! JSON object wins, and that object is then validated against the
//! generation schema.
//!
//! A synchronous response and the `response.body` of the equivalent batch
//! output line are the same JSON document, so both flows share one parser.

use diptych_core::GenerationPayload;
use diptych_error::{DiptychResult, MalformedOutputError};
use serde_json::{Map, Value};

/// One way of locating the payload object inside a response.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Return the candidate object, or `None` when this envelope shape is
    /// absent.
    fn candidate(&self, response: &Value) -> Option<Map<String, Value>>;
}

/// A pre-parsed structured field (`output_parsed`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ParsedField;

impl ExtractionStrategy for ParsedField {
    fn name(&self) -> &'static str {
        "output_parsed"
    }

    fn candidate(&self, response: &Value) -> Option<Map<String, Value>> {
        response.get("output_parsed")?.as_object().cloned()
    }
}

/// A raw text field (`output_text`) holding a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputText;

impl ExtractionStrategy for OutputText {
    fn name(&self) -> &'static str {
        "output_text"
    }

    fn candidate(&self, response: &Value) -> Option<Map<String, Value>> {
        let text = response.get("output_text")?.as_str()?;
        parse_object(text.trim())
    }
}

/// Content blocks under `output[].content[].text`; the first text starting
/// with `{` that parses as an object is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentBlocks;

impl ExtractionStrategy for ContentBlocks {
    fn name(&self) -> &'static str {
        "content_blocks"
    }

    fn candidate(&self, response: &Value) -> Option<Map<String, Value>> {
        block_texts(response)
            .map(str::trim)
            .filter(|text| text.starts_with('{'))
            .find_map(parse_object)
    }
}

/// JSON embedded in prose or a markdown fence, in any text field.
///
/// Last resort for models that ignore structured output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedJson;

impl ExtractionStrategy for FencedJson {
    fn name(&self) -> &'static str {
        "fenced_json"
    }

    fn candidate(&self, response: &Value) -> Option<Map<String, Value>> {
        let output_text = response.get("output_text").and_then(Value::as_str);
        output_text
            .into_iter()
            .chain(block_texts(response))
            .find_map(|text| {
                extract_from_code_block(text)
                    .and_then(|json| parse_object(&json))
                    .or_else(|| extract_balanced(text, '{', '}').and_then(|json| parse_object(&json)))
            })
    }
}

fn block_texts(response: &Value) -> impl Iterator<Item = &str> {
    response
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Extract content from a markdown code block (```json or bare ```).
fn extract_from_code_block(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let content_start = start + 3;
    // Skip the language tag, if any
    let skip_to = response[content_start..]
        .find('\n')
        .map(|n| content_start + n + 1)
        .unwrap_or(content_start);
    let end = response[skip_to..].find("```")?;
    Some(response[skip_to..skip_to + end].trim().to_string())
}

/// Extract content between balanced delimiters, ignoring delimiters inside
/// strings.
fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(response[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Ordered chain of extraction strategies followed by schema validation.
///
/// # Examples
///
/// ```
/// use diptych_pipeline::ResultParser;
/// use serde_json::json;
///
/// let response = json!({
///     "output_text": r#"{"meta": {}, "artifacts": {
///         "fr": {"frontmatter": {}, "body": "Bonjour"},
///         "en": {"frontmatter": {}, "body": "Hello"}}}"#
/// });
/// let payload = ResultParser::new().parse(&response).unwrap();
/// assert_eq!(payload.artifacts.fr.body, "Bonjour");
///
/// assert!(ResultParser::new().parse(&json!({"output": []})).is_err());
/// ```
pub struct ResultParser {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ResultParser {
    /// The standard chain: parsed field, output text, content blocks, then
    /// fenced or embedded JSON.
    pub fn new() -> Self {
        Self::empty()
            .with_strategy(ParsedField)
            .with_strategy(OutputText)
            .with_strategy(ContentBlocks)
            .with_strategy(FencedJson)
    }

    /// A parser with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy to the end of the chain.
    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract and validate the generation payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedOutputError`] when no strategy finds an object, or
    /// when the object does not match the schema.
    pub fn parse(&self, response: &Value) -> DiptychResult<GenerationPayload> {
        let Some((strategy, candidate)) = self
            .strategies
            .iter()
            .find_map(|s| s.candidate(response).map(|c| (s.name(), c)))
        else {
            tracing::error!(
                strategies = ?self.strategy_names(),
                "No JSON object found in provider response"
            );
            return Err(MalformedOutputError::new(
                "could not extract a JSON object from the provider response",
            )
            .into());
        };

        tracing::debug!(strategy, "Extracted generation candidate");

        serde_json::from_value(Value::Object(candidate)).map_err(|e| {
            tracing::error!(strategy, error = %e, "Generation output does not match schema");
            MalformedOutputError::new(format!("output does not match the generation schema: {}", e))
                .into()
        })
    }
}

impl Default for ResultParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResultParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultParser")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}
