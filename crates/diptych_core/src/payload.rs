//! The structured object a model returns for one run.

use crate::{ArtifactContent, ArtifactWrite, JsonMap, Lang};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Both language artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactPair {
    /// French artifact
    pub fr: ArtifactContent,
    /// English artifact
    pub en: ArtifactContent,
}

/// `{meta, artifacts: {fr, en}}`, validated against the generation schema.
///
/// # Examples
///
/// ```
/// use diptych_core::{GenerationPayload, Lang};
/// use serde_json::json;
///
/// let payload: GenerationPayload = serde_json::from_value(json!({
///     "meta": {"claims_to_verify": []},
///     "artifacts": {
///         "fr": {"frontmatter": {"title": "Bonjour"}, "body": "Salut"},
///         "en": {"frontmatter": {"title": "Hello"}, "body": "Hi"}
///     }
/// })).unwrap();
/// assert_eq!(payload.content(Lang::En).body, "Hi");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationPayload {
    /// Run metadata
    pub meta: JsonMap,
    /// Per-language artifacts
    pub artifacts: ArtifactPair,
}

impl GenerationPayload {
    /// Content for one language.
    pub fn content(&self, lang: Lang) -> &ArtifactContent {
        match lang {
            Lang::Fr => &self.artifacts.fr,
            Lang::En => &self.artifacts.en,
        }
    }

    /// Artifact writes for `run_id`, one per language.
    pub fn writes(&self, run_id: Uuid) -> Vec<ArtifactWrite> {
        Lang::ALL
            .iter()
            .map(|lang| ArtifactWrite {
                run_id,
                lang: *lang,
                content: self.content(*lang).clone(),
            })
            .collect()
    }
}
