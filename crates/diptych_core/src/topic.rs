//! Topic records: the structured input a run generates from.

use crate::JsonMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted slug, in characters.
const MAX_SLUG_LEN: usize = 255;

/// A stored topic.
///
/// All content blocks are opaque JSON objects that the prompt builder embeds
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic id
    pub id: Uuid,
    /// Unique slug, also the exported file stem
    pub slug: String,
    /// Free-form tags
    pub tags: JsonMap,
    /// French content block
    pub fr: JsonMap,
    /// English content block
    pub en: JsonMap,
    /// Shared context for both languages
    pub context: JsonMap,
    /// Editorial constraints
    pub constraints: JsonMap,
    /// Author-supplied inputs
    pub author_inputs: JsonMap,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    /// Materialize a new topic with a fresh id.
    pub fn create(new: NewTopic, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: new.slug,
            tags: new.tags,
            fr: new.fr,
            en: new.en,
            context: new.context,
            constraints: new.constraints,
            author_inputs: new.author_inputs,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: TopicPatch, now: DateTime<Utc>) {
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(fr) = patch.fr {
            self.fr = fr;
        }
        if let Some(en) = patch.en {
            self.en = en;
        }
        if let Some(context) = patch.context {
            self.context = context;
        }
        if let Some(constraints) = patch.constraints {
            self.constraints = constraints;
        }
        if let Some(author_inputs) = patch.author_inputs {
            self.author_inputs = author_inputs;
        }
        self.updated_at = now;
    }
}

/// Input for creating a topic.
///
/// # Examples
///
/// ```
/// use diptych_core::NewTopic;
/// use serde_json::json;
///
/// let fr = json!({"title": "Bonjour"}).as_object().cloned().unwrap();
/// let topic = NewTopic::builder()
///     .slug("hello-world")
///     .fr(fr)
///     .build()
///     .unwrap();
/// assert_eq!(topic.slug, "hello-world");
/// assert!(topic.en.is_empty());
///
/// assert!(NewTopic::builder().slug("").build().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct NewTopic {
    /// Unique slug
    pub slug: String,
    /// Free-form tags
    #[serde(default)]
    #[builder(default)]
    pub tags: JsonMap,
    /// French content block
    #[serde(default)]
    #[builder(default)]
    pub fr: JsonMap,
    /// English content block
    #[serde(default)]
    #[builder(default)]
    pub en: JsonMap,
    /// Shared context
    #[serde(default)]
    #[builder(default)]
    pub context: JsonMap,
    /// Editorial constraints
    #[serde(default)]
    #[builder(default)]
    pub constraints: JsonMap,
    /// Author-supplied inputs
    #[serde(default)]
    #[builder(default)]
    pub author_inputs: JsonMap,
}

impl NewTopic {
    /// Start building a topic.
    pub fn builder() -> NewTopicBuilder {
        NewTopicBuilder::default()
    }

    /// Check the slug, returning the reason it is rejected.
    pub fn slug_problem(slug: &str) -> Option<String> {
        if slug.trim().is_empty() {
            Some("slug must not be empty".to_string())
        } else if slug.chars().count() > MAX_SLUG_LEN {
            Some(format!("slug must be at most {} characters", MAX_SLUG_LEN))
        } else if slug.contains(['/', '\\']) || slug.contains("..") {
            Some("slug must not contain path separators or '..'".to_string())
        } else {
            None
        }
    }
}

impl NewTopicBuilder {
    fn validate(&self) -> Result<(), String> {
        match &self.slug {
            Some(slug) => NewTopic::slug_problem(slug).map_or(Ok(()), Err),
            None => Ok(()),
        }
    }
}

/// Partial topic update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicPatch {
    /// New slug
    #[serde(default)]
    pub slug: Option<String>,
    /// Replacement tags
    #[serde(default)]
    pub tags: Option<JsonMap>,
    /// Replacement French block
    #[serde(default)]
    pub fr: Option<JsonMap>,
    /// Replacement English block
    #[serde(default)]
    pub en: Option<JsonMap>,
    /// Replacement context
    #[serde(default)]
    pub context: Option<JsonMap>,
    /// Replacement constraints
    #[serde(default)]
    pub constraints: Option<JsonMap>,
    /// Replacement author inputs
    #[serde(default)]
    pub author_inputs: Option<JsonMap>,
}
