//! Per-language artifacts and the single write path that produces them.

use crate::{JsonMap, Lang};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generated content for one language.
///
/// Older outputs name the body field `body_mdx`; both spellings are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactContent {
    /// Open frontmatter object
    pub frontmatter: JsonMap,
    /// MDX body
    #[serde(alias = "body_mdx")]
    pub body: String,
}

/// Request to write the artifact for `(run_id, lang)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactWrite {
    /// Owning run
    pub run_id: Uuid,
    /// Artifact language
    pub lang: Lang,
    /// New content
    pub content: ArtifactContent,
}

/// A stored artifact. At most one exists per `(run_id, lang)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact id
    pub id: Uuid,
    /// Owning run
    pub run_id: Uuid,
    /// Artifact language
    pub lang: Lang,
    /// Frontmatter object
    pub frontmatter: JsonMap,
    /// MDX body
    pub body: String,
    /// Editor sign-off
    pub reviewed: bool,
    /// Editor notes
    pub review_notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// First write for a `(run, lang)` pair.
    pub fn create(write: &ArtifactWrite, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: write.run_id,
            lang: write.lang,
            frontmatter: write.content.frontmatter.clone(),
            body: write.content.body.clone(),
            reviewed: false,
            review_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace generated content. Review state always resets.
    pub fn overwrite(&mut self, content: &ArtifactContent, now: DateTime<Utc>) {
        self.frontmatter = content.frontmatter.clone();
        self.body = content.body.clone();
        self.reviewed = false;
        self.review_notes = None;
        self.updated_at = now;
    }

    /// Apply an editor's partial update.
    pub fn apply(&mut self, patch: ArtifactPatch, now: DateTime<Utc>) {
        if let Some(frontmatter) = patch.frontmatter {
            self.frontmatter = frontmatter;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(reviewed) = patch.reviewed {
            self.reviewed = reviewed;
        }
        if let Some(review_notes) = patch.review_notes {
            self.review_notes = review_notes;
        }
        self.updated_at = now;
    }
}

/// Editor update to an artifact; absent fields are left unchanged.
///
/// `review_notes: Some(None)` clears the notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPatch {
    /// Replacement frontmatter
    #[serde(default)]
    pub frontmatter: Option<JsonMap>,
    /// Replacement body
    #[serde(default)]
    pub body: Option<String>,
    /// New review flag
    #[serde(default)]
    pub reviewed: Option<bool>,
    /// New review notes
    #[serde(default, with = "double_option")]
    pub review_notes: Option<Option<String>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<String>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(body: &str) -> ArtifactContent {
        ArtifactContent {
            frontmatter: json!({"title": "T"}).as_object().cloned().unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn overwrite_resets_review() {
        let write = ArtifactWrite {
            run_id: Uuid::new_v4(),
            lang: Lang::Fr,
            content: content("v1"),
        };
        let mut artifact = Artifact::create(&write, Utc::now());
        artifact.apply(
            ArtifactPatch {
                reviewed: Some(true),
                review_notes: Some(Some("ok".to_string())),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(artifact.reviewed);

        artifact.overwrite(&content("v2"), Utc::now());
        assert_eq!(artifact.body, "v2");
        assert!(!artifact.reviewed);
        assert!(artifact.review_notes.is_none());
    }

    #[test]
    fn body_mdx_alias_is_accepted() {
        let parsed: ArtifactContent =
            serde_json::from_value(json!({"frontmatter": {}, "body_mdx": "# Hi"})).unwrap();
        assert_eq!(parsed.body, "# Hi");
        assert!(
            serde_json::from_value::<ArtifactContent>(
                json!({"frontmatter": {}, "body": "x", "extra": 1})
            )
            .is_err()
        );
    }

    #[test]
    fn patch_distinguishes_cleared_notes_from_absent() {
        let absent: ArtifactPatch = serde_json::from_value(json!({"reviewed": true})).unwrap();
        assert_eq!(absent.review_notes, None);
        let cleared: ArtifactPatch =
            serde_json::from_value(json!({"review_notes": null})).unwrap();
        assert_eq!(cleared.review_notes, Some(None));
    }
}
