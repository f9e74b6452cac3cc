//! MDX export of reviewed runs.

use crate::evaluate_gate;
use diptych_core::{Artifact, Lang, NewTopic, Run, Topic};
use diptych_error::{
    ConfigError, DiptychResult, ExportError, ExportErrorKind, GateBlockedError, ValidationError,
    ValidationErrorKind,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory under the export root that holds per-language content.
const CONTENT_DIR: [&str; 3] = ["src", "content", "blog"];

/// One written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFile {
    /// Artifact language
    pub lang: Lang,
    /// Absolute or root-relative path written
    pub path: PathBuf,
}

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReceipt {
    /// Exported run
    pub run_id: Uuid,
    /// Topic slug used as the file stem
    pub slug: String,
    /// Files written, one per language
    pub files: Vec<ExportedFile>,
}

/// Render an artifact as an MDX document with YAML frontmatter.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use diptych_core::{Artifact, ArtifactContent, ArtifactWrite, Lang};
/// use diptych_pipeline::render_mdx;
/// use serde_json::json;
/// use uuid::Uuid;
///
/// let artifact = Artifact::create(&ArtifactWrite {
///     run_id: Uuid::new_v4(),
///     lang: Lang::En,
///     content: ArtifactContent {
///         frontmatter: json!({"title": "Tides"}).as_object().cloned().unwrap(),
///         body: "# Tides\n\n".to_string(),
///     },
/// }, Utc::now());
/// assert_eq!(render_mdx(&artifact).unwrap(), "---\ntitle: Tides\n---\n\n# Tides\n");
/// ```
pub fn render_mdx(artifact: &Artifact) -> DiptychResult<String> {
    let yaml = serde_yaml::to_string(&artifact.frontmatter)
        .map_err(|e| ExportError::new(ExportErrorKind::Render(e.to_string())))?;
    Ok(format!(
        "---\n{}\n---\n\n{}\n",
        yaml.trim_end(),
        artifact.body.trim_end()
    ))
}

/// Writes reviewed runs into a content repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exporter {
    root: Option<PathBuf>,
}

impl Exporter {
    /// Create an exporter writing under `root`, or an unconfigured one.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// The configured root.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Target path for one language.
    pub fn target_path(root: &Path, lang: Lang, slug: &str) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(CONTENT_DIR);
        path.push(lang.to_string());
        path.push(format!("{}.mdx", slug));
        path
    }

    /// Export a run's artifacts after the gate passes.
    ///
    /// # Errors
    ///
    /// - `GateBlocked` with every failing reason
    /// - `Config` if no export root is configured
    /// - `Validation` if the slug would leave the export root
    /// - `Export` if rendering or writing fails
    #[tracing::instrument(skip_all, fields(run_id = %run.id, slug = %topic.slug))]
    pub async fn export(
        &self,
        run: &Run,
        topic: &Topic,
        artifacts: &[Artifact],
    ) -> DiptychResult<ExportReceipt> {
        let report = evaluate_gate(run, artifacts);
        if !report.ready {
            tracing::info!(reasons = ?report.reasons, "Export blocked");
            return Err(GateBlockedError::new(report.reasons).into());
        }

        let Some(root) = self.root.as_deref() else {
            return Err(ConfigError::new("export.root (BLOG_REPO_PATH) is not configured").into());
        };
        if let Some(reason) = NewTopic::slug_problem(&topic.slug) {
            return Err(ValidationError::new(ValidationErrorKind::InvalidField {
                field: "slug".to_string(),
                reason,
            })
            .into());
        }

        let mut files = Vec::with_capacity(Lang::ALL.len());
        for lang in Lang::ALL {
            // The gate guarantees both languages are present.
            let Some(artifact) = artifacts.iter().find(|a| a.lang == lang) else {
                continue;
            };
            let path = Self::target_path(root, lang, &topic.slug);
            let document = render_mdx(artifact)?;
            write_file(&path, document).await?;
            tracing::info!(path = %path.display(), "Exported artifact");
            files.push(ExportedFile { lang, path });
        }

        Ok(ExportReceipt {
            run_id: run.id,
            slug: topic.slug.clone(),
            files,
        })
    }
}

async fn write_file(path: &Path, contents: String) -> DiptychResult<()> {
    let write_error = |e: std::io::Error| {
        ExportError::new(ExportErrorKind::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(path, contents).await.map_err(write_error)?;
    Ok(())
}
