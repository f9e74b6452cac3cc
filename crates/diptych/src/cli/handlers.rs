//! Command handlers printing JSON to stdout.

use super::{AppContext, ArtifactCommands, BatchCommands, RunCommands, TopicCommands};
use diptych::{
    ArtifactPatch, DiptychConfig, DiptychResult, JsonError, JsonMap, NewTopic, TopicFilter,
    TopicPatch, ValidationError, ValidationErrorKind, establish_connection, run_migrations,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use uuid::Uuid;

fn print_json<T: Serialize>(value: &T) -> DiptychResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| JsonError::new(format!("Failed to serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

async fn read_input(path: &Path) -> DiptychResult<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ValidationError::new(ValidationErrorKind::InvalidField {
            field: path.display().to_string(),
            reason: e.to_string(),
        })
        .into()
    })
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> DiptychResult<T> {
    let text = read_input(path).await?;
    serde_json::from_str(&text).map_err(|e| {
        JsonError::new(format!("Failed to parse {}: {}", path.display(), e)).into()
    })
}

/// Apply pending migrations and list the ones applied.
pub fn handle_migrate(config: &DiptychConfig) -> DiptychResult<()> {
    let mut conn = establish_connection(config.database_url()?)?;
    let applied = run_migrations(&mut conn)?;
    tracing::info!(count = applied.len(), "Migrations applied");
    print_json(&serde_json::json!({ "applied": applied }))
}

/// Handle `diptych topic ...`.
pub async fn handle_topic_command(ctx: &AppContext, cmd: TopicCommands) -> DiptychResult<()> {
    match cmd {
        TopicCommands::Create { file } => {
            let new: NewTopic = read_json(&file).await?;
            print_json(&ctx.service.create_topic(new).await?)
        }
        TopicCommands::List {
            slug,
            limit,
            offset,
        } => {
            let mut filter = TopicFilter::new().with_limit(limit).with_offset(offset);
            if let Some(slug) = slug {
                filter = filter.with_slug(slug);
            }
            print_json(&ctx.service.list_topics(&filter).await?)
        }
        TopicCommands::Show { id } => print_json(&ctx.service.get_topic(id).await?),
        TopicCommands::Patch { id, file } => {
            let patch: TopicPatch = read_json(&file).await?;
            print_json(&ctx.service.update_topic(id, patch).await?)
        }
        TopicCommands::Delete { id } => {
            ctx.service.delete_topic(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

/// Handle `diptych run ...`.
pub async fn handle_run_command(ctx: &AppContext, cmd: RunCommands) -> DiptychResult<()> {
    match cmd {
        RunCommands::Create { topic_id, model } => {
            print_json(&ctx.service.create_run(topic_id, model).await?)
        }
        RunCommands::Show { id } => print_json(&ctx.service.get_run(id).await?),
        RunCommands::Execute { id } => {
            let outcome = ctx.executor()?.execute(id).await?;
            if outcome.is_skipped() {
                tracing::info!(run_id = %id, "Run was not queued; nothing executed");
            }
            print_json(outcome.run())
        }
        RunCommands::Artifacts { id } => print_json(&ctx.service.run_artifacts(id).await?),
    }
}

/// Handle `diptych artifact ...`.
pub async fn handle_artifact_command(ctx: &AppContext, cmd: ArtifactCommands) -> DiptychResult<()> {
    match cmd {
        ArtifactCommands::Show { id } => print_json(&ctx.service.get_artifact(id).await?),
        ArtifactCommands::Review {
            id,
            reject,
            notes,
            clear_notes,
        } => {
            let review_notes = if clear_notes {
                Some(None)
            } else {
                notes.map(Some)
            };
            let patch = ArtifactPatch {
                reviewed: Some(!reject),
                review_notes,
                ..ArtifactPatch::default()
            };
            print_json(&ctx.service.update_artifact(id, patch).await?)
        }
        ArtifactCommands::Edit {
            id,
            body,
            frontmatter,
        } => {
            let body = match body {
                Some(path) => Some(read_input(&path).await?),
                None => None,
            };
            let frontmatter: Option<JsonMap> = match frontmatter {
                Some(path) => Some(read_json(&path).await?),
                None => None,
            };
            let patch = ArtifactPatch {
                frontmatter,
                body,
                ..ArtifactPatch::default()
            };
            print_json(&ctx.service.update_artifact(id, patch).await?)
        }
    }
}

/// Handle `diptych batch ...`.
pub async fn handle_batch_command(ctx: &AppContext, cmd: BatchCommands) -> DiptychResult<()> {
    match cmd {
        BatchCommands::Create { topic_ids, model } => {
            print_json(&ctx.service.create_batch(&topic_ids, model.as_deref()).await?)
        }
        BatchCommands::Show { id } => print_json(&ctx.service.get_batch(id).await?),
        BatchCommands::Poll { id, now: false } => print_json(&ctx.service.poll_batch(id).await?),
        BatchCommands::Poll { id, now: true } => {
            let reconciliation = ctx.reconciler()?.reconcile(id).await?;
            print_json(reconciliation.snapshot())
        }
    }
}

/// Handle `diptych export <run_id>`.
pub async fn handle_export(ctx: &AppContext, run_id: Uuid) -> DiptychResult<()> {
    print_json(&ctx.service.export_run(run_id).await?)
}
