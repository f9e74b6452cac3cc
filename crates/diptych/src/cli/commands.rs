//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Diptych - bilingual content generation with review and MDX export
#[derive(Parser, Debug)]
#[command(name = "diptych")]
#[command(about = "Bilingual content generation with review and MDX export", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./diptych.toml when present)
    #[arg(long, global = true, env = "DIPTYCH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Topic management
    #[command(subcommand)]
    Topic(TopicCommands),

    /// Generation runs
    #[command(subcommand)]
    Run(RunCommands),

    /// Artifact review and editing
    #[command(subcommand)]
    Artifact(ArtifactCommands),

    /// Provider batch jobs
    #[command(subcommand)]
    Batch(BatchCommands),

    /// Export a run's artifacts as MDX files
    Export {
        /// Run to export
        run_id: Uuid,
    },

    /// Process background tasks until interrupted
    Worker {
        /// Number of concurrent workers (overrides worker.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Process due tasks once and exit
        #[arg(long)]
        drain: bool,
    },
}

/// Topic subcommands
#[derive(Subcommand, Debug)]
pub enum TopicCommands {
    /// Create a topic from a JSON document
    Create {
        /// Path to the topic JSON (slug, tags, fr, en, context, constraints, author_inputs)
        file: PathBuf,
    },

    /// List topics, newest first
    List {
        /// Exact slug match
        #[arg(long)]
        slug: Option<String>,

        /// Maximum number of topics
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Number of topics to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show one topic
    Show {
        /// Topic id
        id: Uuid,
    },

    /// Replace topic fields from a JSON patch document
    Patch {
        /// Topic id
        id: Uuid,

        /// Path to the patch JSON; absent fields are left unchanged
        file: PathBuf,
    },

    /// Delete a topic with its runs, artifacts and batch items
    Delete {
        /// Topic id
        id: Uuid,
    },
}

/// Run subcommands
#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Queue a run for a topic
    Create {
        /// Topic id
        topic_id: Uuid,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Show one run
    Show {
        /// Run id
        id: Uuid,
    },

    /// Execute a run in the foreground
    Execute {
        /// Run id
        id: Uuid,
    },

    /// List a run's artifacts
    Artifacts {
        /// Run id
        id: Uuid,
    },
}

/// Artifact subcommands
#[derive(Subcommand, Debug)]
pub enum ArtifactCommands {
    /// Show one artifact
    Show {
        /// Artifact id
        id: Uuid,
    },

    /// Record a review decision
    Review {
        /// Artifact id
        id: Uuid,

        /// Mark as not reviewed instead
        #[arg(long)]
        reject: bool,

        /// Review notes
        #[arg(long)]
        notes: Option<String>,

        /// Remove existing review notes
        #[arg(long, conflicts_with = "notes")]
        clear_notes: bool,
    },

    /// Replace the body or frontmatter
    Edit {
        /// Artifact id
        id: Uuid,

        /// File holding the new body
        #[arg(long)]
        body: Option<PathBuf>,

        /// File holding the new frontmatter as a JSON object
        #[arg(long)]
        frontmatter: Option<PathBuf>,
    },
}

/// Batch subcommands
#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Submit a batch job for several topics
    Create {
        /// Topic ids, in submission order
        #[arg(required = true)]
        topic_ids: Vec<Uuid>,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Show a batch with its items
    Show {
        /// Batch id
        id: Uuid,
    },

    /// Reconcile a batch with the provider
    Poll {
        /// Batch id
        id: Uuid,

        /// Reconcile now instead of queueing a task
        #[arg(long)]
        now: bool,
    },
}
