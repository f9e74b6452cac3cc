//! Diptych CLI binary.
//!
//! This binary provides command-line access to the content pipeline:
//! - Manage topics and review artifacts
//! - Queue or execute generation runs and batch jobs
//! - Export reviewed runs as MDX
//! - Run background workers

use clap::Parser;
use diptych::{DiptychConfig, DiptychError, DiptychResult, ErrorClass, init_tracing};
use std::process::ExitCode;

mod cli;

fn exit_code(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::NotFound => 3,
        ErrorClass::Validation => 4,
        ErrorClass::Conflict => 5,
        ErrorClass::GateBlocked => 6,
        ErrorClass::Provider | ErrorClass::MalformedOutput => 7,
        ErrorClass::Configuration => 78,
        ErrorClass::Storage => 74,
    }
}

async fn dispatch(cli: cli::Cli, config: DiptychConfig) -> DiptychResult<()> {
    use cli::{
        AppContext, Commands, handle_artifact_command, handle_batch_command, handle_export,
        handle_migrate, handle_run_command, handle_topic_command, run_workers,
    };

    if let Commands::Migrate = cli.command {
        return handle_migrate(&config);
    }

    let ctx = AppContext::connect(config)?;
    match cli.command {
        Commands::Migrate => Ok(()),
        Commands::Topic(cmd) => handle_topic_command(&ctx, cmd).await,
        Commands::Run(cmd) => handle_run_command(&ctx, cmd).await,
        Commands::Artifact(cmd) => handle_artifact_command(&ctx, cmd).await,
        Commands::Batch(cmd) => handle_batch_command(&ctx, cmd).await,
        Commands::Export { run_id } => handle_export(&ctx, run_id).await,
        Commands::Worker { concurrency, drain } => run_workers(&ctx, concurrency, drain).await,
    }
}

fn report(err: &DiptychError) -> ExitCode {
    tracing::debug!(error = %err, "Command failed");
    eprintln!("error[{}]: {}", err.class(), err.summary());
    ExitCode::from(exit_code(err.class()))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = cli::Cli::parse();

    let config = match DiptychConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(&e),
    };

    // Initialize tracing
    if let Err(e) = init_tracing(&config.logging, cli.verbose) {
        return report(&e);
    }

    // Execute the requested command
    match dispatch(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}
