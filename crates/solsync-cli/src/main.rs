//! solsync CLI - capture practice solutions and sync them to GitHub
//!
//! Captures a solution from a file, queues it in the local store, and pushes
//! queued submissions to the configured repository.

mod auth;
mod cli;
mod commands;
mod error;
mod surface;


use std::path::{Path, PathBuf};

use clap::Parser;
use solsync_core::config::SolsyncConfig;
use solsync_core::submissions::SubmissionRepository;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::capture::{run_capture, CaptureArgs};
use crate::commands::common::{load_config, open_repository, resolve_config_path, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::health::run_health;
use crate::commands::list::run_list;
use crate::commands::repos::run_repos;
use crate::commands::retry::run_retry;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "solsync=info"
                    .parse()
                    .map_err(|error| CliError::Config(format!("invalid log filter: {error}")))?,
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config)?;
    let db_path = cli.db_path;

    match cli.command {
        Commands::Config { command } => run_config(command, &config_path)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Auth { command } => run_auth(command, &load_config(&config_path)?).await?,
        Commands::Repos => run_repos(&load_config(&config_path)?).await?,
        Commands::Capture {
            file,
            number,
            slug,
            title,
            difficulty,
            topics,
            lang,
            url,
        } => {
            let (config, repository) = open_context(&config_path, db_path).await?;
            let args = CaptureArgs {
                file,
                number,
                slug,
                title,
                difficulty: difficulty.into(),
                topics,
                lang,
                url,
            };
            run_capture(args, &config, repository).await?;
        }
        Commands::List { status, json } => {
            let (_, repository) = open_context(&config_path, db_path).await?;
            run_list(status.map(Into::into), json, &repository).await?;
        }
        Commands::Retry { id } => {
            let (_, repository) = open_context(&config_path, db_path).await?;
            run_retry(&id, &repository).await?;
        }
        Commands::Sync { offline, json } => {
            let (config, repository) = open_context(&config_path, db_path).await?;
            run_sync(offline, json, &config, repository).await?;
        }
        Commands::Health { json } => {
            let (_, repository) = open_context(&config_path, db_path).await?;
            run_health(json, &repository).await?;
        }
    }

    Ok(())
}

async fn open_context(
    config_path: &Path,
    db_path: Option<PathBuf>,
) -> Result<(SolsyncConfig, SubmissionRepository), CliError> {
    let config = load_config(config_path)?;
    let repository = open_repository(&resolve_db_path(db_path)?, &config).await?;
    Ok((config, repository))
}
