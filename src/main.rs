//! Recap CLI entry point.

use anyhow::Result;
use clap::Parser;
use recap::cli::{commands, Cli, Commands};
use recap::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("recap={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.work_dir())?;

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings).await?;
        }

        Commands::Add {
            url,
            source,
            title,
            duration,
        } => {
            commands::run_add(url, source.clone(), title.clone(), *duration, &settings).await?;
        }

        Commands::Process { id, once, json } => {
            commands::run_process(id, *once, *json, settings).await?;
        }

        Commands::Run { limit, concurrency } => {
            commands::run_pending(*limit, *concurrency, settings).await?;
        }

        Commands::Reprocess { id, json } => {
            commands::run_reprocess(id, *json, settings).await?;
        }

        Commands::Status { id, json } => {
            commands::run_status(id, *json, &settings).await?;
        }

        Commands::List { status, limit } => {
            commands::run_list(status.as_deref(), *limit, &settings).await?;
        }

        Commands::Delete { id, purge } => {
            commands::run_delete(id, *purge, &settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, cli.config.as_ref().map(std::path::PathBuf::from), settings)?;
        }
    }

    Ok(())
}
