//! kakeibo - Receipt scanning, item tagging, and AI-written monthly reviews
//!
//! Entry point for the kakeibo CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use kakeibo::cli::{commands, Cli, Commands};
use kakeibo::config::Settings;
use kakeibo::pipeline::RunOptions;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine, a broken one is worth a warning once logging is up
    let dotenv_error = match dotenvy::dotenv() {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    };

    // Parse CLI arguments
    let cli = Cli::parse();

    // Config errors only matter to commands that need settings
    let settings = Settings::load();

    // Initialize logging
    let default_level = match (&settings, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(settings), false) => settings.general.log_level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level)),
        );

    // Only commands that work on the ledger leave a run log behind
    let (run_log, _run_log_guard) = match (&settings, cli.command.writes_run_log()) {
        (Ok(settings), true) if settings.general.log_to_file => match open_run_log(settings) {
            Ok((writer, guard)) => (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(EnvFilter::new(&settings.general.file_log_level)),
                ),
                Some(guard),
            ),
            Err(e) => {
                eprintln!("Run log disabled: {:#}", e);
                (None, None)
            }
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(run_log)
        .init();

    if let Some(e) = dotenv_error {
        tracing::warn!("Ignoring unreadable .env file: {}", e);
    }

    match cli.command {
        Commands::Completions { shell } => {
            kakeibo::cli::completions::print(shell);
        }
        Commands::Tags => {
            commands::list_tags();
        }
        Commands::Validate {
            schema,
            file,
            expected,
        } => {
            commands::validate_file(schema, &file, expected)?;
        }
        command => {
            let settings = settings?;

            match command {
                Commands::Run {
                    skip_summary,
                    skip_graph,
                } => {
                    commands::run(
                        &settings,
                        RunOptions {
                            skip_summary,
                            skip_graph,
                        },
                    )
                    .await?;
                }
                Commands::Process { file } => {
                    commands::process_file(&settings, &file).await?;
                }
                Commands::Summarize { year, month } => {
                    commands::summarize(&settings, year, month).await?;
                }
                Commands::Tag { file } => {
                    commands::tag_file(&settings, &file).await?;
                }
                Commands::Months => {
                    commands::list_months(&settings)?;
                }
                Commands::Report { year, month } => {
                    commands::report(&settings, year, month)?;
                }
                Commands::Config(config_cmd) => {
                    commands::config_command(&settings, config_cmd)?;
                }
                Commands::Completions { .. } | Commands::Tags | Commands::Validate { .. } => {
                    unreachable!()
                }
            }
        }
    }

    Ok(())
}

/// Open `<log_dir>/<YYYYMMDD_HHMMSS>.log` behind a non-blocking writer
fn open_run_log(
    settings: &Settings,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = settings.log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let path = dir.join(format!("{}.log", chrono::Local::now().format("%Y%m%d_%H%M%S")));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    Ok(tracing_appender::non_blocking(file))
}
