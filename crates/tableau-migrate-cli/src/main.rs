//! tableau-migrate CLI - Migrate content between Tableau sites.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tableau_migrate::{
    Config, ContentType, InMemorySite, MigrateError, MigrationResult, Orchestrator,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "tableau-migrate")]
#[command(about = "Migrate content between Tableau sites")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to manifest file for resume capability
    #[arg(long)]
    manifest_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new migration
    Run {
        /// Override the number of items migrated concurrently per batch
        #[arg(long)]
        parallelism: Option<usize>,
    },

    /// Resume a migration from its manifest file
    Resume {
        /// Resume even if the configuration changed since the manifest was written
        #[arg(long)]
        force: bool,
    },

    /// Show what a migration would move, without migrating
    Plan,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?.with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    let source_path = resolve(&cli.config, &config.source.snapshot);
    let destination_path = resolve(&cli.config, &config.destination.snapshot);
    let source = Arc::new(InMemorySite::load(&config.source.site, &source_path)?);

    match cli.command {
        Commands::Plan => {
            print_plan(&config, &source, cli.output_json)?;
        }

        Commands::Run { parallelism } => {
            if let Some(p) = parallelism {
                config.migration.parallelism = Some(p);
                config.validate()?;
            }

            let destination = load_destination(&config, &destination_path)?;
            let cancel_token = setup_signal_handler()?;

            let mut orchestrator = Orchestrator::new(config, source, destination.clone());
            if let Some(ref path) = cli.manifest_file {
                orchestrator = orchestrator.with_manifest_file(path.clone());
            }

            let outcome = orchestrator.run(&cancel_token).await;
            destination.save(&destination_path)?;
            let result = outcome?;

            print_result("Migration completed!", &result, cli.output_json)?;
        }

        Commands::Resume { force } => {
            // Manifest file is required for resume
            let manifest_file = cli.manifest_file.ok_or_else(|| {
                MigrateError::Config("--manifest-file is required for resume".to_string())
            })?;

            if !manifest_file.exists() {
                return Err(MigrateError::Config(format!(
                    "Manifest file not found: {:?}",
                    manifest_file
                )));
            }

            let destination = load_destination(&config, &destination_path)?;
            let cancel_token = setup_signal_handler()?;

            let orchestrator = Orchestrator::new(config, source, destination.clone())
                .with_manifest_file(manifest_file)
                .resume(force)?;

            info!("Resuming from previous manifest");

            let outcome = orchestrator.run(&cancel_token).await;
            destination.save(&destination_path)?;
            let result = outcome?;

            print_result("Migration resumed and completed!", &result, cli.output_json)?;
        }
    }

    Ok(())
}

/// Snapshot paths are relative to the configuration file.
fn resolve(config_path: &Path, snapshot: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if snapshot.is_relative() => dir.join(snapshot),
        _ => snapshot.to_path_buf(),
    }
}

/// The destination starts empty when its snapshot does not exist yet.
fn load_destination(config: &Config, path: &Path) -> Result<Arc<InMemorySite>, MigrateError> {
    let site = if path.exists() {
        InMemorySite::load(&config.destination.site, path)?
    } else {
        info!("No destination snapshot at {:?}, starting empty", path);
        InMemorySite::new(&config.destination.site, Default::default())
    };
    Ok(Arc::new(site))
}

fn print_plan(config: &Config, source: &InMemorySite, json: bool) -> Result<(), MigrateError> {
    let snapshot = source.snapshot();
    let rows: Vec<_> = ContentType::MIGRATION_ORDER
        .iter()
        .map(|&content_type| {
            (
                content_type,
                snapshot.count(content_type),
                config.migration.batch_size_for(content_type),
                config.migration.batch_publishing_enabled(content_type),
            )
        })
        .collect();

    if json {
        let plan: Vec<_> = rows
            .iter()
            .map(|(content_type, items, batch_size, bulk)| {
                serde_json::json!({
                    "content_type": content_type,
                    "items": items,
                    "batch_size": batch_size,
                    "batch_publishing": bulk,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "Migration plan: {} -> {}",
        config.source.site, config.destination.site
    );
    for (content_type, items, batch_size, bulk) in rows {
        println!(
            "  {:<12} {:>6} items  (batch size {}{})",
            content_type.as_str(),
            items,
            batch_size,
            if bulk { ", bulk publish" } else { "" }
        );
    }
    println!("  Parallelism: {}", config.migration.get_parallelism());
    Ok(())
}

fn print_result(
    status_msg: &str,
    result: &MigrationResult,
    json: bool,
) -> Result<(), MigrateError> {
    if json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Status: {}", result.status);
    println!("  Duration: {:.2}s", result.duration_seconds);
    for summary in &result.content_types {
        println!(
            "  {:<12} migrated {}, failed {}, skipped {}, canceled {}",
            summary.content_type.as_str(),
            summary.counts.migrated,
            summary.counts.failed,
            summary.counts.skipped,
            summary.counts.canceled
        );
    }
    if !result.errors.is_empty() {
        println!("  Errors:");
        for error in &result.errors {
            println!("    {}", error);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json keeps stdout parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Cancelling migration...");
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Cancelling migration...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Cancelling migration...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
