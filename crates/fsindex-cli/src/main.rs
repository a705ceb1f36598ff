//! fsindex CLI
//!
//! Command-line interface for running scan passes, preparing the search
//! engine and inspecting configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsindex_core::{IndexerConfig, PidLock, RunSummary, ScanOrchestrator};
use fsindex_indexer::ExclusionMatcher;
use fsindex_sync::{retry_with_backoff, BatchSyncClient, MemoryClient, RetryPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fsindex")]
#[command(about = "fsindex - Keep a search engine index in sync with directory trees")]
#[command(version)]
struct Cli {
    /// Config file (default: platform config dir, then environment overrides)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan pass
    Scan {
        /// Scan against an in-memory engine instead of the configured one
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Wait for the engine to come up and create the index
    Bootstrap {
        /// Number of attempts before giving up
        #[arg(long, default_value_t = 30)]
        attempts: u32,

        /// Seconds between attempts
        #[arg(long, default_value_t = 2)]
        delay_secs: u64,
    },

    /// Show whether root-relative paths are excluded
    Check {
        /// Paths relative to a scan root
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config =
        IndexerConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Scan { dry_run, json } => cmd_scan(&config, dry_run, json).await,
        Commands::Bootstrap {
            attempts,
            delay_secs,
        } => cmd_bootstrap(&config, attempts, delay_secs).await,
        Commands::Check { paths } => cmd_check(&config, &paths),
        Commands::Config => cmd_config(&config),
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_logging(config: &IndexerConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn cmd_scan(config: &IndexerConfig, dry_run: bool, json: bool) -> Result<()> {
    // A dry run never writes to the engine, so it cannot race a real pass.
    let _lock = if dry_run {
        None
    } else {
        Some(PidLock::acquire(&config.pid_file)?)
    };
    init_logging(config);

    let client: Arc<dyn BatchSyncClient> = if dry_run {
        Arc::new(MemoryClient::new())
    } else {
        fsindex_core::connect(&config.engine).context("Failed to create engine client")?
    };

    let mut orchestrator = ScanOrchestrator::prepare(config, client)
        .await
        .context("Failed to prepare scan")?;
    let summary = orchestrator.run().await.context("Scan pass failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, dry_run);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    if dry_run {
        println!("✓ Dry run complete (nothing was written to the engine)");
    } else {
        println!("✓ Scan complete");
    }
    println!("  Scan ID:    {}", summary.scan_id);
    println!("  Duration:   {:.2}s", summary.duration_secs);
    println!("  Scanned:    {}", summary.files_scanned);
    println!("  Skipped:    {}", summary.files_skipped);
    println!("  Indexed:    {} ({} batches)", summary.files_indexed, summary.batches);
    println!("  Deleted:    {}", summary.files_deleted);
    println!("  Errors:     {}", summary.errors);
    println!("  Throughput: {:.1} files/s", summary.files_per_sec);
}

async fn cmd_bootstrap(config: &IndexerConfig, attempts: u32, delay_secs: u64) -> Result<()> {
    init_logging(config);

    let client = fsindex_core::connect(&config.engine).context("Failed to create engine client")?;
    let policy = RetryPolicy::fixed(attempts.max(1), Duration::from_secs(delay_secs));

    println!(
        "Waiting for {} at {} ...",
        config.engine.backend, config.engine.url
    );
    retry_with_backoff(&policy, "bootstrap", || client.ensure_schema(), |_| true)
        .await
        .with_context(|| format!("Engine not ready after {} attempts", policy.max_attempts))?;

    println!("✓ Index '{}' is ready", config.engine.index);
    Ok(())
}

fn cmd_check(config: &IndexerConfig, paths: &[String]) -> Result<()> {
    let matcher = ExclusionMatcher::from_file(&config.excludes_file).with_context(|| {
        format!(
            "Failed to load exclusion patterns from {}",
            config.excludes_file.display()
        )
    })?;

    println!(
        "{} pattern(s) from {}",
        matcher.len(),
        config.excludes_file.display()
    );
    for path in paths {
        let relative = path.trim_start_matches("./");
        let verdict = if matcher.is_excluded(relative) {
            "excluded"
        } else {
            "included"
        };
        println!("{verdict:>8}  {path}");
    }
    Ok(())
}

fn cmd_config(config: &IndexerConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(&config.redacted()).context("Failed to render config")?;
    print!("{yaml}");
    Ok(())
}
