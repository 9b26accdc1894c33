//! Product Harvester main entry point
//!
//! This is the command-line interface for the incremental product harvester.

use anyhow::{bail, Context};
use clap::Parser;
use product_harvester::config::{load_config_with_hash, ClassifierKind, Config};
use product_harvester::harvest::run_harvest;
use product_harvester::output::{export_products_json, load_statistics, print_statistics};
use product_harvester::storage::{HarvestArchive, SqliteStorage};
use product_harvester::{normalize_url, Lifecycle, StopReason};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Product Harvester: incremental product-listing harvester
///
/// Discovers pages on one site, keeps only those a classifier judges to be
/// product pages, and stores their details until a target number of new
/// products is reached.
#[derive(Parser, Debug)]
#[command(name = "product-harvester")]
#[command(version)]
#[command(about = "Incremental product-listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also write logs (without colors) to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show per-execution statistics for the configured site and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Write an execution's products as JSON to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,

    /// Execution number to export (defaults to the latest)
    #[arg(long, value_name = "N", requires = "export")]
    execution: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_guard = setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(path) = &cli.export {
        handle_export(&config, path, cli.execution)
    } else {
        let mut lifecycle = Lifecycle::new(config, config_hash, log_guard)?;
        lifecycle.install_signal_handler();
        handle_harvest(&lifecycle).await
    }
}

/// Sets up the tracing subscriber based on verbosity level
///
/// With `log_file`, a second non-ANSI layer writes through a non-blocking
/// appender. The returned guard must outlive all logging.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("product_harvester=info,warn"),
            1 => EnvFilter::new("product_harvester=debug,info"),
            2 => EnvFilter::new("product_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
        return Ok(None);
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("cannot create log directory {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(&directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(Some(guard))
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let root = normalize_url(&config.harvest.root_url)?;

    println!("=== Product Harvester Dry Run ===\n");

    println!("Harvest:");
    println!("  Root URL: {}", root);
    println!("  Target products: {}", config.harvest.target_products);
    println!("  Batch size: {}", config.harvest.batch_size);
    println!("  Concurrent requests: {}", config.harvest.concurrent_requests);
    println!(
        "  Classifier batch size: {}",
        config.harvest.classifier_batch_size
    );

    println!("\nCrawler:");
    println!("  Request delay: {}ms", config.crawler.request_delay);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nClassifier:");
    match config.classifier.kind {
        ClassifierKind::Llm => {
            println!("  Kind: llm");
            println!("  Endpoint: {}", config.classifier.endpoint);
            println!("  Model: {}", config.classifier.model);
            let key_state = match std::env::var(&config.classifier.api_key_env) {
                Ok(key) if !key.trim().is_empty() => "set",
                _ => "NOT SET",
            };
            println!(
                "  API key: ${} ({})",
                config.classifier.api_key_env, key_state
            );
            println!("  Max retries: {}", config.classifier.max_retries);
        }
        ClassifierKind::Keywords => {
            println!("  Kind: keywords");
            println!("  Keywords: {}", config.classifier.keywords.join(", "));
            if !config.classifier.exclude_keywords.is_empty() {
                println!(
                    "  Exclude: {}",
                    config.classifier.exclude_keywords.join(", ")
                );
            }
        }
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Results directory: {}", config.output.results_dir);
    println!("  Dedup across runs: {}", config.output.dedup_across_runs);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows per-execution statistics
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let root = normalize_url(&config.harvest.root_url)?;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, root.as_str())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes one execution's products as JSON
fn handle_export(config: &Config, path: &Path, execution: Option<u32>) -> anyhow::Result<()> {
    let root = normalize_url(&config.harvest.root_url)?;
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    let record = match execution {
        Some(number) => storage.find_execution(root.as_str(), number)?,
        None => storage.latest_execution(root.as_str())?,
    };
    let Some(record) = record else {
        match execution {
            Some(number) => bail!("no execution #{} recorded for {}", number, root),
            None => bail!("no executions recorded for {}", root),
        }
    };

    let exported = export_products_json(&storage, record.id, path)?;
    println!(
        "✓ Exported {} products from execution #{} to {}",
        exported,
        record.execution_number,
        path.display()
    );

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(lifecycle: &Lifecycle) -> anyhow::Result<()> {
    let config = lifecycle.config();
    tracing::info!(
        "Harvesting {} (target {} products, batches of {})",
        config.harvest.root_url,
        config.harvest.target_products,
        config.harvest.batch_size
    );

    let outcome = run_harvest(lifecycle).await;

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    println!("{}", report.summary);
    println!(
        "Results: {} ({} products)",
        report.results_path.display(),
        report.exported
    );

    if let StopReason::StageFailed { stage, message } = &report.summary.stop_reason {
        bail!("harvest stopped in {} stage: {}", stage, message);
    }

    Ok(())
}
