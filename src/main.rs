//! Cardeals main entry point
//!
//! This is the command-line interface for the Cardeals listings scraper.

use anyhow::Context;
use cardeals::config::{load_config_with_hash, Config};
use cardeals::crawler::scrape;
use cardeals::output::{summarize, write_output};
use cardeals::storage::{CarStatus, RunStatus, SqliteStorage, Storage};
use cardeals::{EngineType, FilterConfig, GearboxType, ScrapeError, ScrapeOutcome, StopReason};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Cardeals: a car-listings scraper
///
/// Searches a car marketplace with the given filters, follows the result
/// pages and prints every listing as JSON.
#[derive(Parser, Debug)]
#[command(name = "cardeals")]
#[command(version)]
#[command(about = "Scrape car listings into JSON", long_about = None)]
struct Cli {
    /// Car brand, e.g. "Mercedes"
    #[arg(long, required_unless_present_any = ["clear_db", "print_db"])]
    brand: Option<String>,

    /// Car model, e.g. "GLC"
    #[arg(long, required_unless_present_any = ["clear_db", "print_db"])]
    model: Option<String>,

    /// Minimum manufacturing year
    #[arg(long)]
    year_start: Option<u16>,

    /// Maximum price in EUR
    #[arg(long)]
    price_max: Option<u32>,

    /// Maximum mileage in km
    #[arg(long)]
    km_max: Option<u32>,

    /// petrol, diesel, hybrid or electric
    #[arg(long)]
    engine_type: Option<EngineType>,

    /// manual or automatic
    #[arg(long)]
    gearbox_type: Option<GearboxType>,

    /// Maximum number of result pages to fetch [default: 10]
    #[arg(long)]
    max_pages: Option<u32>,

    /// Write JSON to this file instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Store results in the local database and mark vanished listings
    #[arg(long, conflicts_with_all = ["clear_db", "print_db"])]
    use_db: bool,

    /// Delete everything in the local database and exit
    #[arg(long, conflicts_with = "print_db")]
    clear_db: bool,

    /// Print all stored cars as JSON and exit (no scraping)
    #[arg(long)]
    print_db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?;
            tracing::debug!("Configuration loaded (hash: {})", hash);
            (config, hash)
        }
        None => (Config::default(), String::new()),
    };

    if cli.clear_db {
        handle_clear_db(&config)
    } else if cli.print_db {
        handle_print_db(&config, cli.output.as_deref())
    } else {
        let filters = build_filters(&cli, &config)?;
        handle_scrape(&cli, &config, &config_hash, &filters).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so JSON on stdout stays machine-readable.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("cardeals=info,warn"),
            1 => EnvFilter::new("cardeals=debug,info"),
            2 => EnvFilter::new("cardeals=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_filters(cli: &Cli, config: &Config) -> anyhow::Result<FilterConfig> {
    let brand = cli.brand.clone().context("--brand is required")?;
    let model = cli.model.clone().context("--model is required")?;

    let mut filters = FilterConfig::new(brand, model);
    filters.year_start = cli.year_start;
    filters.price_max = cli.price_max;
    filters.km_max = cli.km_max;
    filters.engine_type = cli.engine_type;
    filters.gearbox_type = cli.gearbox_type;
    filters.max_pages = cli.max_pages.unwrap_or(config.scrape.max_pages);
    Ok(filters)
}

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.output.database_path);
    SqliteStorage::new(path).with_context(|| format!("failed to open database {}", path.display()))
}

/// Handles the --clear-db mode
fn handle_clear_db(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    storage.clear()?;
    tracing::info!("Cleared database {}", config.output.database_path);
    Ok(())
}

/// Handles the --print-db mode: prints stored cars with their status
fn handle_print_db(config: &Config, output: Option<&Path>) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let cars = storage.all_cars()?;
    tracing::info!(
        "{} cars in database ({} active, {} removed)",
        cars.len(),
        storage.count_cars_by_status(CarStatus::Active)?,
        storage.count_cars_by_status(CarStatus::Removed)?
    );
    match storage.get_latest_run()? {
        Some(run) => tracing::info!("Latest {}", run.summary()),
        None => tracing::info!("No runs recorded yet"),
    }
    write_output(&cars, output)?;
    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(
    cli: &Cli,
    config: &Config,
    config_hash: &str,
    filters: &FilterConfig,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            ctrl_c.cancel();
        }
    });

    let mut storage = if cli.use_db {
        let mut storage = open_storage(config)?;
        let run_id = storage.create_run(config_hash, &filters.query_key())?;
        Some((storage, run_id))
    } else {
        None
    };

    let outcome = match scrape(config, filters, cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let storage = storage.as_mut().map(|(storage, run_id)| (storage, *run_id));
            return Err(fail_scrape(storage, filters, e));
        }
    };

    if let StopReason::PageFailed { page, reason } = &outcome.stop_reason {
        tracing::warn!(
            "Partial results for {}: stopped at page {} ({})",
            filters.describe(),
            page,
            reason
        );
    }

    write_output(&outcome.records, cli.output.as_deref())?;

    if let Some((storage, run_id)) = storage.as_mut() {
        persist_outcome(storage, *run_id, filters, &outcome)?;
    }

    tracing::info!("{}", summarize(&outcome));
    Ok(())
}

/// Reports a fatal scrape and marks its run failed
///
/// A storage error while recording the failure is logged; the returned error
/// is always the scrape error.
fn fail_scrape<S: Storage>(
    storage: Option<(&mut S, i64)>,
    filters: &FilterConfig,
    error: ScrapeError,
) -> anyhow::Error {
    tracing::error!("Scrape failed for {}: {}", filters.describe(), error);
    if let Some((storage, run_id)) = storage {
        if let Err(db_error) = storage.finish_run(run_id, RunStatus::Failed, 0, 0) {
            tracing::error!("Could not record failed run {}: {}", run_id, db_error);
        }
    }
    anyhow::Error::new(error).context(format!("scrape failed for {}", filters.describe()))
}

/// Stores a finished run; removals are only detected after an exhausted run
fn persist_outcome(
    storage: &mut SqliteStorage,
    run_id: i64,
    filters: &FilterConfig,
    outcome: &ScrapeOutcome,
) -> anyhow::Result<()> {
    let query = filters.query_key();
    let new_cars = storage.upsert_cars(&outcome.records, &query, run_id)?;

    let removed = if outcome.stop_reason == StopReason::Exhausted {
        storage.mark_removed(&query, run_id)?
    } else {
        0
    };

    storage.finish_run(
        run_id,
        RunStatus::from_stop_reason(&outcome.stop_reason),
        outcome.pages_fetched,
        outcome.records.len(),
    )?;

    tracing::info!(
        "[DB] Stored {} cars ({} new), marked {} as removed",
        outcome.records.len(),
        new_cars,
        removed
    );
    Ok(())
}
