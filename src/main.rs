//! Forecast Tracker CLI
//!
//! Collects each day's forecasts for the configured stations and scores the
//! forecasts whose target date has arrived. Meant to be invoked once a day by
//! an external scheduler.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracker_accuracy::{Bucket, LocationRegistry, ResultsStore, RunMode, RunReport, Summary, Tracker};
use tracker_core::{Config, ConfigError, TrackerError};
use tracker_weather::GridCache;

#[derive(Parser)]
#[command(name = "forecast-tracker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track weather forecast accuracy across lead times", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/forecast-tracker/config.toml)
    #[arg(long, global = true, env = "FORECAST_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the archive, grid cache and results file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and JSON reports
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect today's forecasts, then score forecasts that target today
    Run {
        /// Run date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Re-fetch actuals and replace existing comparisons
        #[arg(long)]
        rescore: bool,
    },

    /// Collect and archive forecasts only
    Collect {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Score archived forecasts only
    Reconcile {
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        rescore: bool,
    },

    /// Print accuracy per lead time and location
    Summary,

    /// List tracked locations
    Locations,

    /// Drop cached NWS grid points so they are resolved again
    RefreshGrid {
        /// Only this location (default: all)
        #[arg(long)]
        location: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracker_core::init_logging(level, cli.json);

    match run_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, TrackerError> {
    let (config, _) = Config::load_validated(cli.config.as_deref(), cli.data_dir.as_deref())?;
    Ok(config)
}

async fn run_cli(cli: Cli) -> Result<(), TrackerError> {
    let config = load_config(&cli)?;
    let today = Local::now().date_naive();

    match &cli.command {
        Commands::Run { date, rescore } => {
            let tracker = Tracker::from_config(config)?;
            let report = tracker
                .run(date.unwrap_or(today), RunMode::Full, *rescore)
                .await?;
            print_report(&report, cli.json)
        }
        Commands::Collect { date } => {
            let tracker = Tracker::from_config(config)?;
            let report = tracker
                .run(date.unwrap_or(today), RunMode::CollectOnly, false)
                .await?;
            print_report(&report, cli.json)
        }
        Commands::Reconcile { date, rescore } => {
            let tracker = Tracker::from_config(config)?;
            let report = tracker
                .run(date.unwrap_or(today), RunMode::ReconcileOnly, *rescore)
                .await?;
            print_report(&report, cli.json)
        }
        Commands::Summary => {
            let results = ResultsStore::load(&config.results_path())?;
            print_summary(&results.summarize(), results.last_updated(), cli.json)
        }
        Commands::Locations => {
            let registry = LocationRegistry::from_config(&config);
            for location in registry.locations() {
                println!(
                    "{:<6} {:>9.4} {:>10.4}  {}",
                    location.id, location.latitude, location.longitude, location.name
                );
            }
            Ok(())
        }
        Commands::RefreshGrid { location } => {
            let mut cache = GridCache::load(&config.grid_cache_path())?;
            match location {
                Some(id) => {
                    if LocationRegistry::from_config(&config).get(id).is_none() {
                        return Err(ConfigError::Invalid(format!("unknown location: {}", id)).into());
                    }
                    if cache.invalidate(id) {
                        println!("Dropped grid point for {}", id);
                    } else {
                        println!("No cached grid point for {}", id);
                    }
                }
                None => {
                    let n = cache.len();
                    cache.clear();
                    println!("Dropped {} cached grid points", n);
                }
            }
            cache.save()?;
            Ok(())
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, TrackerError> {
    serde_json::to_string_pretty(value).map_err(|e| TrackerError::Other(e.into()))
}

fn print_report(report: &RunReport, json: bool) -> Result<(), TrackerError> {
    if json {
        println!("{}", to_json(report)?);
        return Ok(());
    }

    println!("Run {} for {}", report.run_id, report.as_of);
    if let Some(c) = &report.collection {
        println!(
            "  collected: {} records from {} requests ({} fetch failures, {} grid failures)",
            c.counts.archived_records,
            c.counts.archived_items,
            c.counts.fetch_failed,
            c.counts.resolution_failed
        );
        if c.counts.issue_date_mismatch > 0 {
            println!(
                "  skipped: {} requests whose forecast was not issued on {}",
                c.counts.issue_date_mismatch, report.as_of
            );
        }
    }
    if let Some(r) = &report.reconciliation {
        println!(
            "  scored: {} ({} accurate), already scored: {}, awaiting forecast: {}, fetch failures: {}",
            r.counts.matched,
            r.counts.matched_accurate,
            r.counts.already_scored,
            r.counts.no_archived_forecast,
            r.counts.fetch_failed
        );
    }
    if let Some(rate) = report.new_accuracy_rate() {
        println!("  accuracy this run: {:.1}%", rate * 100.0);
    }
    Ok(())
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r * 100.0))
}

fn print_bucket(label: &str, bucket: &Bucket) {
    println!(
        "  {:<12} {:>5} scored  {:>7} accurate  high {:>6}  low {:>6}  precip {:>6}",
        label,
        bucket.scored,
        format_rate(bucket.accuracy_rate),
        format_rate(bucket.temp_high_rate),
        format_rate(bucket.temp_low_rate),
        format_rate(bucket.precipitation_rate)
    );
}

fn print_summary(
    summary: &Summary,
    last_updated: Option<NaiveDate>,
    json: bool,
) -> Result<(), TrackerError> {
    if json {
        println!("{}", to_json(summary)?);
        return Ok(());
    }

    match last_updated {
        Some(d) => println!("Results as of {}", d),
        None => println!("No results yet"),
    }

    print_bucket("overall", &summary.overall);
    println!("By lead time:");
    for (lead, bucket) in &summary.by_lead_time {
        print_bucket(&format!("{} day", lead), bucket);
    }
    println!("By location:");
    for (id, bucket) in &summary.by_location {
        print_bucket(id, bucket);
    }
    Ok(())
}
