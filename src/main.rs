//! CLI entry point for the transit scoring and analytics engine.
//!
//! Loads routes and reports from a JSON dataset and runs one analytics query
//! per invocation, or keeps the score scheduler running until Ctrl+C.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc, Weekday};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_pulse::analytics::types::{AlternativeFilter, TravelContext, TrendPeriod};
use transit_pulse::config::EngineConfig;
use transit_pulse::models::parse_hh_mm;
use transit_pulse::output::{append_scores, efficiency_grade, print_json, score_grade};
use transit_pulse::scheduler::IntervalTicker;
use transit_pulse::store::{Dataset, MemoryStore};
use transit_pulse::{Collaborators, Engine};

#[derive(Parser)]
#[command(name = "transit_pulse")]
#[command(about = "Route scoring and analytics from crowd-sourced transit reports", long_about = None)]
struct Cli {
    /// JSON dataset with `routes` and `reports` (overrides TRANSIT_DATA_PATH)
    #[arg(short, long, global = true)]
    data: Option<String>,

    /// Maximum number of routes evaluated concurrently (overrides ANALYTICS_CONCURRENCY)
    #[arg(short, long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and store the composite score of one route
    Score { route_id: String },
    /// Recompute scores for every active route
    Recompute {
        /// CSV file to append the resulting scores to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Multi-factor efficiency score for one route
    Efficiency { route_id: String },
    /// Predict travel time between two stops of a route
    Predict {
        route_id: String,
        from_stop: String,
        to_stop: String,

        /// Departure time as HH:MM
        #[arg(short, long)]
        time: Option<String>,

        /// Day of travel (e.g. "sat")
        #[arg(short, long)]
        weekday: Option<Weekday>,
    },
    /// Rank routes connecting two stops
    Alternatives {
        from_stop: String,
        to_stop: String,

        /// Maximum travel time in minutes
        #[arg(long)]
        max_time: Option<u32>,

        /// Maximum fare
        #[arg(long)]
        max_cost: Option<f64>,
    },
    /// Compare the latest window against the one before it
    Trend {
        route_id: String,

        /// daily, weekly or monthly
        #[arg(default_value = "weekly")]
        period: TrendPeriod,
    },
    /// Forecast demand for a route at an RFC 3339 time slot
    Forecast {
        route_id: String,
        time_slot: DateTime<Utc>,
    },
    /// Recommend routes for a user
    Recommend {
        user_id: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Run the score scheduler until Ctrl+C
    Run {
        /// Seconds between passes (overrides SCORE_INTERVAL_SECS)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_pulse.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_pulse.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.max(1);
    }

    let dataset = Dataset::load(&config.data_path)?;
    info!(
        path = %config.data_path,
        routes = dataset.routes.len(),
        reports = dataset.reports.len(),
        "Dataset loaded"
    );
    let store = Arc::new(MemoryStore::from_dataset(dataset));
    let engine = Engine::new(Collaborators::from_store(store), &config);

    match cli.command {
        Commands::Score { route_id } => {
            let record = engine.compute_score(&route_id).await?;
            info!(route_id = %record.route_id, grade = %score_grade(&record), "Score computed");
            print_json(&record)?;
        }
        Commands::Recompute { output } => {
            let records = engine.recompute_all_scores().await?;
            for record in &records {
                info!(
                    route_id = %record.route_id,
                    overall = record.overall,
                    grade = %score_grade(record),
                    "Route score"
                );
            }
            if let Some(path) = output {
                append_scores(&path, &records)?;
                info!(path = %path, rows = records.len(), "Scores written");
            }
        }
        Commands::Efficiency { route_id } => {
            let efficiency = engine.get_efficiency(&route_id).await?;
            info!(
                route_id = %efficiency.route_id,
                grade = %efficiency_grade(efficiency.efficiency_score),
                "Efficiency computed"
            );
            print_json(&efficiency)?;
        }
        Commands::Predict {
            route_id,
            from_stop,
            to_stop,
            time,
            weekday,
        } => {
            let time_of_day = time
                .map(|t| parse_hh_mm(&t).with_context(|| format!("invalid time '{t}', expected HH:MM")))
                .transpose()?;
            let ctx = TravelContext {
                time_of_day,
                weekday,
            };
            let prediction = engine
                .predict_travel_time(&route_id, &from_stop, &to_stop, ctx)
                .await?;
            print_json(&prediction)?;
        }
        Commands::Alternatives {
            from_stop,
            to_stop,
            max_time,
            max_cost,
        } => {
            let filter = AlternativeFilter { max_time, max_cost };
            let alternatives = engine.find_alternatives(&from_stop, &to_stop, filter).await?;
            print_json(&alternatives)?;
        }
        Commands::Trend { route_id, period } => {
            let trend = engine.analyze_trend(&route_id, period).await?;
            print_json(&trend)?;
        }
        Commands::Forecast {
            route_id,
            time_slot,
        } => {
            let forecast = engine.forecast_demand(&route_id, time_slot).await?;
            print_json(&forecast)?;
        }
        Commands::Recommend { user_id, limit } => {
            let recommendation = engine.recommend(&user_id, limit).await?;
            print_json(&recommendation)?;
        }
        Commands::Run { interval } => {
            let period = interval
                .map(Duration::from_secs)
                .unwrap_or(config.score_interval);
            if period.is_zero() {
                anyhow::bail!("scheduler interval must be greater than zero");
            }
            let scheduler = engine.scheduler();

            info!(interval_secs = period.as_secs(), "Starting score scheduler. Press Ctrl+C to stop.");
            scheduler.start(IntervalTicker::new(period)).await;

            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
            scheduler.stop().await;

            let scores = engine.list_scores().await?;
            info!(routes = scores.len(), "Scheduler stopped");
        }
    }

    Ok(())
}
