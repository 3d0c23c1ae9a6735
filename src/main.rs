use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod axis;
mod buckets;
mod catalog;
mod config;
mod db;
mod error;
mod insights;
mod models;
mod percentile;
mod report;
mod risk;
mod score;
mod stats;
mod tracker;
mod trend;

use buckets::Granularity;
use config::AppConfig;
use models::{SourceContribution, Submission, TrackerKind};
use tracker::{Tracker, Trackers};

#[derive(Parser)]
#[command(name = "exposure-tracker")]
#[command(about = "Weekly microplastic and PFAS exposure tracker", long_about = None)]
struct Cli {
    /// TOML file selecting catalogs, risk bands and stats policy
    #[arg(long, global = true, env = "EXPOSURE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo entries
    Seed,
    /// Import weekly counts from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum)]
        tracker: TrackerKind,
        #[arg(long)]
        user: String,
    },
    /// Import entries saved in guest mode (once per user)
    ImportGuest {
        /// JSON export with `microplastic` and `pfas` entry arrays
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Score a week of counts and store it
    Submit {
        #[arg(long, value_enum)]
        tracker: TrackerKind,
        #[arg(long)]
        user: String,
        /// Any day of the reported week; defaults to today
        #[arg(long)]
        week: Option<NaiveDate>,
        /// Source count as KEY=VALUE, repeatable
        #[arg(long = "count", value_parser = parse_count)]
        counts: Vec<(String, f64)>,
    },
    /// Score a week of counts without storing it
    Calc {
        #[arg(long, value_enum)]
        tracker: TrackerKind,
        #[arg(long = "count", value_parser = parse_count)]
        counts: Vec<(String, f64)>,
    },
    /// Show the bucketed trend for a user
    Trends {
        #[arg(long, value_enum)]
        tracker: TrackerKind,
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value_t = Granularity::Medium)]
        granularity: Granularity,
    },
    /// Show dashboard stats for a user
    Stats {
        #[arg(long, value_enum)]
        tracker: TrackerKind,
        #[arg(long)]
        user: String,
    },
    /// Rank a user's latest score against everyone else's
    Percentile {
        #[arg(long, value_enum)]
        tracker: TrackerKind,
        #[arg(long)]
        user: String,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, value_enum)]
        tracker: TrackerKind,
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value_t = Granularity::Medium)]
        granularity: Granularity,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_count(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let count = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("count for '{key}' is not a number"))?;
    if !count.is_finite() {
        return Err(format!("count for '{key}' must be finite"));
    }
    Ok((key.trim().to_string(), count))
}

fn submission(week: NaiveDate, counts: Vec<(String, f64)>) -> Submission {
    Submission {
        week_start: week,
        created_at: None,
        id: None,
        counts: counts
            .into_iter()
            .map(|(key, count)| (key, serde_json::Value::from(count)))
            .collect(),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("exposure_tracker={level},sqlx=warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn print_breakdown(tracker: &Tracker, breakdown: &[SourceContribution]) {
    for source in breakdown.iter().filter(|source| source.count > 0.0) {
        println!(
            "- {}: {} x -> {} {} ({}%)",
            source.label,
            source.count,
            source.contribution,
            tracker.kind.unit(),
            source.percentage
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let app_config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let trackers = Trackers::from_config(&app_config).context("invalid catalog or risk bands")?;
    debug!("exposure-tracker v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&connect().await?, &trackers).await?;
            println!("Seed data inserted ({inserted} new entries).");
        }
        Commands::Import { csv, tracker, user } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &trackers, tracker, &user, &csv).await?;
            println!("Inserted {inserted} {tracker} entries from {}.", csv.display());
        }
        Commands::ImportGuest { file, user } => {
            let pool = connect().await?;
            match db::import_guest(&pool, &trackers, &user, &file).await? {
                db::GuestImportOutcome::Imported(count) => {
                    println!("Imported {count} guest entries for {user}.")
                }
                db::GuestImportOutcome::AlreadyImported => {
                    println!("Guest data for {user} was already imported; nothing to do.")
                }
            }
        }
        Commands::Submit {
            tracker,
            user,
            week,
            counts,
        } => {
            let pool = connect().await?;
            let tracker = trackers.get(tracker);
            let week = week.unwrap_or_else(|| Local::now().date_naive());
            let entry = tracker.record(&submission(week, counts), Utc::now())?;
            db::insert_entry(&pool, &user, &entry, None).await?;
            let breakdown = tracker.breakdown(&entry);

            if cli.json {
                print_json(&serde_json::json!({
                    "entry": entry,
                    "sources": breakdown,
                }))?;
            } else {
                println!(
                    "Week of {}: {} {} ({})",
                    entry.week_start,
                    entry.total_score,
                    tracker.kind.unit(),
                    entry.risk_tier
                );
                print_breakdown(tracker, &breakdown);
            }
        }
        Commands::Calc { tracker, counts } => {
            let tracker = trackers.get(tracker);
            let entry = tracker.record(&submission(Local::now().date_naive(), counts), Utc::now())?;
            let breakdown = tracker.breakdown(&entry);

            if cli.json {
                print_json(&serde_json::json!({
                    "totalScore": entry.total_score,
                    "riskTier": entry.risk_tier,
                    "sources": breakdown,
                }))?;
            } else {
                println!("Total: {} {} ({})", entry.total_score, tracker.kind.unit(), entry.risk_tier);
                print_breakdown(tracker, &breakdown);
            }
        }
        Commands::Trends {
            tracker,
            user,
            granularity,
        } => {
            let pool = connect().await?;
            let entries = db::fetch_entries(&pool, &user, tracker).await?;
            let tracker = trackers.get(tracker);
            let series = tracker.trends(&entries, granularity, Local::now().naive_local(), &Local)?;

            if cli.json {
                print_json(&series)?;
            } else if series.points.is_empty() {
                println!("No entries in this window.");
            } else {
                for (point, fitted) in series.points.iter().zip(series.fitted.iter()) {
                    println!(
                        "- {}: mean {:.3} across {} entries (trend {:.3})",
                        point.label, point.mean, point.sample_count, fitted
                    );
                }
                println!("Chart range: 0 to {:.2} {}", series.display_range.1, tracker.kind.unit());
            }
        }
        Commands::Stats { tracker, user } => {
            let pool = connect().await?;
            let entries = db::fetch_entries(&pool, &user, tracker).await?;
            let tracker = trackers.get(tracker);
            let stats = tracker.stats(&entries, Utc::now(), &app_config.stats);

            if cli.json {
                print_json(&stats)?;
            } else {
                let unit = tracker.kind.unit();
                println!("Current level: {} ({} {})", stats.current_risk_tier, stats.current_score, unit);
                println!("Weekly intake: {} {}", stats.weekly_intake, unit);
                println!("Monthly average: {} {}", stats.monthly_average, unit);
                println!("Change vs last week: {:+.2}%", stats.weekly_change_percent);
                println!("Data completeness: {}%", stats.data_completeness_percent);
                println!("Entries: {}", stats.total_entries);
            }
        }
        Commands::Percentile { tracker, user } => {
            let pool = connect().await?;
            let entries = db::fetch_entries(&pool, &user, tracker).await?;
            let Some(latest) = entries.first() else {
                println!("No entries for {user} yet.");
                return Ok(());
            };
            let histogram = db::fetch_population_histogram(&pool, tracker).await?;
            let rank = trackers.get(tracker).percentile(latest.total_score, &histogram)?;
            let total: i64 = histogram.iter().map(|bin| bin.count).sum();

            if cli.json {
                print_json(&serde_json::json!({
                    "percentile": rank,
                    "userValue": latest.total_score,
                    "totalCount": total,
                }))?;
            } else {
                match rank {
                    Some(rank) => println!(
                        "{user} is at the {rank}th percentile of {total} users (lower is better)."
                    ),
                    None => println!("Not enough population data yet."),
                }
            }
        }
        Commands::Report {
            tracker,
            user,
            granularity,
            out,
        } => {
            let pool = connect().await?;
            let entries = db::fetch_entries(&pool, &user, tracker).await?;
            let histogram = db::fetch_population_histogram(&pool, tracker).await?;
            let tracker = trackers.get(tracker);

            let stats = tracker.stats(&entries, Utc::now(), &app_config.stats);
            let series = tracker.trends(&entries, granularity, Local::now().naive_local(), &Local)?;
            let insights = insights::build_insights(tracker, entries.first(), &stats);
            let goals = insights::build_goals(tracker, &stats);
            let percentile = match entries.first() {
                Some(latest) => tracker.percentile(latest.total_score, &histogram)?,
                None => None,
            };

            let report = report::build_report(
                tracker,
                &report::ReportInput {
                    owner: &user,
                    stats: &stats,
                    series: &series,
                    insights: &insights,
                    goals: &goals,
                    percentile,
                    entries: &entries,
                },
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_counts() {
        assert_eq!(parse_count("bottledWater=10"), Ok(("bottledWater".to_string(), 10.0)));
        assert_eq!(parse_count(" salt = 1.5"), Ok(("salt".to_string(), 1.5)));
        assert!(parse_count("salt").is_err());
        assert!(parse_count("salt=lots").is_err());
        assert!(parse_count("salt=inf").is_err());
        assert!(parse_count("salt=NaN").is_err());
    }

    #[test]
    fn import_guest_reads_file_flag() {
        let cli = Cli::try_parse_from([
            "exposure-tracker",
            "import-guest",
            "--file",
            "guest.json",
            "--user",
            "demo",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::ImportGuest { ref file, .. } if file == &PathBuf::from("guest.json")));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
