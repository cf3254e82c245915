use budget_tracker::config::{database, settings};
use budget_tracker::core::clock::SystemClock;
use budget_tracker::core::context::AppContext;
use budget_tracker::core::{maintenance, recurring, report};
use budget_tracker::errors::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Maintenance jobs for the budget tracker database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the engine settings file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recompute aggregates and stored history for every budget and income
    Recompute,
    /// Compare stored budget periods with a fresh computation
    Check,
    /// Copy serialized history into budget period rows
    Migrate,
    /// Materialize due recurring transactions for a user
    ProcessRecurring {
        /// User whose templates to expand
        #[arg(long)]
        user: i64,
    },
    /// Print a user's dashboard
    Summary {
        /// User to summarize
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let args = Args::parse();

    // 3. Settings and database
    let settings = settings::load_settings(&args.config)
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    let ctx = AppContext::start(db, settings, Arc::new(SystemClock))?;
    info!(today = %ctx.today(), tz = %ctx.tz(), "Context ready");

    match args.command {
        Command::Recompute => {
            let done = maintenance::recompute_all(&ctx).await?;
            println!(
                "Historical data recomputed for {} budgets and {} incomes.",
                done.budgets, done.incomes
            );
        }
        Command::Check => {
            let issues = maintenance::check_integrity(&ctx).await?;
            if issues.is_empty() {
                println!("All budget period records are correct!");
            } else {
                for issue in &issues {
                    println!("{issue}");
                }
                println!(
                    "{} mismatches found. Run `recompute` to fix.",
                    issues.len()
                );
            }
        }
        Command::Migrate => {
            let done = maintenance::migrate_legacy_history(&ctx).await?;
            println!(
                "Migrated {} budget periods ({} already present, {} skipped).",
                done.migrated, done.existing, done.skipped
            );
        }
        Command::ProcessRecurring { user } => {
            let created = recurring::process_recurring_for_user(&ctx, user, ctx.today()).await?;
            println!("Created {created} recurring transactions.");
        }
        Command::Summary { user } => {
            let summary = report::dashboard(&ctx, user).await?;
            print!("{}", report::render_dashboard(&summary));
        }
    }

    // Let queued refreshes finish before exiting
    ctx.refresher().flush().await?;
    let stats = ctx.refresher().stats();
    if stats.failed() > 0 {
        warn!(failed = stats.failed(), "Some aggregate refreshes failed");
    }
    Ok(())
}
