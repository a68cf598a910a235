use clap::{Parser, Subcommand, ValueEnum};
use themeradar_analysis::{analyze_themes, run_batch_update, BatchMode};
use themeradar_broadcast::{run_realtime_sync, BroadcastHub};
use themeradar_collect::{
    run_collection, BackoffPolicy, CancelFlag, CollectRequest, RateGovernor, SourceSelection,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "themeradar-cli")]
#[command(about = "themeradar command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one collection pass for the given themes.
    Collect {
        /// Themes to collect, repeatable.
        #[arg(long, required = true, num_args = 1..)]
        themes: Vec<String>,
        /// Sources to query; omit or pass "all" for every source.
        #[arg(long, num_args = 0..)]
        sources: Vec<String>,
        #[arg(long, default_value = "US")]
        region: String,
        /// Bypass any upstream caching the source supports.
        #[arg(long)]
        force_refresh: bool,
    },
    /// Run one processing operation.
    Process {
        #[arg(value_enum)]
        operation: Operation,
        /// Batch mode, only meaningful for batch-update.
        #[arg(long, value_enum, default_value_t = Mode::Full)]
        mode: Mode,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Operation {
    BatchUpdate,
    AnalyzeThemes,
    RealtimeSync,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Full,
    Light,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = themeradar_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = themeradar_db::PoolConfig::from_app_config(&config);
    let pool = themeradar_db::connect_pool(&config.database_url, pool_config).await?;
    themeradar_db::run_migrations(&pool).await?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Collect {
            themes,
            sources,
            region,
            force_refresh,
        } => {
            let selection = SourceSelection::parse(&sources).map_err(anyhow::Error::msg)?;
            let sources_file = themeradar_core::load_sources(&config.sources_path)?;
            let governor = RateGovernor::new(
                &sources_file,
                BackoffPolicy {
                    base_ms: config.collect_backoff_base_ms,
                    cap_ms: config.collect_backoff_cap_ms,
                    jitter_ms: config.collect_backoff_jitter_ms,
                },
            );
            let cancel = CancelFlag::new();

            let request = CollectRequest {
                themes,
                sources: selection,
                region,
                requested_by: "cli".to_owned(),
                force_refresh,
            };
            let summary = run_collection(
                &pool,
                &config,
                &sources_file,
                &governor,
                &cancel,
                &request,
            )
            .await?;

            println!(
                "run {} {}: {} records across {} sources",
                summary.public_id,
                summary.status,
                summary.records_processed,
                summary.outcomes.len()
            );
            for outcome in &summary.outcomes {
                match &outcome.error_message {
                    Some(message) => {
                        println!("  {}: error ({message})", outcome.source.as_str());
                    }
                    None => println!(
                        "  {}: {} records",
                        outcome.source.as_str(),
                        outcome.record_count
                    ),
                }
            }
        }
        Commands::Process { operation, mode } => match operation {
            Operation::BatchUpdate => {
                let mode = match mode {
                    Mode::Full => BatchMode::Full,
                    Mode::Light => BatchMode::Light,
                };
                let report = run_batch_update(&pool, &config, mode).await?;
                println!(
                    "batch update: {} themes examined, {} updated, {} observations pruned",
                    report.themes_examined, report.themes_updated, report.observations_deleted
                );
            }
            Operation::AnalyzeThemes => {
                let report = analyze_themes(&pool, &config).await?;
                println!(
                    "analysis: {} themes analyzed, {} insights written, {} retracted",
                    report.themes_analyzed, report.insights_written, report.insights_retracted
                );
            }
            Operation::RealtimeSync => {
                let hub = BroadcastHub::default();
                let report = run_realtime_sync(&pool, &config, &hub).await?;
                println!(
                    "realtime sync: {} changes, {} notifications, {} alerts",
                    report.changes_detected, report.notifications_written, report.alerts_fired
                );
            }
        },
    }

    Ok(())
}
