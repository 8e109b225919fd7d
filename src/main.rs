use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use rankscrape::config::{BackfillConfig, SnapshotConfig, StoreConfig};
use rankscrape::process::{process_history, process_rankings, WalkSummary};
use rankscrape::request::HttpSource;
use rankscrape::store::{MemoryStore, PostgrestStore, Store};
use rankscrape::{info_time, Result, REQUEST_TIMEOUT_SECS};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Scrapes player rankings and league transactions into the store
#[derive(Parser)]
#[command(name = "rankscrape", version)]
struct Cli {
    /// Per request timeout in seconds, for both the source and the store
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    timeout: u64,

    /// Run against an in-memory store instead of the configured one
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Snapshot today's rankings
    Rankings(RankingsArgs),
    /// Walk a league's transaction history back to its first season
    Backfill(BackfillArgs),
}

#[derive(Args)]
struct RankingsArgs {
    /// Rankings URL, `{page}` is replaced with the page index
    #[arg(long)]
    url: Option<String>,
    /// Format label stored with every record
    #[arg(long)]
    format: Option<String>,
    #[arg(long)]
    max_pages: Option<usize>,
    /// Delay between page requests in milliseconds
    #[arg(long)]
    page_delay_ms: Option<u64>,
    /// Fewer rows than this on the first page aborts the run
    #[arg(long)]
    min_rows: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    table: Option<String>,
}

#[derive(Args)]
struct BackfillArgs {
    /// Most recent league id, the walk goes backwards from here
    league_id: String,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    weeks: Option<u32>,
    /// Delay between week requests in milliseconds
    #[arg(long)]
    week_delay_ms: Option<u64>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    table: Option<String>,
}

impl RankingsArgs {
    fn into_config(self) -> SnapshotConfig {
        let mut config = SnapshotConfig::default();
        if let Some(url) = self.url {
            config.url_template = url;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(ms) = self.page_delay_ms {
            config.page_delay = Duration::from_millis(ms);
        }
        if let Some(min_rows) = self.min_rows {
            config.min_rows = min_rows;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        config
    }
}

impl BackfillArgs {
    fn into_config(self) -> BackfillConfig {
        let mut config = BackfillConfig::new(self.league_id);
        if let Some(api_base) = self.api_base {
            config.api_base = api_base.trim_end_matches('/').to_string();
        }
        if let Some(weeks) = self.weeks {
            config.weeks = weeks;
        }
        if let Some(ms) = self.week_delay_ms {
            config.week_delay = Duration::from_millis(ms);
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let start_time = Local::now();
    match run(Cli::parse()).await {
        Ok(summary) => {
            if summary.failed_batches > 0 {
                warn!(
                    failed_batches = summary.failed_batches,
                    failed_rows = summary.failed_rows,
                    "some batches were not stored"
                );
            }
            info_time!(start_time, "Full program time:");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("CRITICAL ERROR: {e}");
            if e.is_fatal() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

async fn run(cli: Cli) -> Result<WalkSummary> {
    let timeout = Duration::from_secs(cli.timeout);
    let source = HttpSource::new(timeout)?;

    let store: Box<dyn Store> = if cli.dry_run {
        info!("dry run, records stay in memory");
        Box::new(MemoryStore::new())
    } else {
        Box::new(PostgrestStore::new(&StoreConfig::from_env()?, timeout)?)
    };

    let summary = match cli.command {
        Command::Rankings(args) => {
            let as_of = Local::now().date_naive();
            process_rankings(&source, store.as_ref(), &args.into_config(), as_of).await?
        }
        Command::Backfill(args) => {
            process_history(&source, store.as_ref(), &args.into_config()).await?
        }
    };
    info!(?summary, "run summary");
    Ok(summary)
}
