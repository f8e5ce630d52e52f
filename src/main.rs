use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use media_sync::config::{ApiKeys, SyncConfig, DEFAULT_WATCH_REGION, DEFAULT_WORKERS};
use media_sync::logging::init_tracing;
use media_sync::notion::NotionClient;
use media_sync::progress::{format_duration, notion_spinner};
use media_sync::providers::http::HttpClient;
use media_sync::sync::{run_sync, Searcher, USER_AGENT};

#[derive(Parser)]
#[command(name = "media-sync")]
#[command(about = "Fill a Notion media database with metadata from TMDB, IGDB, RAWG and book sources")]
struct Args {
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    notion_token: String,

    #[arg(long, env = "DATABASE_ID")]
    database_id: String,

    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    tmdb_api_key: Option<String>,

    #[arg(long, env = "RAWG_API_KEY", hide_env_values = true)]
    rawg_api_key: Option<String>,

    #[arg(long, env = "IGDB_CLIENT_ID")]
    igdb_client_id: Option<String>,

    #[arg(long, env = "IGDB_CLIENT_SECRET", hide_env_values = true)]
    igdb_client_secret: Option<String>,

    #[arg(long, env = "GOOGLE_BOOKS_API_KEY", hide_env_values = true)]
    google_books_api_key: Option<String>,

    /// Entries processed in parallel
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Country whose streaming services are recorded
    #[arg(long, default_value = DEFAULT_WATCH_REGION)]
    watch_region: String,

    /// Resolve entries without writing to Notion
    #[arg(long)]
    dry_run: bool,

    /// Hide progress bars; log progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON
    #[arg(long)]
    stats_out: Option<PathBuf>,

    /// Only sync the entry with this exact title
    #[arg(long)]
    only: Option<String>,

    #[arg(long, env = "MEDIA_SYNC_LOG", default_value = "info")]
    log_level: String,
}

impl Args {
    fn split(self) -> (ApiKeys, SyncConfig, String) {
        let keys = ApiKeys {
            notion_token: self.notion_token,
            database_id: self.database_id,
            tmdb_api_key: self.tmdb_api_key,
            rawg_api_key: self.rawg_api_key,
            igdb: ApiKeys::twitch(self.igdb_client_id, self.igdb_client_secret),
            google_books_api_key: self.google_books_api_key,
        };
        let config = SyncConfig {
            workers: self.workers,
            watch_region: self.watch_region,
            dry_run: self.dry_run,
            log_only: self.log_only,
            stats_out: self.stats_out,
            only: self.only,
        };
        (keys, config, self.log_level)
    }
}

fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let (keys, config, log_level) = Args::parse().split();

    init_tracing(&log_level)?;

    if config.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();

    let notion = NotionClient::new(
        HttpClient::new("notion", USER_AGENT)?,
        &keys.notion_token,
        &keys.database_id,
    )?;
    let searcher = Searcher::from_keys(&keys, &config.watch_region)?;

    let spinner = notion_spinner("Querying Notion database", config.log_only);
    let mut entries = notion
        .query_entries()
        .context("Failed to query Notion database")?;
    spinner.finish_and_clear();

    if let Some(title) = &config.only {
        entries.retain(|e| &e.title == title);
    }
    tracing::info!(entries = entries.len(), dry_run = config.dry_run, "found entries in Notion database");

    let mut stats = run_sync(&searcher, &notion, &entries, &config);
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("sync");

    if let Some(path) = &config.stats_out {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote stats");
    }

    println!("\n{:=<60}", "");
    println!("Sync complete!");
    println!("  Entries:   {}", stats.total_entries);
    println!("  Updated:   {}", stats.updated);
    println!("  Created:   {}", stats.created);
    if config.dry_run {
        println!("  Resolved:  {} (dry run)", stats.resolved_dry_run);
    }
    println!("  No match:  {}", stats.no_match);
    println!("  Failed:    {}", stats.failed);
    println!("  Elapsed:   {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
