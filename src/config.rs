//! Run configuration shared by the binaries.

use std::path::PathBuf;

use crate::providers::igdb::TwitchCredentials;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_WATCH_REGION: &str = "BR";

/// Secrets for the services a run talks to. Optional keys switch a provider off.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub notion_token: String,
    pub database_id: String,
    pub tmdb_api_key: Option<String>,
    pub rawg_api_key: Option<String>,
    pub igdb: Option<TwitchCredentials>,
    pub google_books_api_key: Option<String>,
}

impl ApiKeys {
    /// Twitch credentials only count when both halves are present.
    pub fn twitch(client_id: Option<String>, client_secret: Option<String>) -> Option<TwitchCredentials> {
        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(TwitchCredentials {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub workers: usize,
    /// ISO 3166-1 country whose streaming services are reported.
    pub watch_region: String,
    /// Resolve everything but write nothing back to Notion.
    pub dry_run: bool,
    pub log_only: bool,
    pub stats_out: Option<PathBuf>,
    /// Restrict the run to entries with this exact title.
    pub only: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            watch_region: DEFAULT_WATCH_REGION.to_string(),
            dry_run: false,
            log_only: false,
            stats_out: None,
            only: None,
        }
    }
}
