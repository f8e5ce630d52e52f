//! Resolve tracked entries against providers and write the results to Notion.
//!
//! Each media type has a fixed provider order. A provider that errors or
//! finds nothing hands over to the next one; selection inside a provider is
//! always `select_best` with that provider's policy.

use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;

use crate::config::{ApiKeys, SyncConfig};
use crate::error::{Result, SyncError};
use crate::models::{EntryOutcome, MediaRecord, MediaType, SyncStats, Target, TrackedEntry};
use crate::notion::{NotionClient, Upsert};
use crate::progress::EntryProgress;
use crate::providers::goodreads::GoodreadsClient;
use crate::providers::google_books::{self, GoogleBooksClient};
use crate::providers::http::{HttpClient, BROWSER_USER_AGENT};
use crate::providers::igdb::{self, IgdbClient};
use crate::providers::openlibrary::{self, OpenLibraryClient};
use crate::providers::rawg::{self, RawgClient};
use crate::providers::tmdb::{self, TmdbClient};
use crate::providers::Provider;
use crate::scoring::select_best;

pub const USER_AGENT: &str = concat!("media-sync/", env!("CARGO_PKG_VERSION"));

/// A record together with the provider that produced it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub provider: Provider,
    pub record: MediaRecord,
}

// ============================================================================
// Fallback Chain
// ============================================================================

/// Walks a provider chain. The chain only fails when every provider it
/// tried failed; a provider that answered "nothing found" makes it a miss.
#[derive(Default)]
struct Fallback {
    last_error: Option<SyncError>,
    answered: bool,
}

impl Fallback {
    fn attempt(&mut self, provider: Provider, outcome: Result<Option<Resolved>>) -> Option<Resolved> {
        match outcome {
            Ok(found) => {
                self.answered = true;
                if found.is_none() {
                    tracing::debug!(provider = provider.name(), "no usable result");
                }
                found
            }
            Err(e) => {
                tracing::warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                self.last_error = Some(e);
                None
            }
        }
    }

    fn finish(self) -> Result<Option<Resolved>> {
        match self.last_error {
            Some(e) if !self.answered => Err(e),
            _ => Ok(None),
        }
    }
}

// ============================================================================
// Searcher
// ============================================================================

/// All provider clients for one run. Unconfigured providers are skipped.
#[derive(Default)]
pub struct Searcher {
    tmdb: Option<TmdbClient>,
    igdb: Option<IgdbClient>,
    rawg: Option<RawgClient>,
    openlibrary: Option<OpenLibraryClient>,
    google_books: Option<GoogleBooksClient>,
    goodreads: Option<GoodreadsClient>,
    watch_region: String,
}

impl Searcher {
    pub fn new(watch_region: &str) -> Self {
        Self {
            watch_region: watch_region.to_string(),
            ..Default::default()
        }
    }

    /// Every provider the keys allow. Keyless book sources are always on.
    pub fn from_keys(keys: &ApiKeys, watch_region: &str) -> Result<Self> {
        let mut searcher = Self::new(watch_region)
            .with_openlibrary(OpenLibraryClient::new(HttpClient::new("openlibrary", USER_AGENT)?))
            .with_google_books(GoogleBooksClient::new(
                HttpClient::new("google_books", USER_AGENT)?,
                keys.google_books_api_key.clone(),
            ))
            .with_goodreads(GoodreadsClient::new(HttpClient::new(
                "goodreads",
                BROWSER_USER_AGENT,
            )?));

        if let Some(key) = keys.tmdb_api_key.as_deref().filter(|k| !k.is_empty()) {
            searcher = searcher.with_tmdb(TmdbClient::new(HttpClient::new("tmdb", USER_AGENT)?, key)?);
        }
        if let Some(credentials) = keys.igdb.clone() {
            searcher = searcher.with_igdb(IgdbClient::new(HttpClient::new("igdb", USER_AGENT)?, credentials));
        }
        if let Some(key) = keys.rawg_api_key.as_deref().filter(|k| !k.is_empty()) {
            searcher = searcher.with_rawg(RawgClient::new(HttpClient::new("rawg", USER_AGENT)?, key));
        }
        Ok(searcher)
    }

    pub fn with_tmdb(mut self, client: TmdbClient) -> Self {
        self.tmdb = Some(client);
        self
    }

    pub fn with_igdb(mut self, client: IgdbClient) -> Self {
        self.igdb = Some(client);
        self
    }

    pub fn with_rawg(mut self, client: RawgClient) -> Self {
        self.rawg = Some(client);
        self
    }

    pub fn with_openlibrary(mut self, client: OpenLibraryClient) -> Self {
        self.openlibrary = Some(client);
        self
    }

    pub fn with_google_books(mut self, client: GoogleBooksClient) -> Self {
        self.google_books = Some(client);
        self
    }

    pub fn with_goodreads(mut self, client: GoodreadsClient) -> Self {
        self.goodreads = Some(client);
        self
    }

    /// Find metadata for `target`. `Ok(None)` means every provider came up empty.
    pub fn resolve(&self, target: &Target, media_type: MediaType) -> Result<Option<Resolved>> {
        match media_type {
            MediaType::Movie | MediaType::TvSeries => self.resolve_screen(target, media_type),
            MediaType::Game => self.resolve_game(target),
            MediaType::Book => self.resolve_book(target),
        }
    }

    fn resolve_screen(&self, target: &Target, media_type: MediaType) -> Result<Option<Resolved>> {
        let tmdb = self
            .tmdb
            .as_ref()
            .ok_or(SyncError::MissingCredential("TMDB_API_KEY"))?;

        let candidates = tmdb.search(&target.title, media_type)?;
        let Some(best) = select_best(&candidates, target, &Provider::Tmdb.policy()) else {
            return Ok(None);
        };
        let id = best
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Parse("tmdb result without id".to_string()))?;
        let details = tmdb.details(id, media_type)?;

        Ok(Some(Resolved {
            provider: Provider::Tmdb,
            record: tmdb::to_record(&details, media_type, &self.watch_region),
        }))
    }

    fn resolve_game(&self, target: &Target) -> Result<Option<Resolved>> {
        if self.igdb.is_none() && self.rawg.is_none() {
            return Err(SyncError::MissingCredential("IGDB_CLIENT_ID/IGDB_CLIENT_SECRET or RAWG_API_KEY"));
        }

        let mut chain = Fallback::default();
        if let Some(client) = &self.igdb {
            if let Some(found) = chain.attempt(Provider::Igdb, from_igdb(client, target)) {
                return Ok(Some(found));
            }
        }
        if let Some(client) = &self.rawg {
            if let Some(found) = chain.attempt(Provider::Rawg, from_rawg(client, target)) {
                return Ok(Some(found));
            }
        }
        chain.finish()
    }

    fn resolve_book(&self, target: &Target) -> Result<Option<Resolved>> {
        let mut chain = Fallback::default();
        if let Some(client) = &self.openlibrary {
            if let Some(found) = chain.attempt(Provider::OpenLibrary, from_openlibrary(client, target)) {
                return Ok(Some(found));
            }
        }
        if let Some(client) = &self.google_books {
            if let Some(found) = chain.attempt(Provider::GoogleBooks, from_google_books(client, target)) {
                return Ok(Some(found));
            }
        }
        if let Some(client) = &self.goodreads {
            if let Some(found) = chain.attempt(Provider::Goodreads, from_goodreads(client, target)) {
                return Ok(Some(found));
            }
        }
        chain.finish()
    }
}

fn from_igdb(client: &IgdbClient, target: &Target) -> Result<Option<Resolved>> {
    let candidates = client.search(&target.title)?;
    Ok(select_best(&candidates, target, &Provider::Igdb.policy()).map(|best| Resolved {
        provider: Provider::Igdb,
        record: igdb::to_record(&best.raw, Utc::now()),
    }))
}

fn from_rawg(client: &RawgClient, target: &Target) -> Result<Option<Resolved>> {
    let candidates = client.search(&target.title)?;
    let Some(best) = select_best(&candidates, target, &Provider::Rawg.policy()) else {
        return Ok(None);
    };
    let id = best
        .id
        .as_deref()
        .ok_or_else(|| SyncError::Parse("rawg result without id".to_string()))?;
    let details = client.details(id)?;
    Ok(Some(Resolved {
        provider: Provider::Rawg,
        record: rawg::to_record(&details),
    }))
}

fn from_openlibrary(client: &OpenLibraryClient, target: &Target) -> Result<Option<Resolved>> {
    let candidates = client.search(&target.title)?;
    Ok(select_best(&candidates, target, &Provider::OpenLibrary.policy()).map(|best| Resolved {
        provider: Provider::OpenLibrary,
        record: openlibrary::to_record(&best.raw),
    }))
}

fn from_google_books(client: &GoogleBooksClient, target: &Target) -> Result<Option<Resolved>> {
    let candidates = client.search(&target.title)?;
    Ok(select_best(&candidates, target, &Provider::GoogleBooks.policy()).map(|best| Resolved {
        provider: Provider::GoogleBooks,
        record: google_books::to_record(&best.raw),
    }))
}

fn from_goodreads(client: &GoodreadsClient, target: &Target) -> Result<Option<Resolved>> {
    let candidates = client.search(&target.title)?;
    let Some(best) = select_best(&candidates, target, &Provider::Goodreads.policy()) else {
        return Ok(None);
    };
    Ok(Some(Resolved {
        provider: Provider::Goodreads,
        record: client.fetch_record(best)?,
    }))
}

// ============================================================================
// Driver
// ============================================================================

/// Resolve one entry and, unless `notion` is `None`, write it back.
pub fn sync_entry(searcher: &Searcher, notion: Option<&NotionClient>, entry: &TrackedEntry) -> EntryOutcome {
    let Some(raw_type) = entry.media_type.as_deref() else {
        return EntryOutcome::Unsupported("no type".to_string());
    };
    let media_type: MediaType = match raw_type.parse() {
        Ok(t) => t,
        Err(_) => {
            tracing::warn!(title = %entry.title, media_type = raw_type, "not supported");
            return EntryOutcome::Unsupported(raw_type.to_string());
        }
    };

    let resolved = match searcher.resolve(&entry.target(), media_type) {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            tracing::info!(title = %entry.title, %media_type, "no valid result");
            return EntryOutcome::NoMatch;
        }
        Err(e) => {
            tracing::error!(title = %entry.title, error = %e, "error processing entry");
            return EntryOutcome::Failed(e.to_string());
        }
    };

    let provider = resolved.provider.name();
    let Some(notion) = notion else {
        tracing::info!(title = %entry.title, matched = %resolved.record.title, provider, "resolved (dry run)");
        return EntryOutcome::Resolved { provider };
    };

    let page_id = Some(entry.page_id.as_str()).filter(|id| !id.is_empty());
    match notion.upsert(&resolved.record, media_type, page_id) {
        Ok(Upsert::Updated(_)) => EntryOutcome::Updated { provider },
        Ok(Upsert::Created(_)) => EntryOutcome::Created { provider },
        Err(e) => {
            tracing::error!(title = %entry.title, error = %e, "notion write failed");
            EntryOutcome::Failed(e.to_string())
        }
    }
}

/// Sync every entry in parallel on the global rayon pool.
pub fn run_sync(
    searcher: &Searcher,
    notion: &NotionClient,
    entries: &[TrackedEntry],
    config: &SyncConfig,
) -> SyncStats {
    let start = Instant::now();
    let progress = EntryProgress::new(entries.len() as u64, config.log_only);
    let writer = if config.dry_run { None } else { Some(notion) };

    let outcomes: Vec<EntryOutcome> = entries
        .par_iter()
        .map(|entry| {
            let outcome = sync_entry(searcher, writer, entry);
            progress.record(&outcome);
            outcome
        })
        .collect();

    let mut stats = SyncStats::default();
    for outcome in &outcomes {
        stats.record(outcome);
    }
    stats.elapsed_seconds = start.elapsed().as_secs_f64();

    progress.finish(&stats);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn entry(title: &str, media_type: Option<&str>) -> TrackedEntry {
        TrackedEntry {
            title: title.to_string(),
            media_type: media_type.map(str::to_string),
            release_date: None,
            page_id: String::new(),
        }
    }

    fn http(provider: &'static str) -> HttpClient {
        HttpClient::new(provider, "media-sync-test").unwrap()
    }

    #[test]
    fn test_fallback_chain_outcomes() {
        let mut chain = Fallback::default();
        assert!(chain.attempt(Provider::Igdb, Err(SyncError::Auth("igdb".into()))).is_none());
        assert!(matches!(chain.finish(), Err(SyncError::Auth(_))));

        let mut chain = Fallback::default();
        chain.attempt(Provider::Igdb, Err(SyncError::Auth("igdb".into())));
        chain.attempt(Provider::Rawg, Ok(None));
        assert!(matches!(chain.finish(), Ok(None)));
    }

    #[test]
    fn test_unsupported_types() {
        let searcher = Searcher::new("BR");
        assert_eq!(
            sync_entry(&searcher, None, &entry("Serial", Some("Podcast"))),
            EntryOutcome::Unsupported("Podcast".to_string())
        );
        assert!(matches!(
            sync_entry(&searcher, None, &entry("Serial", None)),
            EntryOutcome::Unsupported(_)
        ));
    }

    #[test]
    fn test_missing_tmdb_key_fails_entry() {
        let searcher = Searcher::new("BR");
        let outcome = sync_entry(&searcher, None, &entry("Dune", Some("Movie")));
        assert!(matches!(outcome, EntryOutcome::Failed(_)));
    }

    #[test]
    fn test_movie_resolves_through_tmdb() {
        let mut server = Server::new();
        let _search = server
            .mock("GET", "/search/movie")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"results": [
                    {"id": 841, "title": "Dune", "release_date": "1984-12-14", "popularity": 20.0},
                    {"id": 438631, "title": "Dune", "release_date": "2021-09-15", "popularity": 90.0}
                ]})
                .to_string(),
            )
            .create();
        let details = server
            .mock("GET", "/movie/841")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"title": "Dune", "release_date": "1984-12-14"}).to_string())
            .create();

        let tmdb = TmdbClient::with_base_url(http("tmdb"), "k", &server.url()).unwrap();
        let searcher = Searcher::new("BR").with_tmdb(tmdb);
        let target = Target::new("Dune", Some("1984-12-01"));
        let resolved = searcher.resolve(&target, MediaType::Movie).unwrap().unwrap();

        assert_eq!(resolved.provider, Provider::Tmdb);
        assert_eq!(resolved.record.release_date.as_deref(), Some("1984-12-14"));
        details.assert();
    }

    #[test]
    fn test_book_falls_back_to_google_books() {
        let mut server = Server::new();
        let _openlibrary = server
            .mock("GET", "/ol/search.json")
            .match_query(Matcher::Any)
            .with_status(503)
            .create();
        let _google = server
            .mock("GET", "/gb/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"items": [{"id": "v1", "volumeInfo": {"title": "Dune", "authors": ["Frank Herbert"]}}]})
                    .to_string(),
            )
            .create();

        let searcher = Searcher::new("BR")
            .with_openlibrary(OpenLibraryClient::with_base_url(
                http("openlibrary"),
                &format!("{}/ol", server.url()),
            ))
            .with_google_books(GoogleBooksClient::with_base_url(
                http("google_books"),
                None,
                &format!("{}/gb", server.url()),
            ));

        let outcome = sync_entry(&searcher, None, &entry("Dune", Some("Book")));
        assert_eq!(outcome, EntryOutcome::Resolved { provider: "google_books" });
    }

    #[test]
    fn test_empty_results_are_no_match() {
        let mut server = Server::new();
        let _rawg = server
            .mock("GET", "/games")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"count": 0, "results": []}"#)
            .create();

        let searcher = Searcher::new("BR").with_rawg(RawgClient::with_base_url(http("rawg"), "k", &server.url()));
        let outcome = sync_entry(&searcher, None, &entry("Nonexistent Game", Some("Game")));
        assert_eq!(outcome, EntryOutcome::NoMatch);
    }
}
