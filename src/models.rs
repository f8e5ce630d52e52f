//! Core data models for media synchronization.
//!
//! Candidates are the canonical shape every provider adapter produces;
//! `MediaRecord` is the normalized metadata written back to Notion.

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

// ============================================================================
// Media Types
// ============================================================================

/// Kind of tracked entry, as named by the Notion `Type` select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MediaType {
    Movie,
    TvSeries,
    Game,
    Book,
}

impl MediaType {
    /// Name used by the Notion `Type` select option.
    pub fn notion_name(self) -> &'static str {
        match self {
            MediaType::Movie => "Movie",
            MediaType::TvSeries => "TV Series",
            MediaType::Game => "Game",
            MediaType::Book => "Book",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notion_name())
    }
}

impl FromStr for MediaType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Movie" => Ok(MediaType::Movie),
            "TV Series" | "Tv Series" => Ok(MediaType::TvSeries),
            "Game" => Ok(MediaType::Game),
            "Book" => Ok(MediaType::Book),
            other => Err(SyncError::UnsupportedMediaType(other.to_string())),
        }
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Provider-specific popularity signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PopularitySignal {
    /// Small positive float, already provider-normalized (TMDB `popularity`).
    Popularity(f64),
    /// Unbounded count of ratings (IGDB `total_rating_count` and friends).
    RatingCount(u64),
}

/// One search result from a metadata provider, in canonical form.
///
/// `raw` keeps the untouched provider object so identity fields and anything
/// the record mapping needs later survive selection.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Option<String>,
    pub title: String,
    pub release_date: Option<String>,
    pub popularity: Option<PopularitySignal>,
    pub raw: Value,
}

impl Candidate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            release_date: None,
            popularity: None,
            raw: Value::Null,
        }
    }

    pub fn with_release_date(mut self, date: impl Into<String>) -> Self {
        self.release_date = Some(date.into());
        self
    }

    pub fn with_popularity(mut self, signal: PopularitySignal) -> Self {
        self.popularity = Some(signal);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// What we are trying to match: a title and an optional release date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub title: String,
    pub date: Option<String>,
}

impl Target {
    pub fn new(title: impl Into<String>, date: Option<&str>) -> Self {
        Self {
            title: title.into(),
            date: date.map(str::to_string),
        }
    }
}

/// Candidate paired with its score breakdown. Only lives during selection.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub candidate: &'a Candidate,
    pub title_score: f64,
    pub date_score: f64,
    pub popularity_score: f64,
    pub final_score: f64,
}

// ============================================================================
// Notion Entries
// ============================================================================

/// Entry read from the tracking database that needs (re)synchronizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    pub title: String,
    /// Raw `Type` select name; unsupported values are reported, not dropped.
    pub media_type: Option<String>,
    pub release_date: Option<String>,
    pub page_id: String,
}

impl TrackedEntry {
    pub fn target(&self) -> Target {
        Target::new(self.title.clone(), self.release_date.as_deref())
    }
}

// ============================================================================
// Output Models
// ============================================================================

/// Upcoming episode of a series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpisodeAiring {
    pub name: String,
    pub air_date: Option<String>,
}

/// Normalized metadata for one resolved entry, independent of provider.
///
/// `writers` holds authors for books, crew writers for movies/series and
/// developers for games, matching the single `Writer` column in Notion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaRecord {
    pub title: String,
    pub release_date: Option<String>,
    pub cover_url: Option<String>,
    pub background_url: Option<String>,
    pub genres: Vec<String>,
    pub writers: Vec<String>,
    pub directors: Vec<String>,
    pub publishers: Vec<String>,
    pub platforms: Vec<String>,
    pub synopsis: Option<String>,
    pub status: Option<String>,
    /// `None` when the provider had no availability data for the region.
    pub streaming: Option<Vec<String>>,
    pub rating: Option<f64>,
    pub pages: Option<u64>,
    pub episodes: Option<u64>,
    pub seasons: Option<u64>,
    pub last_episode: Option<String>,
    pub next_episode: Option<EpisodeAiring>,
}

impl MediaRecord {
    /// First four characters of the release date, or empty.
    pub fn year(&self) -> String {
        self.release_date
            .as_deref()
            .map(|d| d.chars().take(4).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// How a single entry ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Updated { provider: &'static str },
    Created { provider: &'static str },
    /// Resolved but not written (dry run).
    Resolved { provider: &'static str },
    NoMatch,
    Unsupported(String),
    Failed(String),
}

/// Counters for one sync run.
#[derive(Default, Debug, Clone, Serialize)]
pub struct SyncStats {
    pub total_entries: usize,
    pub updated: usize,
    pub created: usize,
    pub resolved_dry_run: usize,
    pub no_match: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub provider_hits: FxHashMap<&'static str, usize>,
    pub elapsed_seconds: f64,
}

impl SyncStats {
    pub fn record(&mut self, outcome: &EntryOutcome) {
        self.total_entries += 1;
        match outcome {
            EntryOutcome::Updated { provider } => {
                self.updated += 1;
                *self.provider_hits.entry(provider).or_default() += 1;
            }
            EntryOutcome::Created { provider } => {
                self.created += 1;
                *self.provider_hits.entry(provider).or_default() += 1;
            }
            EntryOutcome::Resolved { provider } => {
                self.resolved_dry_run += 1;
                *self.provider_hits.entry(provider).or_default() += 1;
            }
            EntryOutcome::NoMatch => self.no_match += 1,
            EntryOutcome::Unsupported(_) => self.unsupported += 1,
            EntryOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Share of entries that resolved to a provider result, as a percentage.
    pub fn match_rate(&self) -> f64 {
        if self.total_entries == 0 {
            0.0
        } else {
            let matched = self.updated + self.created + self.resolved_dry_run;
            100.0 * matched as f64 / self.total_entries as f64
        }
    }

    /// Log stats as pretty JSON under a phase tag.
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!(phase, "sync stats\n{}", json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_notion_names() {
        assert_eq!("Movie".parse::<MediaType>().unwrap(), MediaType::Movie);
        assert_eq!("TV Series".parse::<MediaType>().unwrap(), MediaType::TvSeries);
        assert_eq!("Book".parse::<MediaType>().unwrap(), MediaType::Book);
        assert!("Podcast".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_record_year() {
        let record = MediaRecord {
            release_date: Some("2021-10-22".to_string()),
            ..Default::default()
        };
        assert_eq!(record.year(), "2021");
        assert_eq!(MediaRecord::default().year(), "");
    }

    #[test]
    fn test_stats_record_and_rate() {
        let mut stats = SyncStats::default();
        stats.record(&EntryOutcome::Updated { provider: "tmdb" });
        stats.record(&EntryOutcome::Created { provider: "tmdb" });
        stats.record(&EntryOutcome::NoMatch);
        stats.record(&EntryOutcome::Failed("boom".to_string()));

        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.provider_hits.get("tmdb"), Some(&2));
        assert!((stats.match_rate() - 50.0).abs() < 1e-9);
    }
}
