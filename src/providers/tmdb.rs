//! TMDB (movies and TV series).

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::models::{Candidate, EpisodeAiring, MediaRecord, MediaType, PopularitySignal};
use crate::providers::http::HttpClient;
use crate::providers::{count_field, id_field, names, str_field};

pub const BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";

fn path_segment(media_type: MediaType) -> Result<&'static str> {
    match media_type {
        MediaType::Movie => Ok("movie"),
        MediaType::TvSeries => Ok("tv"),
        other => Err(SyncError::UnsupportedMediaType(format!("{other} on TMDB"))),
    }
}

pub struct TmdbClient {
    http: HttpClient,
    base_url: String,
    headers: HeaderMap,
}

impl TmdbClient {
    pub fn new(http: HttpClient, api_key: &str) -> Result<Self> {
        Self::with_base_url(http, api_key, BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, api_key: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| SyncError::Auth("tmdb".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    /// Search movies or series by title.
    pub fn search(&self, query: &str, media_type: MediaType) -> Result<Vec<Candidate>> {
        let url = format!(
            "{}/search/{}?query={}&include_adult=true&language=en-US&page=1",
            self.base_url,
            path_segment(media_type)?,
            urlencoding::encode(query)
        );
        let body: Value = self.http.get_json(&url, self.headers.clone())?;
        Ok(body
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(to_candidate).collect())
            .unwrap_or_default())
    }

    /// Full details with credits and watch providers appended.
    pub fn details(&self, id: &str, media_type: MediaType) -> Result<Value> {
        let url = format!(
            "{}/{}/{}?append_to_response=credits,watch/providers",
            self.base_url,
            path_segment(media_type)?,
            urlencoding::encode(id)
        );
        self.http.get_json(&url, self.headers.clone())
    }
}

/// Adapt one TMDB search result.
pub fn to_candidate(raw: &Value) -> Candidate {
    Candidate {
        id: id_field(raw, "id"),
        title: str_field(raw, "title")
            .or_else(|| str_field(raw, "name"))
            .unwrap_or_default(),
        release_date: str_field(raw, "release_date").or_else(|| str_field(raw, "first_air_date")),
        popularity: raw
            .get("popularity")
            .and_then(Value::as_f64)
            .map(PopularitySignal::Popularity),
        raw: raw.clone(),
    }
}

fn crew_by_job(details: &Value, job: &str) -> Vec<String> {
    details
        .pointer("/credits/crew")
        .and_then(Value::as_array)
        .map(|crew| {
            crew.iter()
                .filter(|m| m.get("job").and_then(Value::as_str) == Some(job))
                .filter_map(|m| str_field(m, "name"))
                .collect()
        })
        .unwrap_or_default()
}

/// Flat-rate streaming services in `region`.
///
/// `None` when TMDB sent no provider results at all; `Some(vec![])` when it
/// did but nothing streams in the region.
fn streaming_in(details: &Value, region: &str) -> Option<Vec<String>> {
    let results = details.get("watch/providers")?.get("results")?.as_object()?;
    let services = results
        .get(region)
        .and_then(|country| country.get("flatrate"))
        .and_then(Value::as_array)
        .map(|flatrate| {
            flatrate
                .iter()
                .filter_map(|p| str_field(p, "provider_name"))
                .collect()
        })
        .unwrap_or_default();
    Some(services)
}

fn format_last_episode(episode: &Value) -> String {
    let season = count_field(episode, "season_number").unwrap_or(0);
    let number = count_field(episode, "episode_number").unwrap_or(0);
    let name = str_field(episode, "name").unwrap_or_default();
    format!("S{season:02}, E{number:02}: {name}")
}

/// Map TMDB details onto a record.
pub fn to_record(details: &Value, media_type: MediaType, watch_region: &str) -> MediaRecord {
    let is_series = media_type == MediaType::TvSeries;
    let (title_key, date_key) = if is_series {
        ("name", "first_air_date")
    } else {
        ("title", "release_date")
    };

    let mut record = MediaRecord {
        title: str_field(details, title_key).unwrap_or_default(),
        release_date: str_field(details, date_key),
        cover_url: str_field(details, "poster_path").map(|p| format!("{IMAGE_BASE_URL}{p}")),
        genres: names(details, "genres"),
        writers: crew_by_job(details, "Writer"),
        directors: crew_by_job(details, "Director"),
        synopsis: str_field(details, "overview"),
        status: str_field(details, "status"),
        streaming: streaming_in(details, watch_region),
        rating: Some(details.get("vote_average").and_then(Value::as_f64).unwrap_or(0.0)),
        ..Default::default()
    };

    if is_series {
        record.episodes = Some(count_field(details, "number_of_episodes").unwrap_or(0));
        record.seasons = Some(count_field(details, "number_of_seasons").unwrap_or(0));
        record.last_episode = details
            .get("last_episode_to_air")
            .filter(|e| e.is_object())
            .map(format_last_episode);
        record.next_episode = details
            .get("next_episode_to_air")
            .filter(|e| e.is_object())
            .map(|e| EpisodeAiring {
                name: str_field(e, "name").unwrap_or_default(),
                air_date: str_field(e, "air_date"),
            });
    }

    record
}
