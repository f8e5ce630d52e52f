//! IGDB (games), authenticated through Twitch client credentials.
//!
//! The access token lives in the client the caller constructs and is
//! refreshed when it expires; nothing is process-global.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;

use crate::dates::epoch_to_date;
use crate::error::{Result, SyncError};
use crate::models::{Candidate, MediaRecord, PopularitySignal};
use crate::providers::http::HttpClient;
use crate::providers::{count_field, id_field, names, str_field};

pub const API_URL: &str = "https://api.igdb.com/v4";
pub const AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Tokens are renewed this long before Twitch says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const SEARCH_FIELDS: &str = "total_rating,total_rating_count,name,summary,rating,cover.url,\
    storyline,genres.name,artworks.url,artworks.name,screenshots.url,platforms.name,\
    aggregated_rating,first_release_date,involved_companies.developer,\
    involved_companies.publisher,involved_companies.company.name";

// ============================================================================
// Credentials
// ============================================================================

#[derive(Debug, Clone)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

// ============================================================================
// Client
// ============================================================================

pub struct IgdbClient {
    http: HttpClient,
    credentials: TwitchCredentials,
    token: Mutex<Option<AccessToken>>,
    api_url: String,
    auth_url: String,
}

impl IgdbClient {
    pub fn new(http: HttpClient, credentials: TwitchCredentials) -> Self {
        Self::with_urls(http, credentials, API_URL, AUTH_URL)
    }

    pub fn with_urls(
        http: HttpClient,
        credentials: TwitchCredentials,
        api_url: &str,
        auth_url: &str,
    ) -> Self {
        Self {
            http,
            credentials,
            token: Mutex::new(None),
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.to_string(),
        }
    }

    /// Current token, fetching a new one when missing or about to expire.
    pub fn access_token(&self) -> Result<String> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| SyncError::Auth("igdb token lock poisoned".to_string()))?;

        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let url = format!(
            "{}?client_id={}&client_secret={}&grant_type=client_credentials",
            self.auth_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.credentials.client_secret)
        );
        let response: TokenResponse = self.http.post_text(&url, HeaderMap::new(), String::new())?;
        let value = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Auth("igdb".to_string()))?;

        tracing::debug!(expires_in = response.expires_in, "fetched IGDB access token");
        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        Ok(value)
    }

    /// Drop the cached token so the next call authenticates again.
    pub fn invalidate_token(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
    }

    fn headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let client_id = HeaderValue::from_str(&self.credentials.client_id)
            .map_err(|_| SyncError::Auth("igdb client id".to_string()))?;
        headers.insert(HeaderName::from_static("client-id"), client_id);
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| SyncError::Auth("igdb token".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Search games by title. Results already carry every field `to_record` needs.
    ///
    /// A 401 drops the cached token and retries once with a fresh one.
    pub fn search(&self, title: &str) -> Result<Vec<Candidate>> {
        match self.search_once(title) {
            Err(SyncError::Api { status: 401, .. }) => {
                tracing::debug!("IGDB rejected token, re-authenticating");
                self.invalidate_token();
                self.search_once(title)
            }
            other => other,
        }
    }

    fn search_once(&self, title: &str) -> Result<Vec<Candidate>> {
        let token = self.access_token()?;
        let url = format!("{}/games", self.api_url);
        let results: Vec<Value> = self
            .http
            .post_text(&url, self.headers(&token)?, search_query(title))?;
        Ok(results.iter().map(to_candidate).collect())
    }
}

/// IGDB query body for a title search.
pub fn search_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('"', "\\\"");
    format!("search \"{escaped}\"; fields {SEARCH_FIELDS};")
}

// ============================================================================
// Mapping
// ============================================================================

/// Adapt one IGDB game. `first_release_date` (epoch seconds) becomes an ISO date.
pub fn to_candidate(raw: &Value) -> Candidate {
    Candidate {
        id: id_field(raw, "id"),
        title: str_field(raw, "name").unwrap_or_default(),
        release_date: raw
            .get("first_release_date")
            .and_then(Value::as_i64)
            .and_then(epoch_to_date)
            .map(|d| d.format("%Y-%m-%d").to_string()),
        popularity: count_field(raw, "total_rating_count").map(PopularitySignal::RatingCount),
        raw: raw.clone(),
    }
}

/// `//images.igdb.com/.../t_thumb/x.jpg` → `https://images.igdb.com/.../t_1080p/x.jpg`
pub fn full_size_image(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}").replace("t_thumb", "t_1080p"),
        None => url.to_string(),
    }
}

fn companies(raw: &Value, role: &str) -> Vec<String> {
    raw.get("involved_companies")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter(|c| c.get(role).and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|c| c.get("company").and_then(|co| str_field(co, "name")))
                .collect()
        })
        .unwrap_or_default()
}

fn image_urls<'a>(raw: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    raw.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Map an IGDB game onto a record. `now` decides Upcoming vs Released.
pub fn to_record(raw: &Value, now: DateTime<Utc>) -> MediaRecord {
    let released_at = raw
        .get("first_release_date")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    let status = match released_at {
        Some(at) if at > now => "Upcoming",
        Some(_) => "Released",
        None => "Unknown",
    };

    let mut cover = raw
        .get("cover")
        .and_then(|c| str_field(c, "url"))
        .map(|u| full_size_image(&u));

    let background = image_urls(raw, "artworks")
        .next()
        .and_then(|a| str_field(a, "url"))
        .map(|u| full_size_image(&u))
        .or_else(|| {
            image_urls(raw, "screenshots")
                .filter_map(|s| str_field(s, "url"))
                .last()
                .map(|u| full_size_image(&u))
        });

    if cover.is_none() {
        cover = image_urls(raw, "artworks").find_map(|artwork| {
            let name = str_field(artwork, "name")?.to_lowercase();
            let looks_like_cover = ["box", "cover", "poster"].iter().any(|k| name.contains(k));
            if looks_like_cover {
                str_field(artwork, "url").map(|u| full_size_image(&u))
            } else {
                None
            }
        });
    }

    MediaRecord {
        title: str_field(raw, "name").unwrap_or_default(),
        release_date: released_at.map(|at| at.format("%Y-%m-%d").to_string()),
        cover_url: cover,
        background_url: background,
        genres: names(raw, "genres"),
        writers: companies(raw, "developer"),
        publishers: companies(raw, "publisher"),
        platforms: names(raw, "platforms"),
        synopsis: str_field(raw, "storyline").or_else(|| str_field(raw, "summary")),
        status: Some(status.to_string()),
        rating: Some(
            raw.get("rating")
                .and_then(Value::as_f64)
                .map_or(0.0, |r| r / 10.0),
        ),
        ..Default::default()
    }
}
