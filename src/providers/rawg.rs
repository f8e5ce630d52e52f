//! RAWG (games), the fallback when IGDB has nothing.

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Candidate, MediaRecord, PopularitySignal};
use crate::providers::http::HttpClient;
use crate::providers::{count_field, id_field, names, str_field};

pub const BASE_URL: &str = "https://api.rawg.io/api";
const PAGE_SIZE: usize = 10;

pub struct RawgClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl RawgClient {
    pub fn new(http: HttpClient, api_key: &str) -> Self {
        Self::with_base_url(http, api_key, BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, api_key: &str, base_url: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let url = format!(
            "{}/games?key={}&search={}&page_size={PAGE_SIZE}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(query)
        );
        let body: Value = self.http.get_json(&url, HeaderMap::new())?;
        Ok(body
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(to_candidate).collect())
            .unwrap_or_default())
    }

    pub fn details(&self, id: &str) -> Result<Value> {
        let url = format!(
            "{}/games/{}?key={}",
            self.base_url,
            urlencoding::encode(id),
            urlencoding::encode(&self.api_key)
        );
        self.http.get_json(&url, HeaderMap::new())
    }
}

pub fn to_candidate(raw: &Value) -> Candidate {
    Candidate {
        id: id_field(raw, "id"),
        title: str_field(raw, "name").unwrap_or_default(),
        release_date: str_field(raw, "released"),
        popularity: count_field(raw, "ratings_count").map(PopularitySignal::RatingCount),
        raw: raw.clone(),
    }
}

fn mentions_cover(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("cover") || lower.contains("box")
}

/// Best guess at box art. RAWG has no cover field, so look through
/// screenshots, then typed images, then store art, then the background.
fn cover_image(details: &Value) -> Option<String> {
    let non_empty = |key: &str| {
        details
            .get(key)
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
    };

    let found = if let Some(shots) = non_empty("screenshots") {
        shots
            .iter()
            .filter_map(|s| str_field(s, "image"))
            .find(|url| mentions_cover(url))
    } else if let Some(images) = non_empty("images") {
        images.iter().find_map(|image| {
            let typed = image.get("type").and_then(Value::as_str) == Some("cover");
            let named = str_field(image, "name").is_some_and(|n| n.to_lowercase().contains("cover"));
            if typed || named {
                str_field(image, "image")
            } else {
                None
            }
        })
    } else if let Some(stores) = non_empty("stores") {
        stores.iter().find_map(|entry| {
            let store = entry.get("store")?;
            let slug = str_field(store, "slug").unwrap_or_default();
            if slug.contains("cover") {
                str_field(store, "image_background")
            } else {
                None
            }
        })
    } else {
        None
    };

    found.or_else(|| str_field(details, "background_image"))
}

fn platform_names(details: &Value) -> Vec<String> {
    details
        .get("platforms")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|p| p.get("platform").and_then(|inner| str_field(inner, "name")))
                .collect()
        })
        .unwrap_or_default()
}

/// Map RAWG game details onto a record. RAWG rates out of 5; Notion stores out of 10.
pub fn to_record(details: &Value) -> MediaRecord {
    MediaRecord {
        title: str_field(details, "name").unwrap_or_default(),
        release_date: str_field(details, "released"),
        cover_url: cover_image(details),
        background_url: str_field(details, "background_image"),
        genres: names(details, "genres"),
        writers: names(details, "developers"),
        publishers: names(details, "publishers"),
        platforms: platform_names(details),
        synopsis: str_field(details, "description_raw"),
        rating: Some(details.get("rating").and_then(Value::as_f64).unwrap_or(0.0) * 2.0),
        ..Default::default()
    }
}
