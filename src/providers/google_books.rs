//! Google Books volumes search. Works without a key at a low quota.

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Candidate, MediaRecord, PopularitySignal};
use crate::providers::http::HttpClient;
use crate::providers::{count_field, id_field, str_field, strings};

pub const BASE_URL: &str = "https://www.googleapis.com/books/v1";
const MAX_RESULTS: usize = 10;

pub struct GoogleBooksClient {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleBooksClient {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self::with_base_url(http, api_key, BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, api_key: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let mut url = format!(
            "{}/volumes?q={}&maxResults={MAX_RESULTS}&printType=books",
            self.base_url,
            urlencoding::encode(query)
        );
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        let body: Value = self.http.get_json(&url, HeaderMap::new())?;
        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(to_candidate).collect())
            .unwrap_or_default())
    }
}

/// `publishedDate` comes as `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
/// Year and month precision are widened to the first day of the period.
pub fn normalize_published_date(raw: &str) -> String {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('-').collect();
    match parts.as_slice() {
        [year] if is_year(year) => format!("{year}-01-01"),
        [year, month] if is_year(year) && month.len() == 2 => format!("{year}-{month}-01"),
        _ => raw.to_string(),
    }
}

fn is_year(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

fn volume_info(item: &Value) -> &Value {
    item.get("volumeInfo").unwrap_or(&Value::Null)
}

fn full_title(info: &Value) -> String {
    let title = str_field(info, "title").unwrap_or_default();
    match str_field(info, "subtitle") {
        Some(subtitle) if !title.is_empty() => format!("{title}: {subtitle}"),
        _ => title,
    }
}

pub fn to_candidate(item: &Value) -> Candidate {
    let info = volume_info(item);
    Candidate {
        id: id_field(item, "id"),
        title: str_field(info, "title").unwrap_or_default(),
        release_date: str_field(info, "publishedDate").map(|d| normalize_published_date(&d)),
        popularity: count_field(info, "ratingsCount").map(PopularitySignal::RatingCount),
        raw: item.clone(),
    }
}

pub fn to_record(item: &Value) -> MediaRecord {
    let info = volume_info(item);
    let cover = info.get("imageLinks").and_then(|links| {
        str_field(links, "large")
            .or_else(|| str_field(links, "medium"))
            .or_else(|| str_field(links, "thumbnail"))
    });

    MediaRecord {
        title: full_title(info),
        release_date: str_field(info, "publishedDate").map(|d| normalize_published_date(&d)),
        cover_url: cover.map(|url| url.replacen("http://", "https://", 1)),
        genres: strings(info, "categories"),
        writers: strings(info, "authors"),
        publishers: str_field(info, "publisher").into_iter().collect(),
        synopsis: str_field(info, "description"),
        rating: info.get("averageRating").and_then(Value::as_f64),
        pages: count_field(info, "pageCount"),
        ..Default::default()
    }
}
