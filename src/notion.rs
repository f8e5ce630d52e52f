//! Notion database access: reading tracked entries and writing records back.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};

use crate::error::{Result, SyncError};
use crate::models::{MediaRecord, MediaType, TrackedEntry};
use crate::providers::http::HttpClient;

pub const BASE_URL: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";

const PAGE_SIZE: usize = 100;
const MAX_RICH_TEXT_CHARS: usize = 2000;
const FINAL_STATUSES: [&str; 3] = ["Released", "Ended", "Canceled"];
const NOT_AVAILABLE: &str = "Not available";

/// What `upsert` did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Updated(String),
    Created(String),
}

pub struct NotionClient {
    http: HttpClient,
    base_url: String,
    database_id: String,
    headers: HeaderMap,
}

impl NotionClient {
    pub fn new(http: HttpClient, token: &str, database_id: &str) -> Result<Self> {
        Self::with_base_url(http, token, database_id, BASE_URL)
    }

    pub fn with_base_url(
        http: HttpClient,
        token: &str,
        database_id: &str,
        base_url: &str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| SyncError::Auth("notion".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            HeaderName::from_static("notion-version"),
            HeaderValue::from_static(NOTION_VERSION),
        );
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            database_id: database_id.to_string(),
            headers,
        })
    }

    fn query_url(&self) -> String {
        format!("{}/databases/{}/query", self.base_url, self.database_id)
    }

    /// Every entry in the database that is due for a sync, across all pages.
    pub fn query_entries(&self) -> Result<Vec<TrackedEntry>> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let response: Value = self
                .http
                .post_json(&self.query_url(), self.headers.clone(), &body)?;
            pages += 1;

            if let Some(results) = response.get("results").and_then(Value::as_array) {
                entries.extend(results.iter().filter_map(entry_from_page));
            }

            let has_more = response.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            cursor = response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            if !has_more || cursor.is_none() {
                break;
            }
        }

        tracing::debug!(pages, entries = entries.len(), "queried notion database");
        Ok(entries)
    }

    /// Id of the first page whose Name equals `title` exactly.
    pub fn find_page_by_title(&self, title: &str) -> Result<Option<String>> {
        let body = json!({
            "filter": { "property": "Name", "title": { "equals": title } }
        });
        let response: Value = self
            .http
            .post_json(&self.query_url(), self.headers.clone(), &body)?;
        Ok(response
            .get("results")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
            .and_then(|page| page.get("id"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned))
    }

    fn update_page(&self, page_id: &str, payload: &Value) -> Result<()> {
        let url = format!("{}/pages/{}", self.base_url, page_id);
        let _: Value = self.http.patch_json(&url, self.headers.clone(), payload)?;
        Ok(())
    }

    fn create_page(&self, payload: &Value) -> Result<String> {
        let url = format!("{}/pages", self.base_url);
        let mut body = payload.clone();
        body["parent"] = json!({ "database_id": self.database_id });
        let created: Value = self.http.post_json(&url, self.headers.clone(), &body)?;
        Ok(created
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Write `record`: to `page_id` when known, else to the page with the same
    /// title, else to a new page.
    pub fn upsert(
        &self,
        record: &MediaRecord,
        media_type: MediaType,
        page_id: Option<&str>,
    ) -> Result<Upsert> {
        let payload = page_payload(record, media_type);

        let existing = match page_id {
            Some(id) if !id.is_empty() => Some(id.to_string()),
            _ => self.find_page_by_title(&record.title)?,
        };

        match existing {
            Some(id) => {
                self.update_page(&id, &payload)?;
                tracing::info!(title = %record.title, %media_type, "updated in notion");
                Ok(Upsert::Updated(id))
            }
            None => {
                let id = self.create_page(&payload)?;
                tracing::info!(title = %record.title, %media_type, "added to notion");
                Ok(Upsert::Created(id))
            }
        }
    }
}

// ============================================================================
// Reading Entries
// ============================================================================

/// A property value, treating JSON `null` like a missing key.
fn prop<'a>(properties: &'a Value, name: &str, kind: &str) -> Option<&'a Value> {
    properties
        .get(name)
        .and_then(|p| p.get(kind))
        .filter(|v| !v.is_null())
}

fn select_name<'a>(properties: &'a Value, name: &str) -> Option<&'a str> {
    prop(properties, name, "select")
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
}

/// Whether an entry should be refreshed.
///
/// Entries with a type whose status is not final (or missing) always are.
/// Otherwise the `Update` select decides, and an unset `Update` means yes.
pub fn needs_update(properties: &Value) -> bool {
    let has_type = prop(properties, "Type", "select").is_some();
    let status = prop(properties, "Status", "select");

    if has_type {
        let still_changing = match status {
            Some(s) => {
                let name = s.get("name").and_then(Value::as_str).unwrap_or_default();
                !FINAL_STATUSES.contains(&name)
            }
            None => true,
        };
        if still_changing {
            return true;
        }
    }

    match prop(properties, "Update", "select") {
        Some(update) => update.get("name").and_then(Value::as_str) == Some("Yes"),
        None => true,
    }
}

/// Tracked entry for a database page, or `None` if it is untitled or not due.
pub fn entry_from_page(page: &Value) -> Option<TrackedEntry> {
    let properties = page.get("properties")?;
    let first_title = prop(properties, "Name", "title")?.as_array()?.first()?;
    let title = first_title
        .pointer("/text/content")
        .or_else(|| first_title.get("plain_text"))
        .and_then(Value::as_str)?
        .to_string();

    if !needs_update(properties) {
        return None;
    }

    Some(TrackedEntry {
        title,
        media_type: select_name(properties, "Type").map(ToOwned::to_owned),
        release_date: prop(properties, "Release date", "date")
            .and_then(|d| d.get("start"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        page_id: page.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
    })
}

// ============================================================================
// Writing Records
// ============================================================================

fn rich_text(content: Option<&str>) -> Value {
    match content.filter(|c| !c.is_empty()) {
        Some(c) => {
            let clipped: String = c.chars().take(MAX_RICH_TEXT_CHARS).collect();
            json!({ "rich_text": [{ "text": { "content": clipped } }] })
        }
        None => json!({ "rich_text": [] }),
    }
}

/// Notion rejects commas in select option names.
fn multi_select(values: &[String]) -> Value {
    let options: Vec<Value> = values
        .iter()
        .map(|v| v.replace(',', ""))
        .filter(|v| !v.trim().is_empty())
        .map(|v| json!({ "name": v.trim() }))
        .collect();
    json!({ "multi_select": options })
}

fn date(start: Option<&str>) -> Value {
    match start.filter(|s| !s.is_empty()) {
        Some(s) => json!({ "date": { "start": s } }),
        None => json!({ "date": null }),
    }
}

fn files(url: Option<&str>) -> Value {
    match url.filter(|u| !u.is_empty()) {
        Some(u) => json!({
            "files": [{ "type": "external", "name": "Cover", "external": { "url": u } }]
        }),
        None => json!({ "files": [] }),
    }
}

fn number(n: Option<u64>) -> Value {
    json!({ "number": n.unwrap_or(0) })
}

/// Notion properties for a record of the given type.
pub fn properties_for(record: &MediaRecord, media_type: MediaType) -> Map<String, Value> {
    let mut props = Map::new();
    let year = record.year();
    let image = match media_type {
        MediaType::Game => record.background_url.as_deref().or(record.cover_url.as_deref()),
        _ => record.cover_url.as_deref(),
    };

    props.insert("Type".into(), json!({ "select": { "name": media_type.notion_name() } }));
    props.insert("Name".into(), json!({ "title": [{ "text": { "content": record.title } }] }));
    props.insert("Year".into(), json!({ "rich_text": [{ "text": { "content": year } }] }));
    props.insert("Image".into(), files(image));
    props.insert("Writer".into(), multi_select(&record.writers));
    props.insert("Genre".into(), multi_select(&record.genres));
    props.insert("Synopsis".into(), rich_text(record.synopsis.as_deref()));
    props.insert("Release date".into(), date(record.release_date.as_deref()));
    props.insert("Global Rating".into(), json!({ "number": record.rating.unwrap_or(0.0) }));

    match media_type {
        MediaType::Movie | MediaType::TvSeries => {
            let status = match record.status.as_deref() {
                Some(s) => json!({ "select": { "name": s } }),
                None => json!({ "select": null }),
            };
            let streaming = match &record.streaming {
                Some(services) => multi_select(services),
                None => multi_select(&[NOT_AVAILABLE.to_string()]),
            };
            props.insert("Status".into(), status);
            props.insert("Director".into(), multi_select(&record.directors));
            props.insert("Streaming".into(), streaming);
        }
        MediaType::Book => {
            props.insert("Episodes/pages".into(), number(record.pages));
        }
        MediaType::Game => {}
    }

    if media_type == MediaType::TvSeries {
        props.insert("Seasons".into(), number(record.seasons));
        props.insert("Episodes/pages".into(), number(record.episodes));
        props.insert("Last episode".into(), rich_text(record.last_episode.as_deref()));
        let next = record.next_episode.as_ref();
        props.insert(
            "Upcoming episode".into(),
            rich_text(next.map(|e| e.name.as_str())),
        );
        props.insert(
            "Next air date".into(),
            date(next.and_then(|e| e.air_date.as_deref())),
        );
    }

    props
}

/// Page body: properties plus the page cover when the record has one.
pub fn page_payload(record: &MediaRecord, media_type: MediaType) -> Value {
    let mut payload = json!({ "properties": properties_for(record, media_type) });
    if let Some(cover) = record.cover_url.as_deref().filter(|c| !c.is_empty()) {
        payload["cover"] = json!({ "type": "external", "external": { "url": cover } });
    }
    payload
}
