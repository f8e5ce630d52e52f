//! Metadata providers.
//!
//! Each provider module owns three things: a blocking client that fetches raw
//! JSON (or HTML), a `to_candidate` adapter that maps one raw search result
//! onto the canonical [`Candidate`](crate::models::Candidate) shape, and a
//! `to_record` mapping from the chosen result to a
//! [`MediaRecord`](crate::models::MediaRecord). The selector never sees raw
//! provider keys.

use serde_json::Value;

use crate::scoring::{DateCap, ScoringPolicy};

pub mod goodreads;
pub mod google_books;
pub mod http;
pub mod igdb;
pub mod openlibrary;
pub mod rawg;
pub mod tmdb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Tmdb,
    Igdb,
    Rawg,
    OpenLibrary,
    GoogleBooks,
    Goodreads,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::Tmdb,
        Provider::Igdb,
        Provider::Rawg,
        Provider::OpenLibrary,
        Provider::GoogleBooks,
        Provider::Goodreads,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Tmdb => "tmdb",
            Provider::Igdb => "igdb",
            Provider::Rawg => "rawg",
            Provider::OpenLibrary => "openlibrary",
            Provider::GoogleBooks => "google_books",
            Provider::Goodreads => "goodreads",
        }
    }

    pub fn from_name(name: &str) -> Option<Provider> {
        Provider::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Book sources mostly publish a year, so they get the wide horizon.
    pub fn date_cap(self) -> DateCap {
        match self {
            Provider::OpenLibrary | Provider::GoogleBooks | Provider::Goodreads => {
                DateCap::ThreeYears
            }
            Provider::Tmdb | Provider::Igdb | Provider::Rawg => DateCap::OneYear,
        }
    }

    pub fn policy(self) -> ScoringPolicy {
        ScoringPolicy::with_date_cap(self.date_cap())
    }
}

// ============================================================================
// JSON Helpers
// ============================================================================

/// Non-empty string field.
pub(crate) fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Provider id as a string, whether the provider sends a number or a string.
pub(crate) fn id_field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `[{"name": ..}, ..]` → names, skipping entries without one.
pub(crate) fn names(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| str_field(item, "name"))
                .collect()
        })
        .unwrap_or_default()
}

/// `["a", "b"]` → owned strings.
pub(crate) fn strings(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Non-negative count, accepting integer or float encodings.
pub(crate) fn count_field(v: &Value, key: &str) -> Option<u64> {
    let n = v.get(key)?;
    n.as_u64()
        .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_caps() {
        assert_eq!(Provider::Tmdb.date_cap().days(), 365);
        assert_eq!(Provider::Igdb.policy().date_cap, DateCap::OneYear);
        assert_eq!(Provider::OpenLibrary.date_cap().days(), 1095);
        assert_eq!(Provider::from_name("Google_Books"), Some(Provider::GoogleBooks));
        assert_eq!(Provider::from_name("imdb"), None);
    }

    #[test]
    fn test_json_helpers() {
        let v = json!({
            "id": 42,
            "key": "/works/OL1W",
            "title": "  ",
            "genres": [{"name": "Drama"}, {"id": 3}, {"name": "Crime"}],
            "tags": ["a", 1, "b"],
            "count": 12.0
        });
        assert_eq!(id_field(&v, "id").as_deref(), Some("42"));
        assert_eq!(id_field(&v, "key").as_deref(), Some("/works/OL1W"));
        assert_eq!(str_field(&v, "title"), None);
        assert_eq!(names(&v, "genres"), vec!["Drama", "Crime"]);
        assert_eq!(strings(&v, "tags"), vec!["a", "b"]);
        assert_eq!(count_field(&v, "count"), Some(12));
        assert_eq!(count_field(&v, "missing"), None);
    }
}
