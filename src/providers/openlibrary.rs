//! Open Library search (books). First stop for book entries; no key needed.

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Candidate, MediaRecord, PopularitySignal};
use crate::providers::http::HttpClient;
use crate::providers::{count_field, str_field, strings};

pub const BASE_URL: &str = "https://openlibrary.org";
const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";
const SEARCH_LIMIT: usize = 10;
const MAX_SUBJECTS: usize = 5;

pub struct OpenLibraryClient {
    http: HttpClient,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Search docs carry everything `to_record` needs, so there is no details call.
    pub fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let url = format!(
            "{}/search.json?q={}&limit={SEARCH_LIMIT}",
            self.base_url,
            urlencoding::encode(query)
        );
        let body: Value = self.http.get_json(&url, HeaderMap::new())?;
        Ok(body
            .get("docs")
            .and_then(Value::as_array)
            .map(|docs| docs.iter().map(to_candidate).collect())
            .unwrap_or_default())
    }
}

/// `first_publish_year` is widened to January 1st of that year.
pub fn to_candidate(doc: &Value) -> Candidate {
    Candidate {
        id: str_field(doc, "key"),
        title: str_field(doc, "title").unwrap_or_default(),
        release_date: doc
            .get("first_publish_year")
            .and_then(Value::as_i64)
            .map(|year| format!("{year:04}-01-01")),
        popularity: count_field(doc, "ratings_count").map(PopularitySignal::RatingCount),
        raw: doc.clone(),
    }
}

pub fn to_record(doc: &Value) -> MediaRecord {
    let mut genres = strings(doc, "subject");
    genres.truncate(MAX_SUBJECTS);

    MediaRecord {
        title: str_field(doc, "title").unwrap_or_default(),
        release_date: to_candidate(doc).release_date,
        cover_url: doc
            .get("cover_i")
            .and_then(Value::as_i64)
            .map(|id| format!("{COVERS_URL}/{id}-L.jpg")),
        genres,
        writers: strings(doc, "author_name"),
        publishers: strings(doc, "publisher").into_iter().take(1).collect(),
        synopsis: str_field(doc, "first_sentence")
            .or_else(|| {
                doc.get("first_sentence")
                    .and_then(Value::as_array)
                    .and_then(|a| a.first())
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
            }),
        rating: doc.get("ratings_average").and_then(Value::as_f64),
        pages: count_field(doc, "number_of_pages_median"),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn dune_doc() -> Value {
        json!({
            "key": "/works/OL893415W",
            "title": "Dune",
            "first_publish_year": 1965,
            "author_name": ["Frank Herbert"],
            "subject": ["Science fiction", "Dune (Imaginary place)", "Fiction"],
            "publisher": ["Chilton Books", "Ace"],
            "cover_i": 11481354,
            "number_of_pages_median": 604,
            "ratings_average": 4.26,
            "ratings_count": 1284,
            "first_sentence": ["In the week before their departure to Arrakis..."]
        })
    }

    #[test]
    fn test_year_becomes_january_first() {
        let c = to_candidate(&dune_doc());
        assert_eq!(c.id.as_deref(), Some("/works/OL893415W"));
        assert_eq!(c.release_date.as_deref(), Some("1965-01-01"));
        assert_eq!(c.popularity, Some(PopularitySignal::RatingCount(1284)));

        let undated = to_candidate(&json!({"title": "Notes"}));
        assert_eq!(undated.release_date, None);
        assert_eq!(undated.popularity, None);
    }

    #[test]
    fn test_to_record() {
        let record = to_record(&dune_doc());
        assert_eq!(record.writers, vec!["Frank Herbert"]);
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/11481354-L.jpg")
        );
        assert_eq!(record.pages, Some(604));
        assert_eq!(record.rating, Some(4.26));
        assert_eq!(record.publishers, vec!["Chilton Books"]);
        assert_eq!(record.genres.len(), 3);
        assert!(record.synopsis.unwrap().starts_with("In the week"));
    }

    #[test]
    fn test_search_reads_docs() {
        let mut server = Server::new();
        let _m = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "dune".into()),
                Matcher::UrlEncoded("limit".into(), "10".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"numFound": 2, "docs": [
                {"key": "/works/OL893415W", "title": "Dune", "first_publish_year": 1965},
                {"key": "/works/OL893416W", "title": "Dune Messiah", "first_publish_year": 1969}
            ]}"#)
            .create();

        let http = HttpClient::new("openlibrary", "media-sync-test").unwrap();
        let client = OpenLibraryClient::with_base_url(http, &server.url());
        let docs = client.search("dune").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].release_date.as_deref(), Some("1969-01-01"));
    }
}
