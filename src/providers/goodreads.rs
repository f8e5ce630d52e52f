//! Goodreads scraping, the last resort for books.
//!
//! Search result rows become candidates so the usual selector can pick one;
//! only the chosen book page is fetched, after a short random pause.

use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;

use crate::error::{Result, SyncError};
use crate::models::{Candidate, MediaRecord, PopularitySignal};
use crate::normalize::collapse_whitespace;
use crate::providers::http::HttpClient;

pub const BASE_URL: &str = "https://www.goodreads.com";

/// Pause before fetching a book page, in milliseconds.
const PAGE_DELAY_MS: RangeInclusive<u64> = 1000..=3000;

static PAGES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) pages").expect("valid regex"));
static PUBLISHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"published\s+(\d{4})").expect("valid regex"));
static RATINGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d,]+)\s+ratings?").expect("valid regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));
static EXPECTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)expected publication").expect("valid regex"));

pub struct GoodreadsClient {
    http: HttpClient,
    base_url: String,
    page_delay: Option<RangeInclusive<u64>>,
}

impl GoodreadsClient {
    /// `http` should carry a browser user agent.
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_delay: Some(PAGE_DELAY_MS),
        }
    }

    pub fn without_delay(mut self) -> Self {
        self.page_delay = None;
        self
    }

    pub fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let url = format!("{}/search?q={}", self.base_url, urlencoding::encode(query));
        let html = self.http.get_text(&url, HeaderMap::new())?;
        parse_search_rows(&html, &self.base_url)
    }

    /// Scrape the book page behind a search candidate.
    pub fn fetch_record(&self, candidate: &Candidate) -> Result<MediaRecord> {
        let url = candidate
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Parse("goodreads candidate without url".to_string()))?;

        if let Some(range) = &self.page_delay {
            let millis = rand::thread_rng().gen_range(range.clone());
            thread::sleep(Duration::from_millis(millis));
        }

        let html = self.http.get_text(url, HeaderMap::new())?;
        parse_book_page(&html)
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_selector(input: &str) -> Result<Selector> {
    Selector::parse(input).map_err(|e| SyncError::Parse(format!("invalid selector {input}: {e}")))
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn absolute_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{base_url}{href}")
    }
}

/// One candidate per search result row, in page order.
pub fn parse_search_rows(html: &str, base_url: &str) -> Result<Vec<Candidate>> {
    let row_selector = parse_selector(r#"tr[itemtype="http://schema.org/Book"]"#)?;
    let title_selector = parse_selector("a.bookTitle")?;
    let document = Html::parse_document(html);

    let mut candidates = Vec::new();
    for row in document.select(&row_selector) {
        let Some(link) = row.select(&title_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = element_text(&link);
        if title.is_empty() {
            continue;
        }

        let row_text = element_text(&row);
        let year = PUBLISHED_RE
            .captures(&row_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let ratings = RATINGS_RE
            .captures(&row_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok());
        let url = absolute_url(href, base_url);

        candidates.push(Candidate {
            id: Some(url.clone()),
            title: title.clone(),
            release_date: year.as_ref().map(|y| format!("{y}-01-01")),
            popularity: ratings.map(PopularitySignal::RatingCount),
            raw: json!({"url": url, "title": title, "published": year, "ratings": ratings}),
        });
    }
    Ok(candidates)
}

/// `First published July 16, 1965` → `1965-07-16`; a bare year → `YYYY-01-01`.
pub fn parse_publication(text: &str) -> Option<String> {
    let cleaned = text
        .replace("Expected publication", "")
        .replace("First published", "")
        .replace("Published", "");
    let cleaned = cleaned.trim();

    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%B %d, %Y") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    YEAR_RE
        .captures(cleaned)
        .and_then(|c| c.get(1))
        .map(|m| format!("{}-01-01", m.as_str()))
}

fn first_text(document: &Html, selector: &str) -> Result<Option<String>> {
    let selector = parse_selector(selector)?;
    Ok(document
        .select(&selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty()))
}

/// Scrape a Goodreads book page.
pub fn parse_book_page(html: &str) -> Result<MediaRecord> {
    let document = Html::parse_document(html);

    let title = first_text(&document, "h1.Text__title1")?
        .ok_or_else(|| SyncError::Parse("goodreads page without title".to_string()))?;
    let author = first_text(&document, "span.ContributorLink__name")?;
    let publication = first_text(&document, r#"[data-testid="publicationInfo"]"#)?;

    let synopsis = first_text(
        &document,
        "div.TruncatedContent__text div.DetailsLayoutRightParagraph__widthConstrained",
    )?
    .map(|s| s.strip_prefix("TBA").map(str::trim).unwrap_or(s.as_str()).to_string())
    .filter(|s| !s.is_empty());

    let genre_selector = parse_selector("span.BookPageMetadataSection__genreButton a.Button")?;
    let genres = document
        .select(&genre_selector)
        .map(|e| element_text(&e))
        .filter(|g| !g.is_empty())
        .collect();

    let pages = first_text(&document, r#"[data-testid="pagesFormat"]"#)?
        .and_then(|t| PAGES_RE.captures(&t)?.get(1)?.as_str().parse().ok());

    let rating = first_text(&document, "div.RatingStatistics__rating")?
        .and_then(|t| t.parse::<f64>().ok());

    let cover_selector = parse_selector(r#".ResponsiveImage, [role="presentation"]"#)?;
    let cover_url = document
        .select(&cover_selector)
        .next()
        .and_then(|e| e.value().attr("src"))
        .map(ToOwned::to_owned);

    let page_text = document.root_element().text().collect::<String>();
    let released = !EXPECTED_RE.is_match(&page_text);

    Ok(MediaRecord {
        title,
        release_date: publication.as_deref().and_then(parse_publication),
        cover_url,
        genres,
        writers: author.into_iter().collect(),
        synopsis,
        status: Some(if released { "Released" } else { "Upcoming" }.to_string()),
        rating,
        pages,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const SEARCH_HTML: &str = r#"
        <table class="tableList">
          <tr itemscope itemtype="http://schema.org/Book">
            <td>
              <a class="bookTitle" href="/book/show/44767458-dune"><span itemprop="name">Dune (Dune, #1)</span></a>
              <span class="greyText smallText uitext">4.27 avg rating — 1,482,512 ratings — published 1965</span>
            </td>
          </tr>
          <tr itemscope itemtype="http://schema.org/Book">
            <td>
              <a class="bookTitle" href="/book/show/106.Dune_Messiah"><span itemprop="name">Dune Messiah</span></a>
              <span class="greyText smallText uitext">3.89 avg rating — 312,004 ratings — published 1969</span>
            </td>
          </tr>
        </table>
    "#;

    const BOOK_HTML: &str = r#"
        <html><body>
          <img class="ResponsiveImage" src="https://images.gr-assets.com/dune.jpg" />
          <h1 class="Text__title1">Dune</h1>
          <span class="ContributorLink__name">Frank Herbert</span>
          <p data-testid="publicationInfo">First published August 1, 1965</p>
          <div class="TruncatedContent__text">
            <div class="DetailsLayoutRightParagraph__widthConstrained">TBA Set on the desert planet Arrakis.</div>
          </div>
          <span class="BookPageMetadataSection__genreButton"><a class="Button">Science Fiction</a></span>
          <span class="BookPageMetadataSection__genreButton"><a class="Button">Classics</a></span>
          <p data-testid="pagesFormat">658 pages, Paperback</p>
          <div class="RatingStatistics__rating">4.27</div>
        </body></html>
    "#;

    #[test]
    fn test_parse_search_rows() {
        let rows = parse_search_rows(SEARCH_HTML, BASE_URL).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Dune (Dune, #1)");
        assert_eq!(
            rows[0].id.as_deref(),
            Some("https://www.goodreads.com/book/show/44767458-dune")
        );
        assert_eq!(rows[0].release_date.as_deref(), Some("1965-01-01"));
        assert_eq!(rows[0].popularity, Some(PopularitySignal::RatingCount(1_482_512)));
        assert_eq!(rows[1].release_date.as_deref(), Some("1969-01-01"));
        assert_eq!(rows[1].raw["url"], "https://www.goodreads.com/book/show/106.Dune_Messiah");
    }

    #[test]
    fn test_parse_book_page() {
        let record = parse_book_page(BOOK_HTML).unwrap();
        assert_eq!(record.title, "Dune");
        assert_eq!(record.writers, vec!["Frank Herbert"]);
        assert_eq!(record.release_date.as_deref(), Some("1965-08-01"));
        assert_eq!(record.synopsis.as_deref(), Some("Set on the desert planet Arrakis."));
        assert_eq!(record.genres, vec!["Science Fiction", "Classics"]);
        assert_eq!(record.pages, Some(658));
        assert_eq!(record.rating, Some(4.27));
        assert_eq!(record.cover_url.as_deref(), Some("https://images.gr-assets.com/dune.jpg"));
        assert_eq!(record.status.as_deref(), Some("Released"));
    }

    #[test]
    fn test_expected_publication_is_upcoming() {
        let html = r#"<h1 class="Text__title1">Winds</h1>
            <p data-testid="publicationInfo">Expected publication 2031</p>"#;
        let record = parse_book_page(html).unwrap();
        assert_eq!(record.status.as_deref(), Some("Upcoming"));
        assert_eq!(record.release_date.as_deref(), Some("2031-01-01"));
    }

    #[test]
    fn test_page_without_title_is_error() {
        assert!(parse_book_page("<html><body></body></html>").is_err());
    }

    #[test]
    fn test_parse_publication() {
        assert_eq!(parse_publication("First published July 16, 1965").as_deref(), Some("1965-07-16"));
        assert_eq!(parse_publication("Published 2004").as_deref(), Some("2004-01-01"));
        assert_eq!(parse_publication("unknown"), None);
    }

    #[test]
    fn test_search_and_fetch_against_server() {
        let mut server = Server::new();
        let _search = server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::UrlEncoded("q".into(), "dune".into()))
            .with_status(200)
            .with_body(SEARCH_HTML)
            .create();
        let _book = server
            .mock("GET", "/book/show/44767458-dune")
            .with_status(200)
            .with_body(BOOK_HTML)
            .create();

        let http = HttpClient::new("goodreads", crate::providers::http::BROWSER_USER_AGENT).unwrap();
        let client = GoodreadsClient::with_base_url(http, &server.url()).without_delay();
        let rows = client.search("dune").unwrap();
        let record = client.fetch_record(&rows[0]).unwrap();
        assert_eq!(record.title, "Dune");
    }
}
