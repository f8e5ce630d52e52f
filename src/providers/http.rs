use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SyncError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Desktop browser user agent; Goodreads serves an empty page to unknown agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

// ============================================================================
// HttpClient
// ============================================================================

/// Thin blocking client shared by every provider.
///
/// Non-2xx responses become [`SyncError::Api`] tagged with the provider name.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    provider: &'static str,
}

impl HttpClient {
    pub fn new(provider: &'static str, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .build()?;
        Ok(Self { client, provider })
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::Api {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    pub fn get_text(&self, url: &str, headers: HeaderMap) -> Result<String> {
        Ok(self.send(self.client.get(url).headers(headers))?.text()?)
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str, headers: HeaderMap) -> Result<T> {
        let text = self.get_text(url, headers)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
    ) -> Result<T> {
        let text = self
            .send(self.client.post(url).headers(headers).json(body))?
            .text()?;
        Ok(serde_json::from_str(&text)?)
    }

    /// POST a raw text body (IGDB's query language) and parse JSON back.
    pub fn post_text<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: String,
    ) -> Result<T> {
        let text = self
            .send(self.client.post(url).headers(headers).body(body))?
            .text()?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
    ) -> Result<T> {
        let text = self
            .send(self.client.patch(url).headers(headers).json(body))?
            .text()?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::Value;

    #[test]
    fn test_get_json_success() {
        let mut server = Server::new();
        let _m = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"answer": 42}"#)
            .create();

        let client = HttpClient::new("test", "media-sync-test").unwrap();
        let v: Value = client
            .get_json(&format!("{}/ok", server.url()), HeaderMap::new())
            .unwrap();
        assert_eq!(v["answer"], 42);
    }

    #[test]
    fn test_non_success_is_api_error() {
        let mut server = Server::new();
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("nope")
            .create();

        let client = HttpClient::new("test", "media-sync-test").unwrap();
        let err = client
            .get_json::<Value>(&format!("{}/missing", server.url()), HeaderMap::new())
            .unwrap_err();
        match err {
            SyncError::Api { provider, status, body } => {
                assert_eq!(provider, "test");
                assert_eq!(status, 404);
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
