use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {provider} (HTTP {status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("authentication failed for {0}")]
    Auth(String),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
