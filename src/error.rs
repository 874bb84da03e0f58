use std::time::Duration;

use thiserror::Error;

/// Why a metadata fetch did not produce a usable document.
///
/// Never escapes the fetcher: it is folded into the `error` field of a
/// fallback record.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("rate limited by {url} (retry after {retry_after:?})")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("unexpected response body: {0}")]
    Body(String),
}

impl FetchError {
    /// Rate limits and transient server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited { .. } => true,
            FetchError::Status { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            FetchError::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
