pub mod og;
pub mod retry;
pub mod video;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::cache::CachedMetadata;
use crate::classify::video::video_ref;
use crate::config::FetchSettings;
use crate::error::FetchError;
use retry::{parse_retry_after, RetryPolicy};

/// Anything that can produce metadata for a URL. Implementations never fail:
/// problems come back as a fallback record with `error` set.
pub trait MetadataSource {
    async fn fetch(&self, url: &str) -> CachedMetadata;
}

/// Live fetcher: oEmbed for video platforms, Open Graph scraping otherwise.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    settings: FetchSettings,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            settings: settings.clone(),
            retry: RetryPolicy::from(&settings.retry),
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    async fn try_fetch(&self, url: &str) -> Result<CachedMetadata, FetchError> {
        let page = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if !matches!(page.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        if let Some(video) = video_ref(url) {
            match video::fetch_video(self, &video, url).await {
                Ok(meta) => return Ok(meta),
                Err(e) => debug!("{} endpoint failed for {} ({}), scraping page", video.platform, url, e),
            }
        }

        match self.get_html(url).await? {
            Some(html) => Ok(og::extract(&html, &page)),
            None => {
                debug!("{} is not an HTML page, using URL defaults", url);
                Ok(CachedMetadata::fallback(url, None))
            }
        }
    }

    /// GET a page body. Non-HTML responses (media, PDFs) are dropped unread.
    async fn get_html(&self, url: &str) -> Result<Option<String>, FetchError> {
        let client = &self.client;
        self.retry
            .run(url, move || async move {
                let response = client.get(url).send().await?;
                let response = check_status(url, response)?;
                let body = if is_html(response.headers()) {
                    Some(response.text().await?)
                } else {
                    None
                };
                Ok::<_, FetchError>(body)
            })
            .await
    }

    /// GET a body as text, with the shared retry policy.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let client = &self.client;
        self.retry
            .run(url, move || async move {
                let response = client.get(url).send().await?;
                let response = check_status(url, response)?;
                Ok::<_, FetchError>(response.text().await?)
            })
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Body(e.to_string()))
    }

    /// Whether a HEAD request to `url` succeeds.
    pub async fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }
}

impl MetadataSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> CachedMetadata {
        match self.try_fetch(url).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                CachedMetadata::fallback(url, Some(e.to_string()))
            }
        }
    }
}

/// Missing `Content-Type` is treated as HTML.
fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
}

fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(FetchError::RateLimited {
            url: url.to_string(),
            retry_after,
        });
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

// ── Tests ──
