use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::HttpFetcher;
use crate::cache::CachedMetadata;
use crate::classify::video::{Platform, VideoRef};
use crate::error::FetchError;

/// YouTube thumbnail names, best quality first.
const YOUTUBE_QUALITIES: &[&str] = &[
    "maxresdefault",
    "sddefault",
    "hqdefault",
    "mqdefault",
    "default",
];
const VIMEO_THUMB_WIDTH: u32 = 1280;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OEmbed {
    title: String,
    description: String,
    author_name: String,
    provider_name: String,
    thumbnail_url: String,
}

/// Predictable YouTube thumbnail URLs in quality order.
pub fn thumbnail_candidates(base: &str, id: &str) -> Vec<String> {
    let base = base.trim_end_matches('/');
    YOUTUBE_QUALITIES
        .iter()
        .map(|q| format!("{}/{}/{}.jpg", base, id, q))
        .collect()
}

/// Metadata for a video from the platform's oEmbed endpoint and thumbnails.
pub async fn fetch_video(
    fetcher: &HttpFetcher,
    video: &VideoRef,
    url: &str,
) -> Result<CachedMetadata, FetchError> {
    match video.platform {
        Platform::YouTube => fetch_youtube(fetcher, video, url).await,
        Platform::Vimeo => fetch_vimeo(fetcher, url).await,
    }
}

async fn fetch_youtube(
    fetcher: &HttpFetcher,
    video: &VideoRef,
    url: &str,
) -> Result<CachedMetadata, FetchError> {
    let settings = fetcher.settings();
    let endpoint = oembed_url(&settings.youtube_oembed_url, url, &[("format", "json")])?;

    // Embedding can be disabled per video; thumbnails still exist then.
    let oembed = match fetcher.get_json::<OEmbed>(&endpoint).await {
        Ok(o) => Some(o),
        Err(e) => {
            debug!("YouTube oEmbed failed for {}: {}", url, e);
            None
        }
    };

    let thumbnail = best_thumbnail(fetcher, &settings.youtube_thumbnail_url, &video.id).await;
    if oembed.is_none() && thumbnail.is_none() {
        return Err(FetchError::Body(format!("no oEmbed or thumbnail for {}", video.id)));
    }

    let oembed = oembed.unwrap_or_default();
    let title = if oembed.title.is_empty() {
        format!("YouTube video {}", video.id)
    } else {
        oembed.title
    };

    Ok(CachedMetadata {
        title,
        description: oembed.author_name,
        image_url: thumbnail.unwrap_or(oembed.thumbnail_url),
        site_name: non_empty_or(oembed.provider_name, "YouTube"),
        favicon: "https://www.youtube.com/favicon.ico".to_string(),
        fetched_at: Utc::now(),
        error: None,
    })
}

async fn fetch_vimeo(fetcher: &HttpFetcher, url: &str) -> Result<CachedMetadata, FetchError> {
    let width = VIMEO_THUMB_WIDTH.to_string();
    let endpoint = oembed_url(&fetcher.settings().vimeo_oembed_url, url, &[("width", width.as_str())])?;
    let oembed: OEmbed = fetcher.get_json(&endpoint).await?;

    let description = if oembed.description.is_empty() {
        oembed.author_name
    } else {
        oembed.description
    };

    Ok(CachedMetadata {
        title: oembed.title,
        description,
        image_url: oembed.thumbnail_url,
        site_name: non_empty_or(oembed.provider_name, "Vimeo"),
        favicon: "https://vimeo.com/favicon.ico".to_string(),
        fetched_at: Utc::now(),
        error: None,
    })
}

/// First thumbnail candidate that answers a HEAD request.
async fn best_thumbnail(fetcher: &HttpFetcher, base: &str, id: &str) -> Option<String> {
    for candidate in thumbnail_candidates(base, id) {
        if fetcher.exists(&candidate).await {
            return Some(candidate);
        }
    }
    None
}

fn oembed_url(endpoint: &str, target: &str, extra: &[(&str, &str)]) -> Result<String, FetchError> {
    let mut url =
        url::Url::parse(endpoint).map_err(|_| FetchError::InvalidUrl(endpoint.to_string()))?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("url", target);
        for (k, v) in extra {
            q.append_pair(k, v);
        }
    }
    Ok(url.into())
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

// ── Tests ──
