use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static YOUTUBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtu\.be/|youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/))([A-Za-z0-9_-]{11})",
    )
    .unwrap()
});
static VIMEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"vimeo\.com/(?:video/|channels/[^/]+/|groups/[^/]+/videos/)?(\d+)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Vimeo,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Vimeo => "vimeo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "youtube" | "youtu.be" | "youtube.com" => Some(Platform::YouTube),
            "vimeo" | "vimeo.com" => Some(Platform::Vimeo),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A video on a known platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoRef {
    pub platform: Platform,
    pub id: String,
}

impl VideoRef {
    /// Key used by `catalog.json`, e.g. `vimeo-12345`.
    pub fn catalog_key(&self) -> String {
        format!("{}-{}", self.platform, self.id)
    }
}

pub fn youtube_id(url: &str) -> Option<String> {
    YOUTUBE_RE.captures(url).map(|c| c[1].to_string())
}

pub fn vimeo_id(url: &str) -> Option<String> {
    VIMEO_RE.captures(url).map(|c| c[1].to_string())
}

/// Identify the platform and id of a video URL.
pub fn video_ref(url: &str) -> Option<VideoRef> {
    if let Some(id) = youtube_id(url) {
        return Some(VideoRef {
            platform: Platform::YouTube,
            id,
        });
    }
    vimeo_id(url).map(|id| VideoRef {
        platform: Platform::Vimeo,
        id,
    })
}
