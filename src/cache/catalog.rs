use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::read_json_or_default;
use crate::classify::video::video_ref;

/// An uploaded thumbnail on the CDN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogEntry {
    #[serde(alias = "url")]
    pub cdn_url: String,
    pub original_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub uploaded_at: Option<String>,
}

/// `catalog.json`: `platform-videoId` → uploaded image. Read-only here.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Self {
        let entries: BTreeMap<String, CatalogEntry> = read_json_or_default(path);
        debug!("Catalog: {} entries from {}", entries.len(), path.display());
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    /// CDN image for a video URL, if one was uploaded.
    pub fn image_for(&self, url: &str) -> Option<&str> {
        let video = video_ref(url)?;
        self.get(&video.catalog_key())
            .map(|e| e.cdn_url.as_str())
            .filter(|u| !u.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
