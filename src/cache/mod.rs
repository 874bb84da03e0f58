pub mod catalog;
pub mod incremental;
pub mod progress;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

/// Open Graph style metadata for one URL, as stored in the cache file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachedMetadata {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub site_name: String,
    pub favicon: String,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CachedMetadata {
    /// Record used when nothing could be fetched: the hostname as title, or the
    /// raw URL when it does not parse.
    pub fn fallback(url: &str, error: Option<String>) -> Self {
        Self {
            title: hostname(url).unwrap_or_else(|| url.to_string()),
            fetched_at: Utc::now(),
            error,
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Host without a leading `www.`.
pub fn hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

/// URL-keyed metadata store backed by one JSON file.
///
/// Assumes a single writer process: concurrent runs against the same file
/// lose whichever write lands first.
#[derive(Debug)]
pub struct MetadataCache {
    path: PathBuf,
    entries: BTreeMap<String, CachedMetadata>,
    max_age: Option<Duration>,
    dirty: bool,
}

impl MetadataCache {
    /// Load the cache file. Unreadable or malformed files start an empty cache.
    pub fn load(path: &Path, max_age_days: Option<i64>) -> Self {
        let entries: BTreeMap<String, CachedMetadata> = read_json_or_default(path);
        info!("Metadata cache: {} entries from {}", entries.len(), path.display());
        Self {
            path: path.to_path_buf(),
            entries,
            max_age: max_age_days.map(Duration::days),
            dirty: false,
        }
    }

    /// In-memory cache that is never written anywhere.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            entries: BTreeMap::new(),
            max_age: None,
            dirty: false,
        }
    }

    pub fn get(&self, url: &str) -> Option<&CachedMetadata> {
        self.entries.get(url)
    }

    /// Like `get`, but entries past the max age count as missing.
    pub fn get_fresh(&self, url: &str) -> Option<&CachedMetadata> {
        self.get(url).filter(|m| !self.is_stale(m))
    }

    pub fn put(&mut self, url: &str, data: CachedMetadata) {
        self.entries.insert(url.to_string(), data);
        self.dirty = true;
    }

    pub fn is_stale(&self, meta: &CachedMetadata) -> bool {
        match self.max_age {
            Some(age) => Utc::now() - meta.fetched_at > age,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CachedMetadata)> {
        self.entries.iter()
    }

    /// Rewrite the cache file if anything changed since the last save.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty || self.path.as_os_str().is_empty() {
            return Ok(());
        }
        write_json_atomic(&self.path, &self.entries)?;
        debug!("Saved {} cache entries to {}", self.entries.len(), self.path.display());
        self.dirty = false;
        Ok(())
    }
}

/// Read a JSON file, falling back to `T::default()` with a warning.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from));
    match parsed {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring unreadable cache {}: {}", path.display(), e);
            T::default()
        }
    }
}

/// Pretty-print JSON to `path` through a temp file and rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json + "\n").with_context(|| format!("Failed to write {:?}", tmp))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
    Ok(())
}

// ── Tests ──
