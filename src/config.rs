use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "pinboard.toml";
const ENV_PREFIX: &str = "PINBOARD";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pins_dir: PathBuf,
    pub collections_dir: PathBuf,
    pub output_path: PathBuf,
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub metadata_path: PathBuf,
    pub incremental_path: PathBuf,
    pub catalog_path: PathBuf,
    pub progress_path: PathBuf,
    /// Entries older than this are re-fetched. `None` keeps entries forever.
    pub max_age_days: Option<i64>,
    pub cache_failures: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub delay_ms: u64,
    pub user_agent: String,
    pub youtube_oembed_url: String,
    pub vimeo_oembed_url: String,
    pub youtube_thumbnail_url: String,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pins_dir: PathBuf::from("pins"),
            collections_dir: PathBuf::from("collections"),
            output_path: PathBuf::from("data/pins.json"),
            cache: CacheSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            metadata_path: PathBuf::from("data/og-cache.json"),
            incremental_path: PathBuf::from("data/pins-processed.json"),
            catalog_path: PathBuf::from("data/catalog.json"),
            progress_path: PathBuf::from("data/backfill-progress.json"),
            max_age_days: None,
            cache_failures: false,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            delay_ms: 500,
            user_agent: BROWSER_USER_AGENT.to_string(),
            youtube_oembed_url: "https://www.youtube.com/oembed".to_string(),
            vimeo_oembed_url: "https://vimeo.com/api/oembed.json".to_string(),
            youtube_thumbnail_url: "https://i.ytimg.com/vi".to_string(),
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            jitter_ms: 250,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Settings {
    /// Layer defaults, the config file and `PINBOARD_*` environment variables.
    ///
    /// An explicit `path` must exist; the default `pinboard.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let settings = Config::builder()
            .add_source(File::from(file.as_path()).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load settings from {:?}", file))?;

        settings
            .try_deserialize()
            .context("Invalid settings (check pinboard.toml and PINBOARD_* variables)")
    }
}
