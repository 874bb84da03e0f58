pub mod slug;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::catalog::Catalog;
use crate::cache::{hostname, CachedMetadata, MetadataCache};
use crate::classify::{self, Origin};
use crate::fetch::MetadataSource;
use crate::parser::pins::RawPinEntry;

/// Display-ready pin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pin {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub notes: String,
    pub image_url: String,
    pub favicon: String,
    pub site_name: String,
    pub tags: Vec<String>,
    pub raw_tags: Vec<String>,
    pub collections: Vec<String>,
    pub metadata: BTreeMap<String, Vec<String>>,
    pub metadata_source: BTreeMap<String, Origin>,
    pub section: String,
    pub content_type: String,
    pub slug: String,
}

impl Pin {
    /// Plain tags, `key:value` metadata pairs and `type:<contentType>`.
    pub fn tag_set(&self) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = self.tags.iter().cloned().collect();
        for (key, values) in &self.metadata {
            for v in values {
                set.insert(format!("{}:{}", key, v));
            }
        }
        set.insert(format!("type:{}", self.content_type));
        set
    }
}

/// Everything the site build needs about pins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinsData {
    pub pins: Vec<Pin>,
    pub content_types: Vec<String>,
    pub all_tags: Vec<String>,
    pub user_tags: Vec<String>,
    pub sections: Vec<String>,
    pub metadata_keys: Vec<String>,
    /// Collection name → pin ids, in pin order.
    pub collections: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Never touch the network; misses get URL-derived defaults.
    pub offline: bool,
    /// Stop fetching after this many network fetches.
    pub fetch_limit: Option<usize>,
    /// Pause after each network fetch.
    pub delay: Duration,
    pub cache_failures: bool,
}

/// Folds raw entries, cached or fetched metadata and the catalog into pins.
pub struct Assembler<'a, S> {
    source: &'a S,
    cache: &'a mut MetadataCache,
    catalog: &'a Catalog,
    options: AssembleOptions,
    fetched: usize,
    misses: usize,
}

impl<'a, S: MetadataSource> Assembler<'a, S> {
    pub fn new(
        source: &'a S,
        cache: &'a mut MetadataCache,
        catalog: &'a Catalog,
        options: AssembleOptions,
    ) -> Self {
        Self {
            source,
            cache,
            catalog,
            options,
            fetched: 0,
            misses: 0,
        }
    }

    /// Number of network fetches issued so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Pins assembled without usable metadata (offline, over the limit, or failed).
    pub fn misses(&self) -> usize {
        self.misses
    }

    pub async fn assemble(&mut self, entry: &RawPinEntry) -> Pin {
        let meta = self.metadata_for(&entry.url).await;
        if meta.as_ref().map_or(true, CachedMetadata::is_error) {
            self.misses += 1;
        }
        build_pin(entry, meta.as_ref(), self.catalog)
    }

    /// Cached metadata, or a fetch on miss. `None` when fetching is off.
    async fn metadata_for(&mut self, url: &str) -> Option<CachedMetadata> {
        if let Some(hit) = self.cache.get_fresh(url) {
            return Some(hit.clone());
        }
        if self.options.offline {
            return None;
        }
        if self.options.fetch_limit.is_some_and(|limit| self.fetched >= limit) {
            debug!("Fetch limit reached, skipping {}", url);
            return None;
        }

        let meta = self.source.fetch(url).await;
        self.fetched += 1;

        // A failed refresh keeps the stale entry rather than the fallback
        let stale = if meta.is_error() {
            self.cache.get(url).filter(|m| !m.is_error()).cloned()
        } else {
            None
        };
        let meta = match stale {
            Some(stale) => {
                warn!("Refresh failed for {}, keeping cached metadata", url);
                stale
            }
            None => {
                if !meta.is_error() || self.options.cache_failures {
                    self.cache.put(url, meta.clone());
                }
                meta
            }
        };

        if !self.options.delay.is_zero() {
            tokio::time::sleep(self.options.delay).await;
        }
        Some(meta)
    }
}

/// Merge one entry with its metadata. Pure: same inputs, same pin.
pub fn build_pin(entry: &RawPinEntry, meta: Option<&CachedMetadata>, catalog: &Catalog) -> Pin {
    let c = classify::classify(&entry.raw_tags, &entry.url, meta);
    let m = meta.cloned().unwrap_or_default();

    let title = entry
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| non_empty(&m.title))
        .or_else(|| hostname(&entry.url))
        .unwrap_or_else(|| entry.url.clone());

    let description = non_empty(&m.description).unwrap_or_else(|| entry.notes.clone());

    let image_url = non_empty(&m.image_url)
        .or_else(|| catalog.image_for(&entry.url).map(String::from))
        .unwrap_or_default();

    Pin {
        id: slug::pin_id(&entry.url, &entry.section),
        url: entry.url.clone(),
        slug: slug::slug_for(&title, &entry.url),
        title,
        description,
        notes: entry.notes.clone(),
        image_url,
        favicon: m.favicon.trim().to_string(),
        site_name: m.site_name.trim().to_string(),
        tags: c.plain_tags.clone(),
        raw_tags: entry.raw_tags.clone(),
        collections: c.collections.clone(),
        content_type: c.content_type().to_string(),
        metadata: c.metadata,
        metadata_source: c.metadata_source,
        section: entry.section.clone(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Derive the vocabularies and collection membership from assembled pins.
pub fn aggregate(pins: Vec<Pin>) -> PinsData {
    let mut content_types = BTreeSet::new();
    let mut user_tags = BTreeSet::new();
    let mut all_tags = BTreeSet::new();
    let mut metadata_keys = BTreeSet::new();
    let mut sections: Vec<String> = Vec::new();
    let mut collections: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for pin in &pins {
        content_types.insert(pin.content_type.clone());
        user_tags.extend(pin.tags.iter().cloned());
        all_tags.extend(pin.tags.iter().cloned());
        for (key, values) in &pin.metadata {
            metadata_keys.insert(key.clone());
            all_tags.extend(values.iter().map(|v| format!("{}:{}", key, v)));
        }
        if !sections.contains(&pin.section) {
            sections.push(pin.section.clone());
        }
        for name in &pin.collections {
            collections.entry(name.clone()).or_default().push(pin.id.clone());
        }
    }

    PinsData {
        pins,
        content_types: content_types.into_iter().collect(),
        all_tags: all_tags.into_iter().collect(),
        user_tags: user_tags.into_iter().collect(),
        sections,
        metadata_keys: metadata_keys.into_iter().collect(),
        collections,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::parser::pins::parse_pins;

    /// Counts calls and returns canned metadata.
    #[derive(Default)]
    struct MockSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MetadataSource for MockSource {
        async fn fetch(&self, url: &str) -> CachedMetadata {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return CachedMetadata::fallback(url, Some("down".into()));
            }
            CachedMetadata {
                title: format!("Fetched {}", url),
                description: "From the network".into(),
                fetched_at: Utc::now(),
                ..CachedMetadata::default()
            }
        }
    }

    fn cached(title: &str) -> CachedMetadata {
        CachedMetadata {
            title: title.into(),
            image_url: "https://img.test/cover.jpg".into(),
            fetched_at: Utc::now(),
            ..CachedMetadata::default()
        }
    }

    async fn assemble_all(
        md: &str,
        source: &MockSource,
        cache: &mut MetadataCache,
        options: AssembleOptions,
    ) -> PinsData {
        let catalog = Catalog::default();
        let mut assembler = Assembler::new(source, cache, &catalog, options);
        let mut pins = Vec::new();
        for entry in parse_pins(md, "Pins") {
            pins.push(assembler.assemble(&entry).await);
        }
        aggregate(pins)
    }

    #[tokio::test]
    async fn vimeo_example_pin() {
        let source = MockSource::default();
        let mut cache = MetadataCache::in_memory();
        cache.put("https://vimeo.com/123", cached("Vimeo page title"));

        let data = assemble_all(
            "- [My Video](https://vimeo.com/123) #video #collection:favs",
            &source,
            &mut cache,
            AssembleOptions::default(),
        )
        .await;

        let pin = &data.pins[0];
        assert_eq!(pin.url, "https://vimeo.com/123");
        assert_eq!(pin.title, "My Video");
        assert_eq!(pin.tags, vec!["video"]);
        assert_eq!(pin.collections, vec!["favs"]);
        assert!(pin.metadata["type"].contains(&"video".to_string()));
        assert!(pin.metadata["source"].contains(&"vimeo".to_string()));
        assert_eq!(pin.content_type, "video");
        assert_eq!(pin.slug, "my-video");
        assert_eq!(pin.image_url, "https://img.test/cover.jpg");
        assert_eq!(data.collections["favs"], vec![pin.id.clone()]);
    }

    #[tokio::test]
    async fn cache_hits_never_fetch() {
        let source = MockSource::default();
        let mut cache = MetadataCache::in_memory();
        cache.put("https://a.test/", cached("A"));
        cache.put("https://b.test/", cached("B"));

        let data = assemble_all(
            "- https://a.test/\n- https://b.test/",
            &source,
            &mut cache,
            AssembleOptions::default(),
        )
        .await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(data.pins[0].title, "A");
        assert_eq!(data.pins[1].title, "B");
    }

    #[tokio::test]
    async fn misses_fetch_once_and_fill_cache() {
        let source = MockSource::default();
        let mut cache = MetadataCache::in_memory();

        let md = "- https://new.test/x\n- https://new.test/x #again";
        let data = assemble_all(md, &source, &mut cache, AssembleOptions::default()).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(data.pins[0].title, "Fetched https://new.test/x");
        assert_eq!(data.pins[0].description, "From the network");
        assert!(cache.get("https://new.test/x").is_some());
    }

    #[tokio::test]
    async fn failures_not_cached_by_default() {
        let source = MockSource {
            fail: true,
            ..MockSource::default()
        };
        let mut cache = MetadataCache::in_memory();
        let data = assemble_all(
            "- https://down.test/page\n  Notes survive",
            &source,
            &mut cache,
            AssembleOptions::default(),
        )
        .await;

        assert_eq!(data.pins[0].title, "down.test");
        assert_eq!(data.pins[0].description, "Notes survive");
        assert!(cache.get("https://down.test/page").is_none());

        let mut cache = MetadataCache::in_memory();
        let options = AssembleOptions {
            cache_failures: true,
            ..AssembleOptions::default()
        };
        assemble_all("- https://down.test/page", &source, &mut cache, options).await;
        assert!(cache.get("https://down.test/page").unwrap().is_error());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("og-cache.json");
        std::fs::write(
            &path,
            r#"{"https://blog.test/post":{"title":"Good Title","imageUrl":"https://img.test/a.jpg","fetchedAt":"2000-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        let mut cache = MetadataCache::load(&path, Some(30));
        assert!(cache.get_fresh("https://blog.test/post").is_none());

        let source = MockSource {
            fail: true,
            ..MockSource::default()
        };
        let options = AssembleOptions {
            cache_failures: true,
            ..AssembleOptions::default()
        };
        let catalog = Catalog::default();
        let entry = &parse_pins("- https://blog.test/post", "Pins")[0];
        let mut assembler = Assembler::new(&source, &mut cache, &catalog, options);
        let pin = assembler.assemble(entry).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pin.title, "Good Title");
        assert_eq!(pin.image_url, "https://img.test/a.jpg");
        assert_eq!(assembler.misses(), 0);
        assert!(!cache.get("https://blog.test/post").unwrap().is_error());
    }

    #[tokio::test]
    async fn offline_and_limits() {
        let source = MockSource::default();
        let mut cache = MetadataCache::in_memory();
        let offline = AssembleOptions {
            offline: true,
            ..AssembleOptions::default()
        };
        let data = assemble_all("- https://x.test/a", &source, &mut cache, offline).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(data.pins[0].title, "x.test");

        let limited = AssembleOptions {
            fetch_limit: Some(1),
            ..AssembleOptions::default()
        };
        assemble_all("- https://x.test/a\n- https://x.test/b", &source, &mut cache, limited).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn assembling_twice_is_identical() {
        let md = std::fs::read_to_string("tests/fixtures/reading-list.md").unwrap();
        let source = MockSource::default();
        let mut cache = MetadataCache::in_memory();

        let first = assemble_all(&md, &source, &mut cache, AssembleOptions::default()).await;
        let second = assemble_all(&md, &source, &mut cache, AssembleOptions::default()).await;

        assert_eq!(first.content_types, second.content_types);
        assert_eq!(first.all_tags, second.all_tags);
        assert_eq!(first.sections, second.sections);
        assert_eq!(first.metadata_keys, second.metadata_keys);
        assert_eq!(first.pins, second.pins);
    }

    #[test]
    fn vocabularies() {
        let entries = parse_pins(
            "## Music\n- https://open.spotify.com/album/x #chill #collection:mix\n## Code\n- https://github.com/a/b #rust #chill",
            "Pins",
        );
        let pins: Vec<Pin> = entries
            .iter()
            .map(|e| build_pin(e, None, &Catalog::default()))
            .collect();
        let data = aggregate(pins);

        assert_eq!(data.content_types, vec!["code", "music"]);
        assert_eq!(data.user_tags, vec!["chill", "rust"]);
        assert_eq!(data.sections, vec!["Music", "Code"]);
        assert_eq!(data.metadata_keys, vec!["contentType", "source", "type"]);
        assert!(data.all_tags.contains(&"source:spotify".to_string()));
        assert!(data.all_tags.contains(&"chill".to_string()));
        assert_eq!(data.collections.len(), 1);
    }
}
