use std::path::PathBuf;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::cache::catalog::Catalog;
use crate::cache::progress::{Progress, ProgressFile};
use crate::cache::{CachedMetadata, MetadataCache};
use crate::classify::video::{video_ref, Platform, VideoRef};
use crate::config::Settings;
use crate::fetch::video::fetch_video;
use crate::fetch::HttpFetcher;
use crate::parser;

pub const DEFAULT_CHECKPOINT_EVERY: usize = 25;

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub domain: Option<Platform>,
    pub limit: Option<usize>,
    pub targets: Vec<PathBuf>,
    pub dry_run: bool,
    /// Ignore the saved checkpoint.
    pub restart: bool,
    pub checkpoint_every: usize,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            domain: None,
            limit: None,
            targets: Vec::new(),
            dry_run: false,
            restart: false,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
        }
    }
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub candidates: usize,
    pub resumed_at: usize,
    pub skipped: usize,
    pub progress: Progress,
}

impl BackfillReport {
    pub fn print(&self) {
        println!(
            "Backfill: {} video pins, resumed at {}, {} already had images.",
            self.candidates, self.resumed_at, self.skipped
        );
        println!(
            "Processed {} ({} updated, {} failed){}.",
            self.progress.processed,
            self.progress.updated,
            self.progress.failed,
            if self.progress.completed { ", complete" } else { "" }
        );
    }
}

/// Every video URL in the pins files, in document order, without duplicates.
fn video_candidates(
    settings: &Settings,
    options: &BackfillOptions,
) -> Result<Vec<(String, VideoRef)>> {
    let files = if options.targets.is_empty() {
        parser::markdown_files(&settings.pins_dir)?
    } else {
        options.targets.clone()
    };

    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();
    for file in parser::parse_files(&files)? {
        for entry in file.entries {
            let Some(video) = video_ref(&entry.url) else {
                continue;
            };
            if options.domain.is_some_and(|d| d != video.platform) {
                continue;
            }
            if seen.insert(entry.url.clone()) {
                candidates.push((entry.url, video));
            }
        }
    }
    Ok(candidates)
}

fn has_image(cache: &MetadataCache, catalog: &Catalog, url: &str) -> bool {
    cache.get(url).is_some_and(|m| !m.image_url.is_empty()) || catalog.image_for(url).is_some()
}

/// Keep what the cache already knew; take the thumbnail and fill blanks.
fn merge(existing: Option<&CachedMetadata>, fetched: CachedMetadata) -> CachedMetadata {
    let Some(old) = existing.filter(|m| !m.is_error()) else {
        return fetched;
    };
    let pick = |old: &str, new: String| if old.is_empty() { new } else { old.to_string() };
    CachedMetadata {
        title: pick(&old.title, fetched.title),
        description: pick(&old.description, fetched.description),
        site_name: pick(&old.site_name, fetched.site_name),
        favicon: pick(&old.favicon, fetched.favicon),
        image_url: fetched.image_url,
        fetched_at: fetched.fetched_at,
        error: None,
    }
}

/// Fetch missing video thumbnails one by one, checkpointing as it goes so an
/// interrupted run picks up where it stopped.
pub async fn run(
    settings: &Settings,
    fetcher: &HttpFetcher,
    options: &BackfillOptions,
) -> Result<BackfillReport> {
    let candidates = video_candidates(settings, options)?;
    let mut cache = MetadataCache::load(&settings.cache.metadata_path, settings.cache.max_age_days);
    let catalog = Catalog::load(&settings.cache.catalog_path);
    let progress_file = ProgressFile::new(&settings.cache.progress_path);

    let mut progress = if options.restart {
        Progress::default()
    } else {
        progress_file.resume()
    };
    if progress.total != candidates.len() && progress.last_index > 0 {
        warn!(
            "Pin list changed since the last checkpoint ({} → {} videos), starting over",
            progress.total,
            candidates.len()
        );
        progress = Progress::default();
    }
    progress.total = candidates.len();

    let mut report = BackfillReport {
        candidates: candidates.len(),
        resumed_at: progress.last_index,
        ..BackfillReport::default()
    };
    info!(
        "{} video pins, starting at {}",
        candidates.len(),
        progress.last_index
    );

    let checkpoint_every = options.checkpoint_every.max(1);
    let pb = ProgressBar::new(candidates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );
    pb.set_position(progress.last_index as u64);

    let mut done_this_run = 0usize;
    let start = progress.last_index;
    for (i, (url, video)) in candidates.iter().enumerate().skip(start) {
        if options.limit.is_some_and(|l| done_this_run >= l) {
            info!("Limit reached after {} videos", done_this_run);
            break;
        }

        if has_image(&cache, &catalog, url) {
            report.skipped += 1;
            progress.last_index = i + 1;
            pb.inc(1);
            continue;
        }

        if options.dry_run {
            pb.suspend(|| println!("would fetch {} ({})", url, video.catalog_key()));
            done_this_run += 1;
            progress.last_index = i + 1;
            pb.inc(1);
            continue;
        }

        match fetch_video(fetcher, video, url).await {
            Ok(meta) if !meta.image_url.is_empty() => {
                debug!("{} → {}", url, meta.image_url);
                let merged = merge(cache.get(url), meta);
                cache.put(url, merged);
                progress.updated += 1;
            }
            Ok(_) => {
                warn!("No thumbnail for {}", url);
                progress.failed += 1;
            }
            Err(e) => {
                warn!("Thumbnail fetch failed for {}: {}", url, e);
                progress.failed += 1;
            }
        }

        done_this_run += 1;
        progress.processed += 1;
        progress.last_index = i + 1;
        pb.inc(1);

        if progress.processed % checkpoint_every == 0 {
            progress_file.save(&mut progress)?;
            cache.save()?;
            debug!("Checkpoint at {}", progress.last_index);
        }

        tokio::time::sleep(settings.fetch.delay()).await;
    }
    pb.finish_and_clear();

    progress.completed = progress.last_index >= candidates.len();
    if !options.dry_run {
        progress_file.save(&mut progress)?;
        cache.save()?;
    }

    report.progress = progress;
    Ok(report)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::Utc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn site(root: &Path, server: &MockServer) -> Settings {
        let mut s = Settings::default();
        s.pins_dir = root.join("pins");
        s.cache.metadata_path = root.join("og-cache.json");
        s.cache.catalog_path = root.join("catalog.json");
        s.cache.progress_path = root.join("progress.json");
        s.fetch.delay_ms = 0;
        s.fetch.retry.base_delay_ms = 1;
        s.fetch.retry.jitter_ms = 0;
        s.fetch.vimeo_oembed_url = format!("{}/api/oembed.json", server.uri());
        s.fetch.youtube_oembed_url = format!("{}/oembed", server.uri());
        s.fetch.youtube_thumbnail_url = format!("{}/vi", server.uri());
        std::fs::create_dir_all(&s.pins_dir).unwrap();
        s
    }

    async fn mock_vimeo(server: &MockServer, id: &str) {
        Mock::given(method("GET"))
            .and(path("/api/oembed.json"))
            .and(query_param("url", format!("https://vimeo.com/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": format!("Video {}", id),
                "thumbnail_url": format!("https://i.vimeocdn.com/{}.jpg", id)
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fills_missing_thumbnails_and_completes() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path(), &server);
        std::fs::write(
            settings.pins_dir.join("videos.md"),
            "- [One](https://vimeo.com/1)\n- [Two](https://vimeo.com/2)\n- [Three](https://vimeo.com/3)\n- [Site](https://example.com)\n",
        )
        .unwrap();
        std::fs::write(
            &settings.cache.catalog_path,
            r#"{"vimeo-3": {"cdnUrl": "https://cdn.test/3.jpg"}}"#,
        )
        .unwrap();

        let mut cache = MetadataCache::load(&settings.cache.metadata_path, None);
        cache.put(
            "https://vimeo.com/1",
            CachedMetadata {
                title: "Kept title".into(),
                fetched_at: Utc::now(),
                ..CachedMetadata::default()
            },
        );
        cache.save().unwrap();

        mock_vimeo(&server, "1").await;
        mock_vimeo(&server, "2").await;

        let fetcher = HttpFetcher::new(&settings.fetch).unwrap();
        let report = run(&settings, &fetcher, &BackfillOptions::default()).await.unwrap();

        assert_eq!(report.candidates, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.progress.updated, 2);
        assert!(report.progress.completed);

        let cache = MetadataCache::load(&settings.cache.metadata_path, None);
        let one = cache.get("https://vimeo.com/1").unwrap();
        assert_eq!(one.title, "Kept title");
        assert_eq!(one.image_url, "https://i.vimeocdn.com/1.jpg");
        assert_eq!(
            cache.get("https://vimeo.com/2").unwrap().image_url,
            "https://i.vimeocdn.com/2.jpg"
        );
    }

    #[tokio::test]
    async fn resumes_from_checkpoint() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path(), &server);
        std::fs::write(
            settings.pins_dir.join("videos.md"),
            "- https://vimeo.com/1\n- https://vimeo.com/2\n- https://youtu.be/dQw4w9WgXcQ\n",
        )
        .unwrap();
        mock_vimeo(&server, "1").await;
        mock_vimeo(&server, "2").await;

        let fetcher = HttpFetcher::new(&settings.fetch).unwrap();
        let options = BackfillOptions {
            domain: Some(Platform::Vimeo),
            limit: Some(1),
            checkpoint_every: 1,
            ..BackfillOptions::default()
        };

        let first = run(&settings, &fetcher, &options).await.unwrap();
        assert_eq!(first.candidates, 2);
        assert_eq!(first.progress.processed, 1);
        assert!(!first.progress.completed);

        let second = run(&settings, &fetcher, &options).await.unwrap();
        assert_eq!(second.resumed_at, 1);
        assert_eq!(second.progress.processed, 2);
        assert!(second.progress.completed);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
    }

    #[tokio::test]
    async fn dry_run_fetches_nothing() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path(), &server);
        std::fs::write(settings.pins_dir.join("v.md"), "- https://vimeo.com/7\n").unwrap();

        let fetcher = HttpFetcher::new(&settings.fetch).unwrap();
        let options = BackfillOptions {
            dry_run: true,
            ..BackfillOptions::default()
        };
        let report = run(&settings, &fetcher, &options).await.unwrap();
        assert_eq!(report.candidates, 1);
        assert_eq!(report.progress.processed, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(!settings.cache.progress_path.exists());
    }

    #[test]
    fn merge_prefers_existing_text() {
        let old = CachedMetadata {
            title: "Old".into(),
            ..CachedMetadata::default()
        };
        let new = CachedMetadata {
            title: "New".into(),
            description: "Desc".into(),
            image_url: "img".into(),
            ..CachedMetadata::default()
        };
        let m = merge(Some(&old), new.clone());
        assert_eq!(m.title, "Old");
        assert_eq!(m.description, "Desc");
        assert_eq!(m.image_url, "img");

        let failed = CachedMetadata::fallback("https://vimeo.com/1", Some("x".into()));
        assert_eq!(merge(Some(&failed), new).title, "New");
    }
}
