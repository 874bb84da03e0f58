use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use crate::assemble::{aggregate, AssembleOptions, Assembler, PinsData};
use crate::cache::catalog::Catalog;
use crate::cache::incremental::IncrementalCache;
use crate::cache::{write_json_atomic, MetadataCache};
use crate::collections::{self, ResolvedCollection};
use crate::config::Settings;
use crate::fetch::MetadataSource;
use crate::parser;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Pins files to process instead of everything under `pins_dir`.
    pub targets: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub incremental: bool,
    pub offline: bool,
    pub dry_run: bool,
    /// Max network fetches for this run.
    pub limit: Option<usize>,
}

/// The document the site build reads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    pub generated_at: DateTime<Utc>,
    pub pins: PinsData,
    pub collections: Vec<ResolvedCollection>,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub files: usize,
    pub reused_files: usize,
    pub pins: usize,
    pub fetched: usize,
    pub misses: usize,
    pub collections: usize,
    pub output: Option<PathBuf>,
}

impl BuildReport {
    pub fn print(&self) {
        println!(
            "Assembled {} pins from {} files ({} reused), {} fetched, {} without metadata, {} collections.",
            self.pins, self.files, self.reused_files, self.fetched, self.misses, self.collections,
        );
        if let Some(path) = &self.output {
            println!("Wrote {}", path.display());
        }
    }
}

/// Parse, assemble and write the site data, saving caches along the way.
pub async fn build<S: MetadataSource>(
    settings: &Settings,
    source: &S,
    options: &BuildOptions,
) -> Result<(SiteData, BuildReport)> {
    let files = if options.targets.is_empty() {
        parser::markdown_files(&settings.pins_dir)?
    } else {
        options.targets.clone()
    };
    let parsed = parser::parse_files(&files)?;
    let total_entries: usize = parsed.iter().map(|f| f.entries.len()).sum();
    info!("Parsed {} entries from {} files", total_entries, parsed.len());

    let mut cache = MetadataCache::load(&settings.cache.metadata_path, settings.cache.max_age_days);
    let catalog = Catalog::load(&settings.cache.catalog_path);
    let mut incremental = options
        .incremental
        .then(|| IncrementalCache::load(&settings.cache.incremental_path));

    let assemble_options = AssembleOptions {
        offline: options.offline,
        fetch_limit: options.limit,
        delay: settings.fetch.delay(),
        cache_failures: settings.cache.cache_failures,
    };

    let pb = ProgressBar::new(total_entries as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut report = BuildReport {
        files: parsed.len(),
        ..BuildReport::default()
    };
    let mut pins = Vec::with_capacity(total_entries);
    let mut file_keys = Vec::with_capacity(parsed.len());
    {
        let mut assembler = Assembler::new(source, &mut cache, &catalog, assemble_options);

        for file in &parsed {
            let key = file.path.display().to_string();
            file_keys.push(key.clone());

            if let Some(reused) = incremental
                .as_ref()
                .and_then(|inc| inc.lookup(&key, &file.content))
            {
                debug!("{} unchanged, reusing {} pins", key, reused.len());
                pins.extend_from_slice(reused);
                report.reused_files += 1;
                pb.inc(file.entries.len() as u64);
                continue;
            }

            let misses_before = assembler.misses();
            let mut file_pins = Vec::with_capacity(file.entries.len());
            for entry in &file.entries {
                file_pins.push(assembler.assemble(entry).await);
                pb.inc(1);
            }

            // Only complete files are safe to reuse next time
            if let Some(inc) = incremental.as_mut() {
                if assembler.misses() == misses_before {
                    inc.store(&key, &file.content, file_pins.clone());
                }
            }
            pins.extend(file_pins);
        }

        report.fetched = assembler.fetched();
        report.misses = assembler.misses();
    }
    pb.finish_and_clear();

    let data = aggregate(pins);
    let defs = parser::load_collections(&settings.collections_dir)?;
    let resolved = collections::resolve_all(&defs, &data.pins);

    report.pins = data.pins.len();
    report.collections = resolved.len();

    let site = SiteData {
        generated_at: Utc::now(),
        pins: data,
        collections: resolved,
    };

    if options.dry_run {
        info!("Dry run: not writing output or caches");
        return Ok((site, report));
    }

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| settings.output_path.clone());
    write_json_atomic(&output, &site)?;
    report.output = Some(output);

    cache.save()?;
    if let Some(inc) = incremental.as_mut() {
        // Only prune on full builds; a --target run sees a subset of files.
        if options.targets.is_empty() {
            inc.retain_files(&file_keys);
        }
        inc.save()?;
    }

    Ok((site, report))
}

// ── Tests ──
