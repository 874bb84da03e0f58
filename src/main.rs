mod assemble;
mod backfill;
mod cache;
mod classify;
mod collections;
mod config;
mod error;
mod fetch;
mod parser;
mod pipeline;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use crate::cache::catalog::Catalog;
use crate::cache::MetadataCache;
use crate::classify::video::Platform;
use crate::config::Settings;
use crate::fetch::{HttpFetcher, MetadataSource};

#[derive(Parser)]
#[command(name = "pinboard", about = "Pins ingestion: markdown bookmarks → metadata → site data")]
struct Cli {
    /// Settings file (default: ./pinboard.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse pins, fetch missing metadata and write the site data file
    Build {
        /// Only these pins files (default: every .md in pins_dir)
        #[arg(long, num_args = 1..)]
        target: Vec<PathBuf>,
        /// Output path (default: output_path setting)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Reuse assembled pins for files whose content hash is unchanged
        #[arg(long)]
        incremental: bool,
        /// Never fetch; cache misses get URL-derived defaults
        #[arg(long)]
        offline: bool,
        /// Do everything except writing files
        #[arg(long)]
        dry_run: bool,
        /// Max network fetches this run
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fetch metadata for one URL and print it
    Fetch { url: String },
    /// Print the raw entries parsed from one pins file
    Parse { file: PathBuf },
    /// Fill in missing video thumbnails, resumable
    Backfill {
        /// youtube or vimeo (default: both)
        #[arg(long)]
        domain: Option<String>,
        #[arg(long, num_args = 1..)]
        target: Vec<PathBuf>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long)]
        dry_run: bool,
        /// Ignore the saved checkpoint
        #[arg(long)]
        restart: bool,
        /// Save progress every N videos
        #[arg(long, default_value_t = backfill::DEFAULT_CHECKPOINT_EVERY)]
        checkpoint_every: usize,
    },
    /// Show cache and pins statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let t0 = Instant::now();
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Build {
            target,
            output,
            incremental,
            offline,
            dry_run,
            limit,
        } => {
            let fetcher = HttpFetcher::new(&settings.fetch)?;
            let options = pipeline::BuildOptions {
                targets: target,
                output,
                incremental,
                offline,
                dry_run,
                limit,
            };
            let (_, report) = pipeline::build(&settings, &fetcher, &options).await?;
            report.print();
            Ok(())
        }
        Commands::Fetch { url } => {
            let fetcher = HttpFetcher::new(&settings.fetch)?;
            let meta = fetcher.fetch(&url).await;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
        Commands::Parse { file } => {
            let parsed = parser::parse_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&parsed.entries)?);
            Ok(())
        }
        Commands::Backfill {
            domain,
            target,
            limit,
            dry_run,
            restart,
            checkpoint_every,
        } => {
            let domain = match domain.as_deref() {
                None => None,
                Some(name) => match Platform::from_name(name) {
                    Some(p) => Some(p),
                    None => bail!("Unknown domain '{}': expected youtube or vimeo", name),
                },
            };
            let fetcher = HttpFetcher::new(&settings.fetch)?;
            let options = backfill::BackfillOptions {
                domain,
                limit,
                targets: target,
                dry_run,
                restart,
                checkpoint_every,
            };
            let report = backfill::run(&settings, &fetcher, &options).await?;
            report.print();
            Ok(())
        }
        Commands::Stats => print_stats(&settings),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_stats(settings: &Settings) -> anyhow::Result<()> {
    let cache = MetadataCache::load(&settings.cache.metadata_path, settings.cache.max_age_days);
    let catalog = Catalog::load(&settings.cache.catalog_path);

    let failed = cache.iter().filter(|(_, m)| m.is_error()).count();
    let stale = cache.iter().filter(|(_, m)| cache.is_stale(m)).count();
    let no_image = cache.iter().filter(|(_, m)| m.image_url.is_empty()).count();

    println!("Cache entries:   {}", cache.len());
    println!("Failed fetches:  {}", failed);
    println!("Stale:           {}", stale);
    println!("Without image:   {}", no_image);
    println!("Catalog entries: {}", catalog.len());

    let files = parser::markdown_files(&settings.pins_dir)
        .with_context(|| format!("No pins directory at {:?}", settings.pins_dir))?;
    let mut per_section: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0;
    for file in parser::parse_files(&files)? {
        for entry in &file.entries {
            *per_section.entry(entry.section.clone()).or_default() += 1;
            total += 1;
        }
    }

    println!("\n{:<32} | {:>5}", "Section", "Pins");
    println!("{}", "-".repeat(40));
    for (section, count) in &per_section {
        println!("{:<32} | {:>5}", truncate(section, 32), count);
    }
    println!("\n{} pins in {} files", total, files.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
