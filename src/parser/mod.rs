pub mod frontmatter;
pub mod pins;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, warn};

use frontmatter::CollectionDef;
use pins::RawPinEntry;

/// Entries parsed from one pins file, along with the raw text for hashing.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub content: String,
    pub entries: Vec<RawPinEntry>,
}

/// Read and parse one pins file.
pub fn parse_file(path: &Path) -> Result<ParsedFile> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("pins");
    let entries = pins::parse_pins(&content, &pins::section_from_filename(stem));
    debug!("{}: {} entries", path.display(), entries.len());
    Ok(ParsedFile {
        path: path.to_path_buf(),
        content,
        entries,
    })
}

/// Parse files in parallel. Output keeps the order of `paths`.
pub fn parse_files(paths: &[PathBuf]) -> Result<Vec<ParsedFile>> {
    paths.par_iter().map(|p| parse_file(p)).collect()
}

/// All `*.md` files directly under `dir`, sorted by path.
pub fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let read = std::fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))?;
    for entry in read {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every collection definition in `dir`. A missing directory means no collections.
pub fn load_collections(dir: &Path) -> Result<Vec<CollectionDef>> {
    if !dir.exists() {
        debug!("No collections directory at {:?}", dir);
        return Ok(Vec::new());
    }

    let mut defs = Vec::new();
    for path in markdown_files(dir)? {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        match frontmatter::parse_collection(name, &source) {
            Ok(def) => defs.push(def),
            Err(e) => warn!("Skipping collection {:?}: {:#}", path, e),
        }
    }
    Ok(defs)
}
