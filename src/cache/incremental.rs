use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{read_json_or_default, write_json_atomic};
use crate::assemble::Pin;

/// Hex SHA-256 of a pins file's text.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Stored {
    hashes: BTreeMap<String, String>,
    pins: BTreeMap<String, Vec<Pin>>,
}

/// Side cache of already assembled pins, keyed by source file.
///
/// A file whose content hash matches the stored one reuses its pins verbatim.
#[derive(Debug)]
pub struct IncrementalCache {
    path: PathBuf,
    stored: Stored,
    dirty: bool,
}

impl IncrementalCache {
    pub fn load(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            stored: read_json_or_default(path),
            dirty: false,
        }
    }

    /// Pins from the previous run, if `content` is unchanged.
    pub fn lookup(&self, file_key: &str, content: &str) -> Option<&[Pin]> {
        let hash = self.stored.hashes.get(file_key)?;
        if *hash != content_hash(content) {
            return None;
        }
        self.stored.pins.get(file_key).map(Vec::as_slice)
    }

    pub fn store(&mut self, file_key: &str, content: &str, pins: Vec<Pin>) {
        self.stored
            .hashes
            .insert(file_key.to_string(), content_hash(content));
        self.stored.pins.insert(file_key.to_string(), pins);
        self.dirty = true;
    }

    /// Forget files that are no longer part of the build.
    pub fn retain_files(&mut self, keep: &[String]) {
        let before = self.stored.hashes.len();
        self.stored.hashes.retain(|k, _| keep.contains(k));
        self.stored.pins.retain(|k, _| keep.contains(k));
        if self.stored.hashes.len() != before {
            self.dirty = true;
        }
    }

    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        write_json_atomic(&self.path, &self.stored)?;
        self.dirty = false;
        Ok(())
    }
}
