use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{read_json_or_default, write_json_atomic};

/// Checkpoint of a long backfill run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Progress {
    pub total: usize,
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
    /// Index of the next item to process.
    pub last_index: usize,
    pub completed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct ProgressFile {
    path: PathBuf,
}

impl ProgressFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Saved progress to resume from. Completed runs start over.
    pub fn resume(&self) -> Progress {
        let saved: Progress = read_json_or_default(&self.path);
        if saved.completed {
            Progress::default()
        } else {
            saved
        }
    }

    pub fn save(&self, progress: &mut Progress) -> Result<()> {
        progress.updated_at = Some(Utc::now());
        write_json_atomic(&self.path, progress)
    }
}
