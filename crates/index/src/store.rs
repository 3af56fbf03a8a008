//! The persisted project index.

use std::path::Path;

use chrono::{DateTime, Utc};
use ragpilot_core::error::IndexError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::Chunk;

pub const INDEX_VERSION: &str = "1";

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative to the index root, `/`-separated.
    pub path: String,
    /// SHA-256 of the file bytes; unchanged files are reused on rebuild.
    pub content_hash: String,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectIndex {
    pub version: String,
    pub root: String,
    pub built_at: DateTime<Utc>,
    /// Name of the counter that measured `token_cost`s.
    pub tokenizer: String,
    /// Sorted by path.
    pub files: Vec<FileEntry>,
}

impl ProjectIndex {
    pub fn new(root: impl Into<String>, tokenizer: impl Into<String>) -> Self {
        Self {
            version: INDEX_VERSION.into(),
            root: root.into(),
            built_at: Utc::now(),
            tokenizer: tokenizer.into(),
            files: Vec::new(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.files.iter().map(|f| f.chunks.len()).sum()
    }

    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    /// Load an index from disk. `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, IndexError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let index: Self = serde_json::from_str(&content).map_err(|e| IndexError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(
            path = %path.display(),
            files = index.files.len(),
            "Loaded project index"
        );
        Ok(Some(index))
    }

    /// Write the index as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Persist(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| IndexError::Persist(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| IndexError::Persist(e.to_string()))?;
        Ok(())
    }
}
