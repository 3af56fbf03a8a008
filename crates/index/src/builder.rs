//! Walking a project and building its index.

use std::path::Path;
use std::sync::Arc;

use ragpilot_config::IndexConfig;
use ragpilot_core::TokenCounter;
use ragpilot_core::error::IndexError;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk::split_into_chunks;
use crate::store::{FileEntry, ProjectIndex};

/// Bytes inspected for a NUL when deciding a file is binary.
const BINARY_SNIFF_LEN: usize = 8192;

/// Counts from one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Files chunked from scratch.
    pub files_indexed: usize,
    /// Files whose hash matched the previous index.
    pub files_reused: usize,
    /// Binary or unreadable files.
    pub files_skipped: usize,
    pub chunks: usize,
}

pub struct IndexBuilder {
    config: IndexConfig,
    counter: Arc<dyn TokenCounter>,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self { config, counter }
    }

    /// Index every matching file under `root`.
    ///
    /// Files whose content hash matches an entry in `previous` keep their
    /// old chunks, unless `previous` was measured with a different counter.
    pub fn build(
        &self,
        root: &Path,
        previous: Option<&ProjectIndex>,
    ) -> Result<(ProjectIndex, IndexStats), IndexError> {
        let previous = previous.filter(|p| p.tokenizer == self.counter.name());
        let mut index = ProjectIndex::new(root.display().to_string(), self.counter.name());
        let mut stats = IndexStats::default();

        let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
            if e.depth() > 0 && e.file_type().is_dir() {
                let name = e.file_name().to_string_lossy();
                return !self.config.ignore_dirs.iter().any(|d| d == name.as_ref());
            }
            true
        });

        for entry in walker {
            let entry = entry.map_err(|e| IndexError::Walk {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string()),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() || !self.wants(entry.path()) {
                continue;
            }

            let rel_path = relative_path(root, entry.path());
            let bytes = match std::fs::read(entry.path()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %rel_path, error = %e, "Skipping unreadable file");
                    stats.files_skipped += 1;
                    continue;
                }
            };
            if bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0) {
                debug!(path = %rel_path, "Skipping binary file");
                stats.files_skipped += 1;
                continue;
            }

            let content_hash = format!("{:x}", Sha256::digest(&bytes));
            if let Some(old) = previous
                .and_then(|p| p.file(&rel_path))
                .filter(|f| f.content_hash == content_hash)
            {
                stats.files_reused += 1;
                stats.chunks += old.chunks.len();
                index.files.push(old.clone());
                continue;
            }

            let text = String::from_utf8_lossy(&bytes);
            let chunks = split_into_chunks(&text, self.config.max_chunk_tokens, self.counter.as_ref())?;
            debug!(path = %rel_path, chunks = chunks.len(), "Indexed file");
            stats.files_indexed += 1;
            stats.chunks += chunks.len();
            index.files.push(FileEntry {
                path: rel_path,
                content_hash,
                chunks,
            });
        }

        index.files.sort_by(|a, b| a.path.cmp(&b.path));
        info!(
            indexed = stats.files_indexed,
            reused = stats.files_reused,
            skipped = stats.files_skipped,
            chunks = stats.chunks,
            "Index built"
        );
        Ok((index, stats))
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpilot_context::HeuristicCounter;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::create_dir_all(root.join(".ragpilot")).unwrap();
        fs::write(root.join("src/budget.rs"), "pub fn split_budget() {}\n").unwrap();
        fs::write(root.join("README.md"), "# Project\nBudget notes.\n").unwrap();
        fs::write(root.join("target/debug/out.rs"), "fn generated() {}\n").unwrap();
        fs::write(root.join(".ragpilot/notes.md"), "state\n").unwrap();
        fs::write(root.join("logo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(root.join("src/blob.rs"), [b'a', 0, b'b']).unwrap();
        dir
    }

    fn builder() -> IndexBuilder {
        IndexBuilder::new(IndexConfig::default(), Arc::new(HeuristicCounter))
    }

    #[test]
    fn indexes_matching_files_and_skips_ignored_dirs() {
        let dir = project();
        let (index, stats) = builder().build(dir.path(), None).unwrap();

        let paths: Vec<&str> = index.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/budget.rs"]);
        assert_eq!(stats.files_indexed, 2);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(index.tokenizer, "heuristic");
    }

    #[test]
    fn unchanged_files_are_reused() {
        let dir = project();
        let (first, _) = builder().build(dir.path(), None).unwrap();

        fs::write(dir.path().join("README.md"), "# Changed\n").unwrap();
        let (second, stats) = builder().build(dir.path(), Some(&first)).unwrap();

        assert_eq!(stats.files_reused, 1);
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(second.file("src/budget.rs"), first.file("src/budget.rs"));
        assert_ne!(second.file("README.md"), first.file("README.md"));
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("NOTES.MD"), "hello\n").unwrap();
        let (index, _) = builder().build(dir.path(), None).unwrap();
        assert_eq!(index.files.len(), 1);
    }
}
