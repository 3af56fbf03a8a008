//! Keyword retrieval over a [`ProjectIndex`].
//!
//! Scoring per query term: +5 if the term is in the file path, +3 if it is a
//! chunk keyword, +1 per occurrence in the chunk text (at most 3). Scores are
//! divided by the best score so the top candidate is 1.0.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ragpilot_core::error::RetrievalError;
use ragpilot_core::retrieval::terms;
use ragpilot_core::{RetrievedCandidate, Retriever, TokenCounter};
use tracing::debug;

use crate::chunk::Chunk;
use crate::store::{FileEntry, ProjectIndex};

const PATH_WEIGHT: u32 = 5;
const KEYWORD_WEIGHT: u32 = 3;
const CONTENT_CAP: usize = 3;

pub struct KeywordRetriever {
    index: ProjectIndex,
    counter: Arc<dyn TokenCounter>,
    top_k: usize,
}

impl KeywordRetriever {
    pub fn new(index: ProjectIndex, counter: Arc<dyn TokenCounter>, top_k: usize) -> Self {
        Self {
            index,
            counter,
            top_k,
        }
    }

    /// Open the index persisted at `path`.
    pub fn open(
        path: &Path,
        counter: Arc<dyn TokenCounter>,
        top_k: usize,
    ) -> Result<Self, RetrievalError> {
        let index = ProjectIndex::load(path)
            .map_err(|e| RetrievalError::SearchFailed(e.to_string()))?
            .ok_or_else(|| RetrievalError::IndexMissing(path.display().to_string()))?;
        Ok(Self::new(index, counter, top_k))
    }

    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    fn score(query_terms: &[String], file: &FileEntry, chunk: &Chunk) -> u32 {
        let path = file.path.to_lowercase();
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        for term in terms(&chunk.content) {
            *occurrences.entry(term).or_default() += 1;
        }

        query_terms
            .iter()
            .map(|term| {
                let mut score = 0;
                if path.contains(term.as_str()) {
                    score += PATH_WEIGHT;
                }
                if chunk.keywords.iter().any(|k| k == term) {
                    score += KEYWORD_WEIGHT;
                }
                let hits = occurrences.get(term).copied().unwrap_or(0).min(CONTENT_CAP);
                score + hits as u32
            })
            .sum()
    }
}

/// Text placed in the prompt for a chunk: a header naming its origin, then the code.
pub fn render_chunk(path: &str, chunk: &Chunk) -> String {
    format!(
        "File: {path} (lines {}-{})\n\n{}",
        chunk.start_line, chunk.end_line, chunk.content
    )
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn search(&self, query: &str) -> Result<Vec<RetrievedCandidate>, RetrievalError> {
        let mut query_terms = terms(query);
        query_terms.sort();
        query_terms.dedup();
        if query_terms.is_empty() || self.top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(u32, &FileEntry, &Chunk)> = self
            .index
            .files
            .iter()
            .flat_map(|f| f.chunks.iter().map(move |c| (f, c)))
            .map(|(f, c)| (Self::score(&query_terms, f, c), f, c))
            .filter(|(score, _, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.path.cmp(&b.1.path))
                .then_with(|| a.2.start_line.cmp(&b.2.start_line))
        });
        scored.truncate(self.top_k);

        let best = scored.first().map(|s| s.0).unwrap_or(1) as f32;
        let mut candidates = Vec::with_capacity(scored.len());
        for (score, file, chunk) in scored {
            let text = render_chunk(&file.path, chunk);
            candidates.push(RetrievedCandidate {
                source_id: format!("{}#{}-{}", file.path, chunk.start_line, chunk.end_line),
                token_cost: self.counter.count_tokens(&text)?,
                text,
                relevance_score: score as f32 / best,
            });
        }

        debug!(
            query_terms = query_terms.len(),
            candidates = candidates.len(),
            "Keyword search finished"
        );
        Ok(candidates)
    }
}
