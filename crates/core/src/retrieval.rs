//! Retrieval capabilities consumed by the context core.
//!
//! The core never ranks anything itself: a [`Retriever`] hands it
//! pre-scored [`RetrievedCandidate`]s, and a [`SpanScorer`] shortens a
//! candidate that does not fit whole.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RetrievalError, TokenizerError};

/// A relevance-scored piece of text produced by a retriever for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    /// Stable identifier of the source (e.g., `src/lib.rs#12-40`).
    pub source_id: String,

    /// The text that would be placed in the prompt.
    pub text: String,

    /// Externally computed ranking signal; higher is more relevant.
    pub relevance_score: f32,

    /// Token cost of `text`, as reported by the token counter.
    pub token_cost: usize,
}

/// A contiguous sub-span chosen by a [`SpanScorer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub token_cost: usize,
}

/// Best-effort truncation helper.
pub trait SpanScorer: Send + Sync {
    /// Return the highest-relevance contiguous sub-span of `text` whose token
    /// cost is at most `max_tokens`. May return an empty span.
    fn best_span(&self, text: &str, max_tokens: usize) -> Result<Span, TokenizerError>;
}

/// Relevance-ranked search over an index.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The retriever name (e.g., "keyword").
    fn name(&self) -> &str;

    /// Candidates for `query`, ordered by descending relevance.
    async fn search(&self, query: &str) -> std::result::Result<Vec<RetrievedCandidate>, RetrievalError>;
}

/// Words too common to say anything about relevance.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "does", "for", "from",
    "how", "i", "if", "in", "into", "is", "it", "its", "let", "me", "mut", "my", "no", "not",
    "of", "on", "or", "pub", "self", "so", "that", "the", "their", "then", "there", "these",
    "this", "to", "use", "was", "we", "what", "when", "where", "which", "who", "why", "will",
    "with", "you", "your",
];

/// Lowercased identifier-like terms of `text`, in order of appearance.
///
/// Splits on anything that is not alphanumeric or `_`, and drops stop words
/// and single characters. Shared by the index (keywords) and the keyword span
/// scorer (query terms) so both sides agree on what a term is.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}
