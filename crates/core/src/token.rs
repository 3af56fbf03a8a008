//! TokenCounter trait: the token cost of a text span.
//!
//! Every budget decision in the context core is expressed in the units this
//! trait reports. Implementations must be reentrant: a single instance may be
//! shared (behind an `Arc`) by concurrent assemblies, so counting takes
//! `&self` and must not depend on call order.

use crate::error::TokenizerError;

/// Counts tokens for one model vocabulary.
pub trait TokenCounter: Send + Sync {
    /// A short identifier for diagnostics (e.g., "heuristic", "hf:deepseek").
    fn name(&self) -> &str;

    /// Exact (or model-consistent) token count of `text`.
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError>;
}

impl<T: TokenCounter + ?Sized> TokenCounter for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        (**self).count_tokens(text)
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        (**self).count_tokens(text)
    }
}
