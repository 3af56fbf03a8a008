//! Token counters.
//!
//! [`HeuristicCounter`] uses a byte-based estimate: ~4 bytes per token,
//! rounded up. It is within ~10% of BPE tokenizers on English text and code,
//! and needs no model files. With the `hf-tokenizer` feature,
//! [`HfTokenCounter`] counts with a Hugging Face `tokenizer.json`.

use std::sync::Arc;

use ragpilot_config::{TokenizerConfig, TokenizerKind};
use ragpilot_core::TokenCounter;
use ragpilot_core::error::TokenizerError;
use tracing::warn;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Counter used when no tokenizer file is configured or loadable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(estimate_tokens(text))
    }
}

/// Exact counts from a Hugging Face tokenizer.
///
/// `tokenizers::Tokenizer::encode` takes `&self`, so one instance can be
/// shared across concurrent assemblies.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
    label: String,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenCounter {
    /// Load `tokenizer.json` from disk.
    pub fn from_file(path: &std::path::Path) -> Result<Self, TokenizerError> {
        let tokenizer =
            tokenizers::Tokenizer::from_file(path).map_err(|e| TokenizerError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let stem = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tokenizer".into());
        Ok(Self {
            tokenizer,
            label: format!("hf:{stem}"),
        })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl TokenCounter for HfTokenCounter {
    fn name(&self) -> &str {
        &self.label
    }

    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        if text.is_empty() {
            return Ok(0);
        }
        let encoding =
            self.tokenizer
                .encode(text, false)
                .map_err(|e| TokenizerError::EncodeFailed {
                    tokenizer: self.label.clone(),
                    reason: e.to_string(),
                })?;
        Ok(encoding.get_ids().len())
    }
}

/// Build the counter described by `config`.
///
/// A Hugging Face tokenizer that cannot be loaded, or that was requested
/// from a build without the `hf-tokenizer` feature, falls back to the
/// heuristic with a warning.
pub fn build_counter(config: &TokenizerConfig) -> Arc<dyn TokenCounter> {
    match config.kind {
        TokenizerKind::Heuristic => Arc::new(HeuristicCounter),
        TokenizerKind::Huggingface => load_hf(config),
    }
}

#[cfg(feature = "hf-tokenizer")]
fn load_hf(config: &TokenizerConfig) -> Arc<dyn TokenCounter> {
    let Some(path) = config.path.as_deref() else {
        warn!("tokenizer.kind = huggingface but no path is set, using heuristic counter");
        return Arc::new(HeuristicCounter);
    };
    match HfTokenCounter::from_file(path) {
        Ok(counter) => {
            tracing::debug!(tokenizer = %counter.label, "Loaded Hugging Face tokenizer");
            Arc::new(counter)
        }
        Err(e) => {
            warn!(error = %e, "Falling back to heuristic token counter");
            Arc::new(HeuristicCounter)
        }
    }
}

#[cfg(not(feature = "hf-tokenizer"))]
fn load_hf(_config: &TokenizerConfig) -> Arc<dyn TokenCounter> {
    warn!("Built without the hf-tokenizer feature, using heuristic counter");
    Arc::new(HeuristicCounter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_bytes_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_bytes_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn multibyte_text_counts_bytes() {
        // 3 chars, 9 bytes
        assert_eq!(estimate_tokens("日本語"), 3);
    }

    #[test]
    fn heuristic_counter_matches_estimate() {
        let text = "a".repeat(100);
        assert_eq!(HeuristicCounter.count_tokens(&text).unwrap(), 25);
        assert_eq!(HeuristicCounter.name(), "heuristic");
    }

    #[test]
    fn default_config_builds_heuristic() {
        let counter = build_counter(&TokenizerConfig::default());
        assert_eq!(counter.name(), "heuristic");
    }

    #[test]
    fn unloadable_tokenizer_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, "{ not a tokenizer").unwrap();

        let counter = build_counter(&TokenizerConfig {
            kind: TokenizerKind::Huggingface,
            path: Some(path),
        });
        assert_eq!(counter.name(), "heuristic");
        assert_eq!(counter.count_tokens("abcdefgh").unwrap(), 2);
    }

    #[cfg(feature = "hf-tokenizer")]
    #[test]
    fn hf_load_error_names_path() {
        let err = HfTokenCounter::from_file(std::path::Path::new("/nonexistent/tokenizer.json"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/tokenizer.json"));
    }
}
