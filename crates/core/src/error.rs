//! Error types for the ragpilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all ragpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Token counting errors ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Index errors ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Failed to load tokenizer from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to encode text with {tokenizer}: {reason}")]
    EncodeFailed { tokenizer: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Index not found at {0} (run `ragpilot index` first)")]
    IndexMissing(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Token counting failed during retrieval: {0}")]
    Tokenizer(#[from] TokenizerError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid role '{0}': must be user, assistant or system")]
    InvalidRole(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to walk {path}: {reason}")]
    Walk { path: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to persist index: {0}")]
    Persist(String),

    #[error("Token counting failed while indexing: {0}")]
    Tokenizer(#[from] TokenizerError),
}
