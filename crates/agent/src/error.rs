use ragpilot_context::ContextError;
use ragpilot_core::error::{ProviderError, RetrievalError, SessionError, TokenizerError};

/// Anything that can stop a question from being answered.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Context assembly failed: {0}")]
    Context(#[from] ContextError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
}
