//! SessionStore trait: persistent conversation history.
//!
//! The context core only ever reads a snapshot (`history()`); mutation
//! happens in the agent after a completion succeeds.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::message::{Message, Session, SessionId};

/// Implementations: JSON file (default), in-memory (for testing).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// The current session ID.
    async fn session_id(&self) -> SessionId;

    /// A snapshot of the ordered history, oldest first.
    async fn history(&self) -> Vec<Message>;

    /// Append a message. Only user, assistant and system roles exist.
    async fn append(&self, message: Message) -> std::result::Result<(), SessionError>;

    /// Drop every message after the first `len`, in memory only.
    async fn truncate(&self, len: usize);

    /// Persist the current session.
    async fn save(&self) -> std::result::Result<(), SessionError>;

    /// Archive the current session (if non-empty) and start a new one.
    async fn reset(&self) -> std::result::Result<Session, SessionError>;
}
