//! In-memory session store, useful for testing and one-shot questions.

use async_trait::async_trait;
use ragpilot_core::error::SessionError;
use ragpilot_core::{Message, Session, SessionId, SessionStore};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemorySessionStore {
    session: Arc<RwLock<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_session(Session::new())
    }

    /// Start from an existing session, e.g. a canned conversation in tests.
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn session_id(&self) -> SessionId {
        self.session.read().await.session_id.clone()
    }

    async fn history(&self) -> Vec<Message> {
        self.session.read().await.messages.clone()
    }

    async fn append(&self, message: Message) -> Result<(), SessionError> {
        self.session.write().await.push(message);
        Ok(())
    }

    async fn truncate(&self, len: usize) {
        self.session.write().await.messages.truncate(len);
    }

    async fn save(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn reset(&self) -> Result<Session, SessionError> {
        let mut session = self.session.write().await;
        *session = Session::new();
        Ok(session.clone())
    }
}
