//! File-based session store: one pretty-printed JSON document per session.
//!
//! Layout under the session directory (`.ragpilot/` by default):
//!
//! ```text
//! session.json                      current session
//! history/session_<session_id>.json archived sessions
//! ```
//!
//! The session is loaded once on open and written back on `save()` and
//! `reset()`. A missing or unreadable `session.json` starts a fresh session.

use async_trait::async_trait;
use chrono::Utc;
use ragpilot_core::error::SessionError;
use ragpilot_core::{Message, Session, SessionId, SessionStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SESSION_FILE: &str = "session.json";
const ARCHIVE_DIR: &str = "history";

pub struct FileSessionStore {
    dir: PathBuf,
    session: Arc<RwLock<Session>>,
}

impl FileSessionStore {
    /// Open the session stored in `dir`, or start a new one.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let session = Self::load_from_disk(&dir.join(SESSION_FILE));
        debug!(
            dir = %dir.display(),
            session_id = %session.session_id,
            messages = session.messages.len(),
            "Session store opened"
        );
        Self {
            dir,
            session: Arc::new(RwLock::new(session)),
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Where `reset()` archives the session with `id`.
    pub fn archive_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(ARCHIVE_DIR).join(format!("session_{id}.json"))
    }

    /// A copy of the whole current session.
    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    fn load_from_disk(path: &Path) -> Session {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Session::new(), // No session yet
        };

        match serde_json::from_str::<Session>(&content) {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not load session file, starting a new session"
                );
                Session::new()
            }
        }
    }

    fn write(path: &Path, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("Failed to create session directory: {e}"))
            })?;
        }

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize session: {e}")))?;

        std::fs::write(path, json)
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
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
        let mut session = self.session.write().await;
        session.updated_at = Utc::now();
        Self::write(&self.session_path(), &session)?;
        debug!(path = %self.session_path().display(), "Session saved");
        Ok(())
    }

    async fn reset(&self) -> Result<Session, SessionError> {
        let mut session = self.session.write().await;

        if !session.is_empty() {
            let archive = self.archive_path(&session.session_id);
            Self::write(&archive, &session)?;
            info!(path = %archive.display(), "Archived previous session");
        }

        *session = Session::new();
        Self::write(&self.session_path(), &session)?;
        info!(session_id = %session.session_id, "Started a new session");
        Ok(session.clone())
    }
}
