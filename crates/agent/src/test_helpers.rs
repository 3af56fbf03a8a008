//! Scripted collaborators for agent tests.

use std::sync::Mutex;

use ragpilot_core::error::{ProviderError, RetrievalError, SessionError};
use ragpilot_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use ragpilot_core::{Message, RetrievedCandidate, Retriever, Session, SessionId, SessionStore};
use ragpilot_session::InMemorySessionStore;
use tokio::sync::mpsc;

/// Returns scripted responses in order and records every request.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> ProviderResponse {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let call = requests.len();
        if call >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{call}, have {})",
                responses.len()
            );
        }
        requests.push(request);
        responses[call].clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(self.next(request))
    }

    /// Streams the scripted answer one word at a time.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let response = self.next(request);
        let words: Vec<String> = response
            .message
            .content
            .split_inclusive(' ')
            .map(String::from)
            .collect();

        let (tx, rx) = mpsc::channel(words.len() + 1);
        for word in words {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(word),
                    done: false,
                    usage: None,
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                done: true,
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}

/// A provider whose every call fails.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        })
    }
}

/// Keeps messages in memory but fails every save.
#[derive(Default)]
pub struct UnsavableStore(InMemorySessionStore);

#[async_trait::async_trait]
impl SessionStore for UnsavableStore {
    fn name(&self) -> &str {
        "unsavable"
    }

    async fn session_id(&self) -> SessionId {
        self.0.session_id().await
    }

    async fn history(&self) -> Vec<Message> {
        self.0.history().await
    }

    async fn append(&self, message: Message) -> Result<(), SessionError> {
        self.0.append(message).await
    }

    async fn truncate(&self, len: usize) {
        self.0.truncate(len).await;
    }

    async fn save(&self) -> Result<(), SessionError> {
        Err(SessionError::Storage("disk full".into()))
    }

    async fn reset(&self) -> Result<Session, SessionError> {
        self.0.reset().await
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Returns the same candidates for every query.
pub struct StaticRetriever(pub Vec<RetrievedCandidate>);

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str) -> Result<Vec<RetrievedCandidate>, RetrievalError> {
        Ok(self.0.clone())
    }
}

pub fn candidate(source_id: &str, text: &str, score: f32) -> RetrievedCandidate {
    RetrievedCandidate {
        source_id: source_id.into(),
        text: text.into(),
        relevance_score: score,
        token_cost: text.len().div_ceil(4),
    }
}
