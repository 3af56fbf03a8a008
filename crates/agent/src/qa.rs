//! Retrieval-augmented question answering over a project index.

use std::sync::Arc;

use ragpilot_context::{ContextAssembler, ConversationTurn, KeywordSpanScorer, PrunedContext, SectionKind};
use ragpilot_core::error::ProviderError;
use ragpilot_core::provider::{Provider, ProviderRequest, Usage};
use ragpilot_core::{Message, Retriever, SessionStore};
use tracing::{debug, info, warn};

use crate::error::AgentError;

/// Used when the config does not set `system_prompt`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ragpilot, an assistant that answers questions \
about the user's codebase. Ground your answers in the retrieved files when they are relevant, \
cite them by path and line range, and say so when they do not contain the answer.";

/// Answers questions with retrieved context and remembers the conversation.
pub struct QaAgent {
    provider: Arc<dyn Provider>,
    retriever: Arc<dyn Retriever>,
    sessions: Arc<dyn SessionStore>,
    assembler: ContextAssembler,
    model: String,
    temperature: f32,
    system_prompt: String,
}

/// The outcome of one answered question.
#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub answer: String,
    /// The prompt the answer was generated from.
    pub context: PrunedContext,
    pub usage: Option<Usage>,
    /// Model that actually responded.
    pub model: String,
}

impl QaAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
        sessions: Arc<dyn SessionStore>,
        assembler: ContextAssembler,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            retriever,
            sessions,
            assembler,
            model: model.into(),
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Build the prompt for `query` without calling the model.
    pub async fn prepare(&self, query: &str) -> Result<PrunedContext, AgentError> {
        let history = self.sessions.history().await;
        let counter = self.assembler.counter();
        let turns = history
            .iter()
            .map(|m| ConversationTurn::measure(m, counter))
            .collect::<Result<Vec<_>, _>>()?;

        let candidates = self.retriever.search(query).await?;
        let scorer = KeywordSpanScorer::new(counter, query);

        let context =
            self.assembler
                .assemble_context(&self.system_prompt, query, &turns, &candidates, &scorer)?;

        debug!(
            retriever = self.retriever.name(),
            turns = turns.len(),
            candidates = candidates.len(),
            kept_turns = context.sections_of(SectionKind::History).count(),
            kept_snippets = context.sections_of(SectionKind::Retrieval).count(),
            total_tokens = context.total_token_cost,
            "Context prepared"
        );
        for warning in &context.warnings {
            debug!(%warning, "Context truncated");
        }

        Ok(context)
    }

    /// Answer `query` and record the exchange in the session.
    pub async fn ask(&self, query: &str) -> Result<QaAnswer, AgentError> {
        let context = self.prepare(query).await?;
        let request = self.request(&context, false);

        info!(provider = self.provider.name(), model = %self.model, "Asking provider");
        let response = self.provider.complete(request).await?;
        let answer = response.message.content.clone();

        self.record(query, response.message).await?;

        Ok(QaAnswer {
            answer,
            context,
            usage: response.usage,
            model: response.model,
        })
    }

    /// Like [`QaAgent::ask`], passing each text delta to `on_delta` as it
    /// arrives. Nothing is recorded if the stream fails.
    pub async fn ask_streaming<F>(&self, query: &str, mut on_delta: F) -> Result<QaAnswer, AgentError>
    where
        F: FnMut(&str),
    {
        let context = self.prepare(query).await?;
        let request = self.request(&context, true);

        info!(provider = self.provider.name(), model = %self.model, "Streaming from provider");
        let mut rx = self.provider.stream(request).await?;

        let mut answer = String::new();
        let mut usage = None;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.inspect_err(|e| warn!(error = %e, "Stream failed"))?;
            if let Some(delta) = chunk.content.as_deref().filter(|d| !d.is_empty()) {
                on_delta(delta);
                answer.push_str(delta);
            }
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        if answer.is_empty() {
            return Err(ProviderError::StreamInterrupted("stream ended without content".into()).into());
        }

        self.record(query, Message::assistant(answer.clone())).await?;

        Ok(QaAnswer {
            answer,
            context,
            usage,
            model: self.model.clone(),
        })
    }

    fn request(&self, context: &PrunedContext, stream: bool) -> ProviderRequest {
        let reserved = self.assembler.config().reserved_response_tokens;
        ProviderRequest {
            model: self.model.clone(),
            messages: context.to_messages(),
            temperature: self.temperature,
            max_tokens: Some(u32::try_from(reserved).unwrap_or(u32::MAX)),
            stream,
            stop: vec![],
        }
    }

    /// Append the exchange and persist it. On failure the exchange is
    /// removed again, so a later save cannot write it.
    async fn record(&self, query: &str, answer: Message) -> Result<(), AgentError> {
        let mark = self.sessions.history().await.len();
        let saved = async {
            self.sessions.append(Message::user(query)).await?;
            self.sessions.append(answer).await?;
            self.sessions.save().await
        }
        .await;

        if let Err(e) = saved {
            warn!(error = %e, store = self.sessions.name(), "Session not saved, discarding exchange");
            self.sessions.truncate(mark).await;
            return Err(e.into());
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use ragpilot_config::ContextConfig;
    use ragpilot_context::{BudgetError, ContextError, HeuristicCounter};
    use ragpilot_core::{Role, Session};
    use ragpilot_session::InMemorySessionStore;

    const SNIPPET: &str = "File: src/budget.rs (lines 1-3)\n\npub fn allocate(total: usize) -> Budget {\n    split(total)\n}";

    fn agent_with(
        provider: Arc<dyn Provider>,
        sessions: Arc<dyn SessionStore>,
        config: ContextConfig,
    ) -> QaAgent {
        let retriever = Arc::new(StaticRetriever(vec![candidate("src/budget.rs#1-3", SNIPPET, 1.0)]));
        let assembler = ContextAssembler::new(config, Arc::new(HeuristicCounter));
        QaAgent::new(provider, retriever, sessions, assembler, "mock-model").with_temperature(0.2)
    }

    #[tokio::test]
    async fn ask_sends_budgeted_prompt_and_records_turns() {
        let provider = Arc::new(SequentialMockProvider::single_text("It splits the window."));
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = agent_with(provider.clone(), sessions.clone(), ContextConfig::new(4096, 1024));

        let answer = agent.ask("How does allocate work?").await.unwrap();
        assert_eq!(answer.answer, "It splits the window.");
        assert_eq!(answer.context.sections_of(SectionKind::Retrieval).count(), 1);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(1024));
        assert!((requests[0].temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[0].content, DEFAULT_SYSTEM_PROMPT);
        let last = requests[0].messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.content.starts_with("File: src/budget.rs"));
        assert!(last.content.ends_with("How does allocate work?"));

        let history = sessions.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "How does allocate work?");
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn prepare_does_not_call_the_model() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = agent_with(provider.clone(), sessions.clone(), ContextConfig::new(4096, 1024));

        let context = agent.prepare("allocate").await.unwrap();
        assert_eq!(context.sections.last().unwrap().kind, SectionKind::Query);
        assert!(context.total_token_cost <= 4096 - 1024);
        assert!(provider.requests().is_empty());
        assert!(sessions.history().await.is_empty());
    }

    #[tokio::test]
    async fn earlier_turns_become_history_messages() {
        let mut session = Session::new();
        session.push(Message::user("What is the window?"));
        session.push(Message::assistant("32k tokens."));
        let sessions = Arc::new(InMemorySessionStore::with_session(session));
        let provider = Arc::new(SequentialMockProvider::single_text("Half of it."));
        let agent = agent_with(provider.clone(), sessions.clone(), ContextConfig::new(4096, 1024));

        agent.ask("And the history share?").await.unwrap();

        let messages = &provider.requests()[0].messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "What is the window?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(sessions.history().await.len(), 4);
    }

    #[tokio::test]
    async fn provider_failure_records_nothing() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = agent_with(Arc::new(FailingProvider), sessions.clone(), ContextConfig::new(4096, 1024));

        let err = agent.ask("allocate").await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(ProviderError::RateLimited { .. })));
        assert!(sessions.history().await.is_empty());
    }

    #[tokio::test]
    async fn failed_save_discards_the_exchange() {
        let provider = Arc::new(SequentialMockProvider::single_text("It splits the window."));
        let sessions = Arc::new(UnsavableStore::default());
        sessions.append(Message::user("earlier")).await.unwrap();
        let agent = agent_with(provider, sessions.clone(), ContextConfig::new(4096, 1024));

        let err = agent.ask("How does allocate work?").await.unwrap_err();
        assert!(matches!(err, AgentError::Session(_)));
        let history = sessions.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "earlier");
    }

    #[tokio::test]
    async fn invalid_budget_is_reported_before_any_call() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = agent_with(provider.clone(), sessions, ContextConfig::new(1000, 1000));

        let err = agent.ask("allocate").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Context(ContextError::Budget(BudgetError::ReservedExceedsWindow { .. }))
        ));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn streaming_forwards_deltas_and_records_answer() {
        let provider = Arc::new(SequentialMockProvider::single_text("It splits the window."));
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = agent_with(provider.clone(), sessions.clone(), ContextConfig::new(4096, 1024));

        let mut deltas = Vec::new();
        let answer = agent
            .ask_streaming("How does allocate work?", |d| deltas.push(d.to_string()))
            .await
            .unwrap();

        assert_eq!(deltas.len(), 4);
        assert_eq!(deltas.concat(), "It splits the window.");
        assert_eq!(answer.answer, "It splits the window.");
        assert_eq!(answer.usage.unwrap().total_tokens, 15);
        assert!(provider.requests()[0].stream);

        let history = sessions.history().await;
        assert_eq!(history[1].content, "It splits the window.");
    }

    #[tokio::test]
    async fn custom_system_prompt_is_sent() {
        let provider = Arc::new(SequentialMockProvider::single_text("ok"));
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = agent_with(provider.clone(), sessions, ContextConfig::new(4096, 1024))
            .with_system_prompt("Answer in one sentence.");

        agent.ask("allocate").await.unwrap();
        assert_eq!(provider.requests()[0].messages[0].content, "Answer in one sentence.");
    }
}
