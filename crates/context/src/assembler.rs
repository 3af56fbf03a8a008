//! Context assembly pipeline: the core of the prompt builder.
//!
//! Builds one prompt from four section kinds, in this order:
//!
//! 1. **System** (instructions): never trimmed
//! 2. **History** (conversation turns, chronological): oldest dropped first
//! 3. **Retrieval** (ranked snippets, relevance order): lowest relevance dropped first
//! 4. **Query** (the current question): never trimmed
//!
//! # Algorithm
//!
//! 1. Count system prompt + query (the fixed cost) and split the remaining
//!    capacity between history and retrieval. Every separator the rendered
//!    prompt will contain is paid for up front: one in the fixed cost, one
//!    per kept turn or snippet
//! 2. Optionally move unused slack from one region to the other, once
//! 3. Prune history and snippets independently
//! 4. Render, recount the whole prompt, and drop whole items while the
//!    recount is over capacity
//!
//! # Determinism
//!
//! Identical inputs always produce identical outputs. Nothing here reads the
//! clock, randomness, or shared mutable state.

use ragpilot_config::ContextConfig;
use ragpilot_core::error::TokenizerError;
use ragpilot_core::{Message, RetrievedCandidate, Role, SpanScorer, TokenCounter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::budget::{BudgetAllocator, BudgetError, TokenBudget};
use crate::history::{ConversationTurn, HistoryPruner};
use crate::section::{ContextSection, SectionKind, TruncationWarning};
use crate::snippet::SnippetPruner;

/// Separator placed between rendered sections.
pub const SECTION_SEPARATOR: &str = "\n\n";

// ── Types ─────────────────────────────────────────────────────────────────

/// Errors from context assembly.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Invalid context budget: {0}")]
    Budget(#[from] BudgetError),

    /// Trimming every history turn and snippet still left the prompt over
    /// capacity. Means the counter disagrees with itself.
    #[error("Assembled context needs {total} tokens but only {available} are available")]
    Overflow { total: usize, available: usize },

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

/// The budget-respecting prompt for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunedContext {
    /// System, history (chronological), retrieval (relevance order), query.
    pub sections: Vec<ContextSection>,

    /// Counter cost of [`PrunedContext::render`].
    pub total_token_cost: usize,

    /// The split this context was built against.
    pub budget: TokenBudget,

    pub warnings: Vec<TruncationWarning>,
}

impl PrunedContext {
    /// Non-empty section contents joined by a blank line.
    pub fn render(&self) -> String {
        render_sections(&self.sections)
    }

    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = &ContextSection> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    /// Whether any section was shortened or any item left out.
    pub fn is_truncated(&self) -> bool {
        !self.warnings.is_empty() || self.sections.iter().any(|s| s.truncated)
    }

    /// Provider messages: system, history by role, then one user message
    /// carrying the retrieved snippets followed by the query.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();

        if let Some(system) = self.sections_of(SectionKind::System).find(|s| !s.content.is_empty()) {
            messages.push(Message::system(system.content.clone()));
        }

        for turn in self.sections_of(SectionKind::History) {
            messages.push(Message::new(turn.role.unwrap_or(Role::User), turn.content.clone()));
        }

        let mut user_parts: Vec<&str> = self
            .sections_of(SectionKind::Retrieval)
            .map(|s| s.content.as_str())
            .collect();
        if let Some(query) = self.sections_of(SectionKind::Query).next() {
            user_parts.push(&query.content);
        }
        messages.push(Message::user(user_parts.join(SECTION_SEPARATOR)));

        messages
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Holds no per-request state; create one and reuse it.
pub struct ContextAssembler {
    config: ContextConfig,
    counter: Arc<dyn TokenCounter>,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self { config, counter }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Assemble a prompt for `query`.
    ///
    /// `history` is oldest first; `candidates` come from the retriever in any
    /// order. Fails with [`ContextError::Budget`] before any pruning when the
    /// window cannot hold the fixed part.
    pub fn assemble_context(
        &self,
        system_prompt: &str,
        query: &str,
        history: &[ConversationTurn],
        candidates: &[RetrievedCandidate],
        scorer: &dyn SpanScorer,
    ) -> Result<PrunedContext, ContextError> {
        assemble_context(
            system_prompt,
            query,
            history,
            candidates,
            scorer,
            &self.config,
            self.counter.as_ref(),
        )
    }
}

/// Free-standing form of [`ContextAssembler::assemble_context`].
pub fn assemble_context(
    system_prompt: &str,
    query: &str,
    history: &[ConversationTurn],
    candidates: &[RetrievedCandidate],
    scorer: &dyn SpanScorer,
    config: &ContextConfig,
    counter: &dyn TokenCounter,
) -> Result<PrunedContext, ContextError> {
    // ── Budget ─────────────────────────────────────────────────────────────
    let allocator = BudgetAllocator::from_config(config)?;
    let system_tokens = counter.count_tokens(system_prompt)?;
    let query_tokens = counter.count_tokens(query)?;
    let separator_tokens = counter.count_tokens(SECTION_SEPARATOR)?;
    let fixed_separator = if system_prompt.is_empty() || query.is_empty() {
        0
    } else {
        separator_tokens
    };
    let mut budget = allocator.allocate(system_tokens + query_tokens + fixed_separator)?;

    if config.rebalance {
        budget = budget.rebalanced(
            HistoryPruner::demand(history, separator_tokens),
            SnippetPruner::demand(candidates, separator_tokens),
        );
    }

    // ── Regions ────────────────────────────────────────────────────────────
    let pruned_history = HistoryPruner::new(counter, config.recent_turns_floor)
        .with_separator_cost(separator_tokens)
        .prune(history, budget.allocated_history)?;
    let pruned_snippets = SnippetPruner::new(config.min_snippet_tokens)
        .with_separator_cost(separator_tokens)
        .prune(candidates, budget.allocated_retrieval, scorer)?;

    let mut warnings = pruned_history.warnings;
    warnings.extend(pruned_snippets.warnings);

    // ── Sections ───────────────────────────────────────────────────────────
    let mut sections = Vec::with_capacity(2 + pruned_history.turns.len() + pruned_snippets.snippets.len());
    sections.push(ContextSection::fixed(SectionKind::System, system_prompt, system_tokens));
    sections.extend(pruned_history.turns.into_iter().map(|kept| ContextSection {
        kind: SectionKind::History,
        label: format!("turn #{}", kept.index),
        content: kept.turn.content,
        token_cost: kept.turn.token_cost,
        truncated: kept.truncated,
        origin: Some(kept.index),
        role: Some(kept.turn.role),
        relevance_score: None,
    }));
    sections.extend(pruned_snippets.snippets.into_iter().map(|s| ContextSection {
        kind: SectionKind::Retrieval,
        label: s.source_id,
        content: s.text,
        token_cost: s.token_cost,
        truncated: s.truncated,
        origin: Some(s.index),
        role: None,
        relevance_score: Some(s.relevance_score),
    }));
    sections.push(ContextSection::fixed(SectionKind::Query, query, query_tokens));

    // ── Global recount ─────────────────────────────────────────────────────
    let available = budget.available();
    let mut total = counter.count_tokens(&render_sections(&sections))?;
    let max_drops = sections
        .iter()
        .filter(|s| matches!(s.kind, SectionKind::History | SectionKind::Retrieval))
        .count();
    let mut drops = 0;

    while total > available && drops < max_drops {
        let victim = last_of(&sections, SectionKind::Retrieval)
            .or_else(|| first_of(&sections, SectionKind::History));
        let Some(position) = victim else { break };

        let removed = sections.remove(position);
        warn!(
            section = %removed.kind,
            label = %removed.label,
            total,
            available,
            "Recount exceeds capacity, dropping section"
        );
        warnings.push(TruncationWarning::DefensiveDrop {
            section: removed.kind,
            label: removed.label,
            token_cost: removed.token_cost,
        });
        drops += 1;
        total = counter.count_tokens(&render_sections(&sections))?;
    }

    if total > available {
        return Err(ContextError::Overflow { total, available });
    }

    debug!(
        total,
        available,
        sections = sections.len(),
        warnings = warnings.len(),
        "Assembled context"
    );

    Ok(PrunedContext {
        sections,
        total_token_cost: total,
        budget,
        warnings,
    })
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn render_sections(sections: &[ContextSection]) -> String {
    sections
        .iter()
        .filter(|s| !s.content.is_empty())
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

fn last_of(sections: &[ContextSection], kind: SectionKind) -> Option<usize> {
    sections.iter().rposition(|s| s.kind == kind)
}

fn first_of(sections: &[ContextSection], kind: SectionKind) -> Option<usize> {
    sections.iter().position(|s| s.kind == kind)
}

// ── Tests ─────────────────────────────────────────────────────────────────
