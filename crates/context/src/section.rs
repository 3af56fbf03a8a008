//! Sections of an assembled context and the warnings attached to them.

use ragpilot_core::Role;
use serde::{Deserialize, Serialize};

/// Section kinds, in the order they appear in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    System,
    History,
    Retrieval,
    /// The current question. Always last, never pruned.
    Query,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::System => "system",
            SectionKind::History => "history",
            SectionKind::Retrieval => "retrieval",
            SectionKind::Query => "query",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of the assembled prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSection {
    pub kind: SectionKind,

    /// Human-readable origin: a source id for retrieval, `turn #i` for history.
    pub label: String,

    pub content: String,

    /// Exact counter cost of `content`.
    pub token_cost: usize,

    /// The content was shortened from its original form.
    pub truncated: bool,

    /// Index into the caller's history or candidate slice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<usize>,

    /// Speaker of a history turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Relevance of a retrieval snippet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl ContextSection {
    pub(crate) fn fixed(kind: SectionKind, content: &str, token_cost: usize) -> Self {
        Self {
            kind,
            label: kind.as_str().into(),
            content: content.to_string(),
            token_cost,
            truncated: false,
            origin: None,
            role: None,
            relevance_score: None,
        }
    }
}

/// Non-fatal record of content that was shortened or left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TruncationWarning {
    HistoryTurnDropped {
        index: usize,
        token_cost: usize,
    },
    HistoryTurnTruncated {
        index: usize,
        original_cost: usize,
        kept_cost: usize,
    },
    /// Fewer recent turns survived than the configured floor.
    FloorUnmet {
        requested: usize,
        kept: usize,
    },
    SnippetDropped {
        source_id: String,
        token_cost: usize,
    },
    SnippetTruncated {
        source_id: String,
        original_cost: usize,
        kept_cost: usize,
    },
    /// Removed after assembly because the global recount ran over.
    DefensiveDrop {
        section: SectionKind,
        label: String,
        token_cost: usize,
    },
}

impl std::fmt::Display for TruncationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HistoryTurnDropped { index, token_cost } => {
                write!(f, "history turn #{index} dropped ({token_cost} tokens)")
            }
            Self::HistoryTurnTruncated {
                index,
                original_cost,
                kept_cost,
            } => write!(
                f,
                "history turn #{index} truncated from {original_cost} to {kept_cost} tokens"
            ),
            Self::FloorUnmet { requested, kept } => write!(
                f,
                "only {kept} of the {requested} most recent turns fit the history budget"
            ),
            Self::SnippetDropped {
                source_id,
                token_cost,
            } => write!(f, "snippet {source_id} dropped ({token_cost} tokens)"),
            Self::SnippetTruncated {
                source_id,
                original_cost,
                kept_cost,
            } => write!(
                f,
                "snippet {source_id} truncated from {original_cost} to {kept_cost} tokens"
            ),
            Self::DefensiveDrop {
                section,
                label,
                token_cost,
            } => write!(
                f,
                "{section} section {label} dropped after recount ({token_cost} tokens)"
            ),
        }
    }
}
