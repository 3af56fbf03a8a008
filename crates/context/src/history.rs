//! Conversation history pruning.
//!
//! Sliding window from the newest turn backwards: a turn is kept while it
//! fits, and the first one that does not fit ends the window. Everything
//! older is dropped outright. A newest turn that alone exceeds the budget is
//! prefix-truncated and kept by itself.
//!
//! Every kept turn is also charged `separator_cost`, the price of the blank
//! line that separates it from its neighbour in the rendered prompt.

use chrono::{DateTime, Utc};
use ragpilot_core::error::TokenizerError;
use ragpilot_core::{Message, Role, TokenCounter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::section::TruncationWarning;
use crate::truncate::truncate_prefix;

/// A measured snapshot of one session message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub token_cost: usize,
}

impl ConversationTurn {
    pub fn new(
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        token_cost: usize,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            token_cost,
        }
    }

    /// Snapshot `message` with its exact token cost.
    pub fn measure(message: &Message, counter: &dyn TokenCounter) -> Result<Self, TokenizerError> {
        Ok(Self {
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp,
            token_cost: counter.count_tokens(&message.content)?,
        })
    }
}

/// A turn that survived pruning.
#[derive(Debug, Clone, PartialEq)]
pub struct KeptTurn {
    /// Position in the input slice.
    pub index: usize,
    pub turn: ConversationTurn,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrunedHistory {
    /// Chronological.
    pub turns: Vec<KeptTurn>,
    /// Budget consumed, separators included.
    pub token_cost: usize,
    pub warnings: Vec<TruncationWarning>,
}

pub struct HistoryPruner<'a> {
    counter: &'a dyn TokenCounter,
    recent_turns_floor: usize,
    separator_cost: usize,
}

impl<'a> HistoryPruner<'a> {
    pub fn new(counter: &'a dyn TokenCounter, recent_turns_floor: usize) -> Self {
        Self {
            counter,
            recent_turns_floor,
            separator_cost: 0,
        }
    }

    /// Charge `tokens` on top of every kept turn.
    pub fn with_separator_cost(mut self, tokens: usize) -> Self {
        self.separator_cost = tokens;
        self
    }

    /// What the history region would need to keep every turn, with
    /// `separator_cost` charged per turn.
    pub fn demand(turns: &[ConversationTurn], separator_cost: usize) -> usize {
        turns.iter().map(|t| t.token_cost + separator_cost).sum()
    }

    /// Trim `turns` (oldest first) to fit `budget`.
    pub fn prune(
        &self,
        turns: &[ConversationTurn],
        budget: usize,
    ) -> Result<PrunedHistory, TokenizerError> {
        let mut out = PrunedHistory::default();
        let mut boundary = None;

        for (index, turn) in turns.iter().enumerate().rev() {
            let charged = turn.token_cost + self.separator_cost;
            if out.token_cost + charged <= budget {
                out.token_cost += charged;
                out.turns.push(KeptTurn {
                    index,
                    turn: turn.clone(),
                    truncated: false,
                });
            } else {
                boundary = Some(index);
                break;
            }
        }

        if let Some(boundary) = boundary {
            let mut dropped_until = boundary + 1;
            if out.turns.is_empty() {
                // The newest turn alone is over budget.
                let newest = &turns[boundary];
                let cap = budget.saturating_sub(self.separator_cost);
                let span = truncate_prefix(self.counter, &newest.content, cap)?;
                if !span.text.is_empty() {
                    out.warnings.push(TruncationWarning::HistoryTurnTruncated {
                        index: boundary,
                        original_cost: newest.token_cost,
                        kept_cost: span.token_cost,
                    });
                    out.token_cost = span.token_cost + self.separator_cost;
                    out.turns.push(KeptTurn {
                        index: boundary,
                        turn: ConversationTurn {
                            content: span.text,
                            token_cost: span.token_cost,
                            ..newest.clone()
                        },
                        truncated: true,
                    });
                    dropped_until = boundary;
                }
            }

            for (index, turn) in turns[..dropped_until].iter().enumerate() {
                out.warnings.push(TruncationWarning::HistoryTurnDropped {
                    index,
                    token_cost: turn.token_cost,
                });
            }
            debug!(
                kept = out.turns.len(),
                dropped = dropped_until,
                budget,
                "Pruned conversation history"
            );
        }

        out.turns.reverse();

        let requested = self.recent_turns_floor.min(turns.len());
        if out.turns.len() < requested {
            out.warnings.push(TruncationWarning::FloorUnmet {
                requested,
                kept: out.turns.len(),
            });
        }

        Ok(out)
    }
}
