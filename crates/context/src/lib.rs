//! Token-budgeted context assembly.
//!
//! Given a fixed context window, a growing conversation and a set of
//! relevance-ranked retrieved candidates, decides what goes into the prompt
//! so that it never exceeds `total_context_window − reserved_response_tokens`.
//!
//! | Component | Role |
//! |-----------|------|
//! | [`BudgetAllocator`] | Splits the window into response, fixed, history and retrieval regions |
//! | [`HistoryPruner`] | Keeps the newest turns that fit; truncates an oversized newest turn |
//! | [`SnippetPruner`] | Greedy relevance-first selection with partial inclusion |
//! | [`ContextAssembler`] | Orders sections, recounts globally, trims defensively |
//!
//! Assembly is synchronous and pure: counters and scorers are passed in,
//! never looked up globally.

pub mod assembler;
pub mod budget;
pub mod history;
pub mod section;
pub mod snippet;
pub mod span;
pub mod token;
pub mod truncate;

pub use assembler::{ContextAssembler, ContextError, PrunedContext, SECTION_SEPARATOR, assemble_context};
pub use budget::{BudgetAllocator, BudgetError, TokenBudget};
pub use history::{ConversationTurn, HistoryPruner, KeptTurn, PrunedHistory};
pub use section::{ContextSection, SectionKind, TruncationWarning};
pub use snippet::{AcceptedSnippet, PrunedSnippets, SnippetPruner};
pub use span::{KeywordSpanScorer, PrefixSpanScorer};
#[cfg(feature = "hf-tokenizer")]
pub use token::HfTokenCounter;
pub use token::{HeuristicCounter, build_counter, estimate_tokens};
pub use truncate::truncate_prefix;
