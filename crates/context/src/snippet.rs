//! Retrieved-candidate selection under the retrieval budget.
//!
//! Greedy by relevance instead of an exact knapsack: one pass, one span
//! request per candidate at most, and a result that is easy to predict.

use std::cmp::Ordering;

use ragpilot_core::error::TokenizerError;
use ragpilot_core::{RetrievedCandidate, SpanScorer};
use tracing::debug;

use crate::section::TruncationWarning;

/// A candidate that made it into the retrieval region.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedSnippet {
    /// Position in the input slice.
    pub index: usize,
    pub source_id: String,
    pub text: String,
    pub relevance_score: f32,
    pub token_cost: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrunedSnippets {
    /// Relevance-descending.
    pub snippets: Vec<AcceptedSnippet>,
    /// Budget consumed, separators included.
    pub token_cost: usize,
    pub warnings: Vec<TruncationWarning>,
}

pub struct SnippetPruner {
    min_snippet_tokens: usize,
    separator_cost: usize,
}

impl SnippetPruner {
    pub fn new(min_snippet_tokens: usize) -> Self {
        Self {
            min_snippet_tokens,
            separator_cost: 0,
        }
    }

    /// Charge `tokens` on top of every accepted snippet.
    pub fn with_separator_cost(mut self, tokens: usize) -> Self {
        self.separator_cost = tokens;
        self
    }

    /// Summed cost of every candidate, with `separator_cost` charged per
    /// candidate.
    pub fn demand(candidates: &[RetrievedCandidate], separator_cost: usize) -> usize {
        candidates.iter().map(|c| c.token_cost + separator_cost).sum()
    }

    /// Select candidates for `budget` tokens.
    ///
    /// Order: relevance descending (NaN last), then smaller cost, then input
    /// position. Whole candidates are taken while they fit; a candidate that
    /// does not fit is offered to `scorer` for the remaining budget and kept
    /// only if the span is at least `min_snippet_tokens`. Budget is never
    /// held back for a later candidate. Each accepted snippet also uses
    /// `separator_cost` of the budget.
    pub fn prune(
        &self,
        candidates: &[RetrievedCandidate],
        budget: usize,
        scorer: &dyn SpanScorer,
    ) -> Result<PrunedSnippets, TokenizerError> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| relevance_order(&candidates[a], &candidates[b]));

        let mut out = PrunedSnippets::default();
        let mut remaining = budget;

        for index in order {
            let candidate = &candidates[index];
            if candidate.token_cost + self.separator_cost <= remaining {
                remaining -= candidate.token_cost + self.separator_cost;
                out.snippets.push(accept(
                    index,
                    candidate,
                    candidate.text.clone(),
                    candidate.token_cost,
                    false,
                ));
                continue;
            }

            let room = remaining.saturating_sub(self.separator_cost);
            if room > 0 && room >= self.min_snippet_tokens {
                let span = scorer.best_span(&candidate.text, room)?;
                if !span.text.is_empty()
                    && span.token_cost >= self.min_snippet_tokens
                    && span.token_cost <= room
                {
                    remaining -= span.token_cost + self.separator_cost;
                    out.warnings.push(TruncationWarning::SnippetTruncated {
                        source_id: candidate.source_id.clone(),
                        original_cost: candidate.token_cost,
                        kept_cost: span.token_cost,
                    });
                    out.snippets
                        .push(accept(index, candidate, span.text, span.token_cost, true));
                    continue;
                }
            }

            out.warnings.push(TruncationWarning::SnippetDropped {
                source_id: candidate.source_id.clone(),
                token_cost: candidate.token_cost,
            });
        }

        out.token_cost = budget - remaining;
        debug!(
            accepted = out.snippets.len(),
            total = candidates.len(),
            used = out.token_cost,
            budget,
            "Pruned retrieved snippets"
        );
        Ok(out)
    }
}

fn accept(
    index: usize,
    candidate: &RetrievedCandidate,
    text: String,
    token_cost: usize,
    truncated: bool,
) -> AcceptedSnippet {
    AcceptedSnippet {
        index,
        source_id: candidate.source_id.clone(),
        text,
        relevance_score: candidate.relevance_score,
        token_cost,
        truncated,
    }
}

/// Descending relevance with NaN last, then ascending cost. Used with a
/// stable sort, so equal candidates keep their input order.
pub fn relevance_order(a: &RetrievedCandidate, b: &RetrievedCandidate) -> Ordering {
    let by_score = match (a.relevance_score.is_nan(), b.relevance_score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.relevance_score.total_cmp(&a.relevance_score),
    };
    by_score.then(a.token_cost.cmp(&b.token_cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::PrefixSpanScorer;
    use crate::test_support::{WordCounter, candidate};

    fn ids(pruned: &PrunedSnippets) -> Vec<&str> {
        pruned.snippets.iter().map(|s| s.source_id.as_str()).collect()
    }

    #[test]
    fn greedy_accepts_then_truncates() {
        let candidates = vec![
            candidate("A", 100, 0.9),
            candidate("B", 200, 0.8),
            candidate("C", 150, 0.7),
        ];
        let scorer = PrefixSpanScorer::new(WordCounter);
        let pruned = SnippetPruner::new(16).prune(&candidates, 400, &scorer).unwrap();

        assert_eq!(ids(&pruned), vec!["A", "B", "C"]);
        let c = &pruned.snippets[2];
        assert!(c.truncated);
        assert_eq!(c.token_cost, 100);
        assert_eq!(pruned.token_cost, 400);
        assert_eq!(
            pruned.warnings,
            vec![TruncationWarning::SnippetTruncated {
                source_id: "C".into(),
                original_cost: 150,
                kept_cost: 100
            }]
        );
    }

    #[test]
    fn remainder_below_minimum_drops_candidate() {
        let candidates = vec![
            candidate("A", 100, 0.9),
            candidate("B", 200, 0.8),
            candidate("C", 150, 0.7),
        ];
        let scorer = PrefixSpanScorer::new(WordCounter);
        let pruned = SnippetPruner::new(120).prune(&candidates, 400, &scorer).unwrap();

        assert_eq!(ids(&pruned), vec!["A", "B"]);
        assert_eq!(pruned.token_cost, 300);
        assert_eq!(
            pruned.warnings,
            vec![TruncationWarning::SnippetDropped {
                source_id: "C".into(),
                token_cost: 150
            }]
        );
    }

    #[test]
    fn skipped_candidate_does_not_block_smaller_ones() {
        let candidates = vec![
            candidate("big", 300, 0.9),
            candidate("small", 40, 0.5),
        ];
        let scorer = PrefixSpanScorer::new(WordCounter);
        let pruned = SnippetPruner::new(100).prune(&candidates, 50, &scorer).unwrap();
        assert_eq!(ids(&pruned), vec!["small"]);
    }

    #[test]
    fn separator_cost_is_charged_per_snippet() {
        let candidates = vec![candidate("top", 30, 0.9), candidate("second", 19, 0.5)];
        let scorer = PrefixSpanScorer::new(WordCounter);

        let exact = SnippetPruner::new(16)
            .with_separator_cost(1)
            .prune(&candidates, 51, &scorer)
            .unwrap();
        assert_eq!(ids(&exact), vec!["top", "second"]);
        assert!(exact.snippets.iter().all(|s| !s.truncated));
        assert_eq!(exact.token_cost, 51);

        let short = SnippetPruner::new(16)
            .with_separator_cost(1)
            .prune(&candidates, 50, &scorer)
            .unwrap();
        assert!(short.snippets[1].truncated);
        assert_eq!(short.snippets[1].token_cost, 18);
        assert_eq!(short.token_cost, 50);
    }

    #[test]
    fn zero_budget_yields_nothing() {
        let candidates = vec![candidate("A", 10, 0.9)];
        let scorer = PrefixSpanScorer::new(WordCounter);
        let pruned = SnippetPruner::new(0).prune(&candidates, 0, &scorer).unwrap();
        assert!(pruned.snippets.is_empty());
        assert_eq!(pruned.token_cost, 0);
    }

    #[test]
    fn zero_cost_candidates_are_free() {
        let mut empty = candidate("empty", 0, 0.1);
        empty.text.clear();
        let candidates = vec![candidate("A", 10, 0.9), empty];
        let scorer = PrefixSpanScorer::new(WordCounter);
        let pruned = SnippetPruner::new(16).prune(&candidates, 10, &scorer).unwrap();
        assert_eq!(ids(&pruned), vec!["A", "empty"]);
    }

    #[test]
    fn ties_prefer_cheaper_then_input_order() {
        let candidates = vec![
            candidate("x", 30, 0.5),
            candidate("y", 10, 0.5),
            candidate("z", 10, 0.5),
            candidate("nan", 1, f32::NAN),
            candidate("top", 50, 0.6),
        ];
        let scorer = PrefixSpanScorer::new(WordCounter);
        let pruned = SnippetPruner::new(0).prune(&candidates, 1000, &scorer).unwrap();
        assert_eq!(ids(&pruned), vec!["top", "y", "z", "x", "nan"]);
    }
}
