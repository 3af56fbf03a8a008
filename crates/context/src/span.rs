//! Span scorers: shorten a retrieved candidate that does not fit whole.

use std::collections::HashSet;

use ragpilot_core::error::TokenizerError;
use ragpilot_core::retrieval::terms;
use ragpilot_core::{Span, SpanScorer, TokenCounter};

use crate::truncate::truncate_prefix;

/// Keeps the largest fitting prefix.
pub struct PrefixSpanScorer<C> {
    counter: C,
}

impl<C: TokenCounter> PrefixSpanScorer<C> {
    pub fn new(counter: C) -> Self {
        Self { counter }
    }
}

impl<C: TokenCounter> SpanScorer for PrefixSpanScorer<C> {
    fn best_span(&self, text: &str, max_tokens: usize) -> Result<Span, TokenizerError> {
        truncate_prefix(&self.counter, text, max_tokens)
    }
}

/// Picks the contiguous run of lines with the most query-term hits.
///
/// Lines are costed one by one; the window search is a two-pointer sweep, so
/// it needs one counter call per line plus one for the chosen window. When
/// the joined window costs more than the sum of its lines (tokenizer merges
/// across newlines), the window is prefix-truncated. When no line fits or no
/// line mentions a query term, falls back to prefix truncation starting at
/// the line with the most hits.
pub struct KeywordSpanScorer<C> {
    counter: C,
    terms: HashSet<String>,
}

impl<C: TokenCounter> KeywordSpanScorer<C> {
    pub fn new(counter: C, query: &str) -> Self {
        Self {
            counter,
            terms: terms(query).into_iter().collect(),
        }
    }

    fn hits(&self, line: &str) -> usize {
        terms(line)
            .iter()
            .filter(|t| self.terms.contains(t.as_str()))
            .count()
    }
}

impl<C: TokenCounter> SpanScorer for KeywordSpanScorer<C> {
    fn best_span(&self, text: &str, max_tokens: usize) -> Result<Span, TokenizerError> {
        let full = self.counter.count_tokens(text)?;
        if full <= max_tokens {
            return Ok(Span {
                text: text.to_string(),
                token_cost: full,
            });
        }

        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let hits: Vec<usize> = lines.iter().map(|l| self.hits(l)).collect();
        if self.terms.is_empty() || hits.iter().all(|&h| h == 0) {
            return truncate_prefix(&self.counter, text, max_tokens);
        }

        let costs = lines
            .iter()
            .map(|l| self.counter.count_tokens(l))
            .collect::<Result<Vec<_>, _>>()?;

        // (hits, start, end); strict comparison keeps the earliest window on ties.
        let mut best: Option<(usize, usize, usize)> = None;
        let mut end = 0;
        let mut window_cost = 0;
        let mut window_hits = 0;
        for start in 0..lines.len() {
            if end < start {
                end = start;
                window_cost = 0;
                window_hits = 0;
            }
            while end < lines.len() && window_cost + costs[end] <= max_tokens {
                window_cost += costs[end];
                window_hits += hits[end];
                end += 1;
            }
            if end > start {
                if window_hits > 0 && best.is_none_or(|(h, _, _)| window_hits > h) {
                    best = Some((window_hits, start, end));
                }
                window_cost -= costs[start];
                window_hits -= hits[start];
            }
        }

        match best {
            Some((_, start, end)) => {
                let window: String = lines[start..end].concat();
                truncate_prefix(&self.counter, &window, max_tokens)
            }
            None => {
                let richest = first_max_index(&hits);
                let offset: usize = lines[..richest].iter().map(|l| l.len()).sum();
                truncate_prefix(&self.counter, &text[offset..], max_tokens)
            }
        }
    }
}

fn first_max_index(values: &[usize]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WordCounter;
    use crate::token::HeuristicCounter;

    const SOURCE: &str = "use std::fmt;\n\
                          struct Config { port: u16 }\n\
                          fn parse_budget(total: usize) -> usize {\n\
                          \x20   total - reserved_budget\n\
                          }\n\
                          fn unrelated() {}\n";

    #[test]
    fn prefix_scorer_keeps_start() {
        let scorer = PrefixSpanScorer::new(HeuristicCounter);
        let span = scorer.best_span("abcdefghijkl", 2).unwrap();
        assert_eq!(span.text, "abcdefgh");
        assert_eq!(span.token_cost, 2);
    }

    #[test]
    fn keyword_scorer_returns_whole_text_when_it_fits() {
        let scorer = KeywordSpanScorer::new(WordCounter, "budget");
        let span = scorer.best_span("one two three", 5).unwrap();
        assert_eq!(span.text, "one two three");
        assert_eq!(span.token_cost, 3);
    }

    #[test]
    fn keyword_scorer_picks_window_with_most_hits() {
        let scorer = KeywordSpanScorer::new(WordCounter, "parse_budget total reserved_budget");
        let span = scorer.best_span(SOURCE, 10).unwrap();
        assert!(span.text.starts_with("fn parse_budget"));
        assert!(span.text.contains("reserved_budget"));
        assert!(span.token_cost <= 10);
    }

    #[test]
    fn keyword_scorer_without_hits_falls_back_to_prefix() {
        let scorer = KeywordSpanScorer::new(WordCounter, "nothing matches");
        let span = scorer.best_span(SOURCE, 3).unwrap();
        assert!(SOURCE.starts_with(&span.text));
        assert_eq!(span.token_cost, 3);
    }

    #[test]
    fn keyword_scorer_truncates_inside_oversized_line() {
        let text = format!("intro\n{}\n", vec!["budget"; 40].join(" "));
        let scorer = KeywordSpanScorer::new(WordCounter, "budget");
        let span = scorer.best_span(&text, 5).unwrap();
        assert!(span.text.starts_with("budget"));
        assert_eq!(span.token_cost, 5);
    }

    #[test]
    fn first_max_prefers_earliest() {
        assert_eq!(first_max_index(&[0, 3, 1, 3]), 1);
        assert_eq!(first_max_index(&[0, 0]), 0);
    }
}
