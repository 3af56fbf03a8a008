//! Prefix truncation under a token cap.

use ragpilot_core::error::TokenizerError;
use ragpilot_core::{Span, TokenCounter};

/// The largest prefix of `text` whose token cost is at most `max_tokens`.
///
/// Binary-searches over char boundaries, so the result is always valid UTF-8
/// and costs O(log n) counter calls. Assumes prefix cost never decreases as
/// the prefix grows. The returned cost is the counter's exact value for the
/// returned text. May return an empty span.
pub fn truncate_prefix(
    counter: &dyn TokenCounter,
    text: &str,
    max_tokens: usize,
) -> Result<Span, TokenizerError> {
    let full = counter.count_tokens(text)?;
    if full <= max_tokens {
        return Ok(Span {
            text: text.to_string(),
            token_cost: full,
        });
    }
    if max_tokens == 0 {
        return Ok(empty_span());
    }

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    // boundaries[lo] always fits, boundaries[hi + 1..] never does.
    let mut lo = 0;
    let mut best_cost = 0;
    let mut hi = boundaries.len() - 1;
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        let cost = counter.count_tokens(&text[..boundaries[mid]])?;
        if cost <= max_tokens {
            lo = mid;
            best_cost = cost;
        } else {
            hi = mid - 1;
        }
    }

    if lo == 0 {
        return Ok(empty_span());
    }
    Ok(Span {
        text: text[..boundaries[lo]].to_string(),
        token_cost: best_cost,
    })
}

fn empty_span() -> Span {
    Span {
        text: String::new(),
        token_cost: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WordCounter;
    use crate::token::HeuristicCounter;

    #[test]
    fn text_that_fits_is_returned_whole() {
        let span = truncate_prefix(&HeuristicCounter, "hello world", 10).unwrap();
        assert_eq!(span.text, "hello world");
        assert_eq!(span.token_cost, 3);
    }

    #[test]
    fn truncates_to_largest_fitting_prefix() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let span = truncate_prefix(&HeuristicCounter, text, 3).unwrap();
        assert_eq!(span.text, "abcdefghijkl");
        assert_eq!(span.token_cost, 3);
    }

    #[test]
    fn word_budget_is_filled_exactly() {
        let text = (0..900).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let span = truncate_prefix(&WordCounter, &text, 200).unwrap();
        assert_eq!(span.token_cost, 200);
        assert!(text.starts_with(&span.text));
        assert!(span.text.ends_with("w199 ") || span.text.ends_with("w199"));
    }

    #[test]
    fn zero_budget_gives_empty_span() {
        let span = truncate_prefix(&HeuristicCounter, "some text", 0).unwrap();
        assert!(span.text.is_empty());
        assert_eq!(span.token_cost, 0);
    }

    #[test]
    fn never_splits_a_char() {
        let text = "日本語のテキストです";
        for max in 0..8 {
            let span = truncate_prefix(&HeuristicCounter, text, max).unwrap();
            assert!(text.is_char_boundary(span.text.len()));
            assert!(span.token_cost <= max);
        }
    }
}
