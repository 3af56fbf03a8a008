//! Splitting files into line-based chunks and extracting their keywords.

use std::collections::HashMap;

use ragpilot_context::truncate_prefix;
use ragpilot_core::TokenCounter;
use ragpilot_core::error::TokenizerError;
use ragpilot_core::retrieval::terms;
use serde::{Deserialize, Serialize};

/// Keywords kept per chunk.
pub const MAX_KEYWORDS: usize = 12;

/// A contiguous run of lines from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub content: String,
    pub keywords: Vec<String>,
    pub token_cost: usize,
}

/// Split `text` into chunks of at most `max_tokens` each.
///
/// Lines are packed greedily in order. A single line that exceeds the cap on
/// its own becomes its own prefix-truncated chunk.
pub fn split_into_chunks(
    text: &str,
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Result<Vec<Chunk>, TokenizerError> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_cost = 0;
    let mut start_line = 1;

    for (i, line) in text.split_inclusive('\n').enumerate() {
        let line_no = i + 1;
        let line_cost = counter.count_tokens(line)?;

        if !current.is_empty() && current_cost + line_cost > max_tokens {
            chunks.push(finish(&current, start_line, line_no - 1, counter)?);
            current.clear();
            current_cost = 0;
        }
        if current.is_empty() {
            start_line = line_no;
        }

        if line_cost > max_tokens {
            let span = truncate_prefix(counter, line, max_tokens)?;
            chunks.push(finish(&span.text, line_no, line_no, counter)?);
            continue;
        }

        current.push_str(line);
        current_cost += line_cost;
    }

    if !current.trim().is_empty() {
        let end_line = start_line + current.lines().count().max(1) - 1;
        chunks.push(finish(&current, start_line, end_line, counter)?);
    }

    chunks.retain(|c| !c.content.trim().is_empty());
    Ok(chunks)
}

fn finish(
    content: &str,
    start_line: usize,
    end_line: usize,
    counter: &dyn TokenCounter,
) -> Result<Chunk, TokenizerError> {
    Ok(Chunk {
        start_line,
        end_line,
        content: content.to_string(),
        keywords: keywords(content, MAX_KEYWORDS),
        token_cost: counter.count_tokens(content)?,
    })
}

/// The `limit` most frequent terms of `text`; ties go to the earlier term.
pub fn keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, term) in terms(text).into_iter().enumerate() {
        counts.entry(term).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
    ranked.into_iter().take(limit).map(|(term, _)| term).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpilot_context::HeuristicCounter;

    #[test]
    fn small_file_is_one_chunk() {
        let text = "fn main() {\n    println!(\"hi\");\n}\n";
        let chunks = split_into_chunks(text, 100, &HeuristicCounter).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].content, text);
    }

    #[test]
    fn chunks_respect_the_cap_and_line_numbers() {
        // Each line is 8 bytes -> 2 tokens.
        let text = "aaaaaaa\n".repeat(10);
        let chunks = split_into_chunks(&text, 6, &HeuristicCounter).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (4, 6));
        assert_eq!((chunks[3].start_line, chunks[3].end_line), (10, 10));
        assert!(chunks.iter().all(|c| c.token_cost <= 6));
    }

    #[test]
    fn oversized_line_is_truncated() {
        let text = format!("short\n{}\nshort\n", "x".repeat(400));
        let chunks = split_into_chunks(&text, 10, &HeuristicCounter).unwrap();
        let long = chunks.iter().find(|c| c.start_line == 2).unwrap();
        assert_eq!(long.end_line, 2);
        assert_eq!(long.token_cost, 10);
        assert!(chunks.iter().all(|c| c.token_cost <= 10));
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let chunks = split_into_chunks("one\ntwo", 100, &HeuristicCounter).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(split_into_chunks("\n\n  \n", 100, &HeuristicCounter).unwrap().is_empty());
    }

    #[test]
    fn keywords_rank_by_frequency() {
        let kws = keywords("budget split budget history budget split window", 3);
        assert_eq!(kws, vec!["budget", "split", "history"]);
    }
}
