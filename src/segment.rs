//! Sentence-boundary text segmenter.
//!
//! Splits raw text into chunks that respect a character budget, accumulating
//! whole sentences greedily. When a chunk closes, the next one is seeded with
//! the trailing `overlap_chars` characters of the closed chunk so adjacent
//! chunks share context. Sentence boundaries come from UAX #29 segmentation,
//! which handles Devanagari and Malayalam terminators as well as Latin
//! punctuation.

use anyhow::{bail, Result};
use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into overlap-stitched chunks of at most `max_chars`
/// characters (a single oversized sentence is emitted as-is).
///
/// Zero sentences produce an empty vec; no chunk is ever empty.
/// `overlap_chars = 0` disables carry-over.
pub fn segment(text: &str, max_chars: usize, overlap_chars: usize) -> Result<Vec<String>> {
    if max_chars == 0 {
        bail!("max_chars must be > 0");
    }

    let sentences: Vec<&str> = text
        .unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut total_chars = 0usize;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();

        if total_chars + sentence_chars > max_chars && !current.is_empty() {
            chunks.push(current.join(" "));

            if overlap_chars > 0 {
                let carry = tail_chars(chunks.last().unwrap(), overlap_chars)
                    .trim()
                    .to_string();
                total_chars = carry.chars().count() + sentence_chars;
                current = vec![carry, sentence.to_string()];
            } else {
                total_chars = sentence_chars;
                current = vec![sentence.to_string()];
            }
        } else {
            current.push(sentence.to_string());
            total_chars += sentence_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    Ok(chunks)
}

/// Last `n` characters of `s`, respecting char boundaries.
fn tail_chars(s: &str, n: usize) -> &str {
    let char_count = s.chars().count();
    if char_count <= n {
        return s;
    }
    let (idx, _) = s.char_indices().nth(char_count - n).unwrap();
    &s[idx..]
}
