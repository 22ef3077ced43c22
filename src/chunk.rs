//! Sentence-boundary text chunker.
//!
//! Splits extracted document text into bounded, overlapping chunks. Text is
//! cut on sentence-terminal punctuation (`.`, `!`, `?`) and the fragments
//! are accumulated greedily. When the next fragment would push the running
//! chunk past `max_chunk_size` characters, the chunk is closed and the next
//! one is seeded with the last `overlap / 10` words of the closed chunk.
//!
//! The size check happens before each append, so a chunk never grows once
//! it is over the limit, but a single long sentence (or an overlap seed plus
//! a sentence) can still exceed it.

/// Words carried into the next chunk per unit of `overlap`.
const OVERLAP_CHARS_PER_WORD: usize = 10;

/// Collapse every whitespace run to a single space and trim the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into chunks of roughly `max_chunk_size` characters, carrying
/// `overlap / 10` trailing words from each chunk into the next.
///
/// Text shorter than `max_chunk_size` comes back as a single chunk, and
/// blank text yields no chunks at all.
pub fn chunk_text(text: &str, max_chunk_size: usize, overlap: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if text.chars().count() < max_chunk_size {
        return vec![trimmed.to_string()];
    }

    let overlap_words = overlap / OVERLAP_CHARS_PER_WORD;
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for fragment in text.split(['.', '!', '?']) {
        let sentence = fragment.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len > max_chunk_size && !current.is_empty() {
            let closed = current.trim().to_string();
            current = overlap_seed(&closed, overlap_words);
            chunks.push(closed);
            // the separator counts toward the new chunk even with no seed
            current.push(' ');
        } else if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
        current_len = current.chars().count();
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }

    chunks
}

/// The last `n` words of `chunk`, or nothing when the chunk has `n` words
/// or fewer.
fn overlap_seed(chunk: &str, n: usize) -> String {
    let words: Vec<&str> = chunk.split_whitespace().collect();
    if n == 0 || words.len() <= n {
        return String::new();
    }
    words[words.len() - n..].join(" ")
}
