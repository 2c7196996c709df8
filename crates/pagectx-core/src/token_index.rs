//! Inverted index from normalized text to line positions.
//!
//! Two key spaces are maintained over the [`LineStore`]:
//!
//! - **exact keys**: the whole normalized line, for verbatim phrase lookups;
//! - **word keys**: individual whitespace tokens, for partial or reordered
//!   phrasing.
//!
//! # Build Algorithm
//!
//! 1. Normalize each line (trim, lowercase).
//! 2. If the normalized length is in `3..200` chars, append the line index
//!    to its exact key, unless that key already holds [`EXACT_KEY_CAP`] entries.
//! 3. Split on whitespace, keep tokens longer than 3 chars that are not
//!    punctuation-only, take the first [`MAX_TOKENS_PER_LINE`], and append
//!    the line index to each token's list (once per line, capped at
//!    [`WORD_KEY_CAP`]).
//!
//! The caps bound memory on pathological inputs such as a repeated footer
//! on every page. The normalized text of every line is kept alongside the
//! keys so verification scans do not re-normalize per query. The index is
//! read-only once built.

use std::collections::HashMap;

use crate::lines::LineStore;
use crate::text::{char_len, normalize};

/// Maximum line indices stored per exact (whole-line) key.
pub const EXACT_KEY_CAP: usize = 50;
/// Maximum line indices stored per word key.
pub const WORD_KEY_CAP: usize = 100;
/// Lines this long (in chars) or longer are not stored as exact keys.
pub const MAX_EXACT_KEY_CHARS: usize = 200;
/// Only the first N qualifying tokens of a line are indexed.
pub const MAX_TOKENS_PER_LINE: usize = 10;

/// Read-only inverted index over a [`LineStore`].
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    exact: HashMap<String, Vec<usize>>,
    words: HashMap<String, Vec<usize>>,
    normalized: Vec<String>,
}

/// Whether `token` qualifies as a word key.
pub fn is_indexable_token(token: &str) -> bool {
    char_len(token) > 3 && token.chars().any(char::is_alphanumeric)
}

impl TokenIndex {
    pub fn build(store: &LineStore) -> Self {
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut words: HashMap<String, Vec<usize>> = HashMap::new();
        let mut normalized = Vec::with_capacity(store.len());

        for line in store.iter() {
            let norm = normalize(&line.text);
            let len = char_len(&norm);

            if len > 2 && len < MAX_EXACT_KEY_CHARS {
                let entry = exact.entry(norm.clone()).or_default();
                if entry.len() < EXACT_KEY_CAP {
                    entry.push(line.index);
                }
            }

            let mut seen: Vec<&str> = Vec::with_capacity(MAX_TOKENS_PER_LINE);
            for token in norm
                .split_whitespace()
                .filter(|t| is_indexable_token(t))
                .take(MAX_TOKENS_PER_LINE)
            {
                if seen.contains(&token) {
                    continue;
                }
                seen.push(token);
                let entry = words.entry(token.to_string()).or_default();
                if entry.len() < WORD_KEY_CAP {
                    entry.push(line.index);
                }
            }

            normalized.push(norm);
        }

        Self {
            exact,
            words,
            normalized,
        }
    }

    /// Line indices whose whole normalized text equals `key`.
    pub fn exact(&self, key: &str) -> &[usize] {
        self.exact.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Line indices containing the word `token` (already normalized).
    pub fn word(&self, token: &str) -> &[usize] {
        self.words.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Normalized text of the line at global `index`.
    pub fn normalized_line(&self, index: usize) -> Option<&str> {
        self.normalized.get(index).map(String::as_str)
    }

    /// Normalized text of every line, in global index order.
    pub fn normalized_lines(&self) -> &[String] {
        &self.normalized
    }

    pub fn exact_key_count(&self) -> usize {
        self.exact.len()
    }

    pub fn word_key_count(&self) -> usize {
        self.words.len()
    }
}
