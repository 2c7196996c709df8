//! Occurrence lookup over the line store and token index.
//!
//! Lookup is index-assisted, not index-only. Candidate lines are the union of:
//!
//! 1. the exact-key hit for the whole normalized fragment;
//! 2. word-key hits for each fragment token longer than 2 chars, kept only
//!    when the line contains every such token;
//! 3. a linear containment scan over all normalized lines.
//!
//! The scan guarantees no false negatives for fragments inside a single
//! line; fragments that span line breaks are matched against consecutive
//! non-blank lines. Cost is `O(total lines)` per query.

use std::collections::BTreeSet;

use crate::lines::LineStore;
use crate::models::{Heading, Occurrence};
use crate::text::{char_len, normalize, truncate_chars, window_around};
use crate::token_index::TokenIndex;

/// Tunables for occurrence lookup and window rendering.
#[derive(Debug, Clone)]
pub struct LocatorParams {
    /// Lines on each side of a generic occurrence.
    pub occurrence_radius: usize,
    /// Lines on each side of a heading.
    pub heading_radius: usize,
    /// Cap on a rendered occurrence window, in chars.
    pub max_window_chars: usize,
    /// Cap on a rendered heading window, in chars.
    pub max_heading_window_chars: usize,
    /// Cap on an occurrence snippet, in chars.
    pub max_snippet_chars: usize,
    /// Fragments are truncated to this many chars before searching.
    pub max_fragment_chars: usize,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            occurrence_radius: 8,
            heading_radius: 20,
            max_window_chars: 4000,
            max_heading_window_chars: 6000,
            max_snippet_chars: 200,
            max_fragment_chars: 1000,
        }
    }
}

/// Borrowed view over the built structures used to answer lookups.
pub struct Locator<'a> {
    store: &'a LineStore,
    tokens: &'a TokenIndex,
    params: &'a LocatorParams,
}

impl<'a> Locator<'a> {
    pub fn new(store: &'a LineStore, tokens: &'a TokenIndex, params: &'a LocatorParams) -> Self {
        Self {
            store,
            tokens,
            params,
        }
    }

    /// Global indices of lines matching `fragment`, ascending and unique.
    pub fn find_lines(&self, fragment: &str) -> Vec<usize> {
        let norm = normalize(truncate_chars(fragment, self.params.max_fragment_chars));
        if norm.is_empty() {
            return Vec::new();
        }

        let segments: Vec<&str> = norm
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() > 1 {
            return self.scan_consecutive(&segments);
        }
        let needle = segments.first().copied().unwrap_or(norm.as_str());

        let mut hits: BTreeSet<usize> = self.tokens.exact(needle).iter().copied().collect();

        let tokens: Vec<&str> = needle
            .split_whitespace()
            .filter(|t| char_len(t) > 2)
            .collect();
        for token in &tokens {
            for &i in self.tokens.word(token) {
                if self.contains_all(i, &tokens) {
                    hits.insert(i);
                }
            }
        }

        for (i, line) in self.tokens.normalized_lines().iter().enumerate() {
            if line.contains(needle) {
                hits.insert(i);
            }
        }

        hits.into_iter().collect()
    }

    /// Up to `max_results` occurrences, each with its own bounded window.
    pub fn windowed_occurrences(&self, fragment: &str, max_results: usize) -> Vec<Occurrence> {
        let hits = self.find_lines(fragment);
        self.occurrences_at(&hits[..hits.len().min(max_results)])
    }

    /// Occurrence records for already-located line indices.
    pub fn occurrences_at(&self, lines: &[usize]) -> Vec<Occurrence> {
        lines
            .iter()
            .copied()
            .filter_map(|i| {
                let line = self.store.get(i)?;
                Some(Occurrence {
                    line_index: i,
                    page: line.page,
                    snippet: truncate_chars(&line.text, self.params.max_snippet_chars).to_string(),
                    context: self.window(
                        i,
                        self.params.occurrence_radius,
                        self.params.max_window_chars,
                    ),
                })
            })
            .collect()
    }

    /// Rendered lines around a heading.
    pub fn heading_context(&self, heading: &Heading) -> String {
        self.window(
            heading.line_index,
            self.params.heading_radius,
            self.params.max_heading_window_chars,
        )
    }

    /// Render `radius` lines around `index`, capped at `cap` chars while
    /// keeping the center line in view.
    fn window(&self, index: usize, radius: usize, cap: usize) -> String {
        let (rendered, (start, end)) = self.store.render_window_with_span(index, radius);
        if char_len(&rendered) <= cap {
            return rendered;
        }
        let center = char_len(&rendered[start..end]);
        let side = cap.saturating_sub(center) / 2;
        truncate_chars(window_around(&rendered, start, end, side), cap).to_string()
    }

    fn contains_all(&self, index: usize, tokens: &[&str]) -> bool {
        match self.tokens.normalized_line(index) {
            Some(line) => tokens.iter().all(|t| line.contains(t)),
            None => false,
        }
    }

    /// Start lines of runs of non-blank lines where the `k`-th line contains
    /// `segments[k]`. Blank lines between them are skipped, matching
    /// fragments copied across paragraph breaks.
    fn scan_consecutive(&self, segments: &[&str]) -> Vec<usize> {
        let lines: Vec<(usize, &str)> = self
            .tokens
            .normalized_lines()
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .map(|(i, line)| (i, line.as_str()))
            .collect();
        if segments.len() > lines.len() {
            return Vec::new();
        }
        lines
            .windows(segments.len())
            .filter(|run| run.iter().zip(segments).all(|((_, line), seg)| line.contains(seg)))
            .map(|run| run[0].0)
            .collect()
    }
}
