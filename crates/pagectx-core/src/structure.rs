//! Chapter and section heading detection.
//!
//! All heading rules live in one precompiled [`RegexSet`] evaluated once per
//! line during a single pass over the [`LineStore`]. A line is a heading when
//! its trimmed text matches any rule:
//!
//! | # | Rule |
//! |---|------|
//! | 1 | section wrapper whose content mentions "Chapter" |
//! | 2 | chapter wrapper (`\chapter{…}`) |
//! | 3 | part/section wrapper at line start |
//! | 4 | `Chapter <n>` followed by a wrapper close |
//! | 5 | markdown `#` heading mentioning "Chapter" |
//! | 6 | section wrapper immediately followed by `Chapter <n>` |
//!
//! Headings are derived once at build time and never updated.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use crate::lines::LineStore;
use crate::models::Heading;
use crate::text::{collapse_whitespace, fold_case, normalize, truncate_chars};

/// Maximum title length in chars.
pub const MAX_TITLE_CHARS: usize = 150;
/// Leading portion of a title compared against longer queries.
const TITLE_LEAD_CHARS: usize = 20;
/// A title lead shorter than this is never matched by containment.
const MIN_TITLE_LEAD_CHARS: usize = 4;

static HEADING_RULES: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\\section\*?\{[^}]*chapter",
        r"(?i)\\chapter\*?\{",
        r"(?i)^\\(?:part|section)\*?\{",
        r"(?i)\bchapter\s+\d+\s*\}",
        r"(?i)^#{1,6}\s+.*\bchapter\b",
        r"(?i)\\section\*?\{\s*chapter\s+\d+",
    ])
    .unwrap()
});

static WRAPPER_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[A-Za-z]+\*?(?:\[[^\]]*\])?\{").unwrap());
static LEADING_HASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s*").unwrap());
static CHAPTER_IN_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bch(?:apter|\.)?\s*(\d+)\b").unwrap());
static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").unwrap());
static CHAPTER_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bchapter\s+(\d+)\b").unwrap());

/// Whether a trimmed line matches any heading rule.
pub fn is_heading(text: &str) -> bool {
    HEADING_RULES.is_match(text.trim())
}

/// Strip markup wrappers from a heading line and cap its length.
///
/// Falls back to the raw (collapsed, truncated) text when stripping leaves
/// nothing, e.g. for a bare `\section{}`.
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = WRAPPER_OPEN.replace_all(trimmed, "");
    let stripped = stripped.replace(['{', '}'], "");
    let stripped = LEADING_HASHES.replace(stripped.trim(), "");
    let title = collapse_whitespace(&stripped);
    if title.is_empty() {
        truncate_chars(&collapse_whitespace(trimmed), MAX_TITLE_CHARS).to_string()
    } else {
        truncate_chars(&title, MAX_TITLE_CHARS).to_string()
    }
}

/// Chapter number named in a heading query: `"Chapter 3"`, `"ch. 3"`, or a
/// bare `"3"`.
pub fn chapter_number_in_query(query: &str) -> Option<u32> {
    CHAPTER_IN_QUERY
        .captures(query)
        .or_else(|| BARE_NUMBER.captures(query))
        .and_then(|c| c[1].parse().ok())
}

/// Chapter number explicitly referenced as `Chapter <n>` in free text.
pub fn referenced_chapter(text: &str) -> Option<u32> {
    CHAPTER_REFERENCE
        .captures(text)
        .and_then(|c| c[1].parse().ok())
}

/// Word-bounded, case-insensitive `Chapter <n>` pattern.
fn chapter_pattern(number: u32) -> Option<Regex> {
    let escaped = regex::escape(&number.to_string());
    Regex::new(&format!(r"(?i)\bchapter\s+{}\b", escaped)).ok()
}

/// Ordered list of headings detected in one document.
#[derive(Debug, Clone, Default)]
pub struct StructureDetector {
    headings: Vec<Heading>,
}

impl StructureDetector {
    /// Run the heading rules over every line of `store`.
    pub fn detect(store: &LineStore) -> Self {
        let mut headings: Vec<Heading> = store
            .iter()
            .filter(|line| is_heading(&line.text))
            .map(|line| Heading {
                title: clean_title(&line.text),
                line_index: line.index,
                page: line.page,
            })
            .collect();
        headings.sort_by_key(|h| h.line_index);

        tracing::debug!(headings = headings.len(), "structure detected");
        Self { headings }
    }

    pub fn headings(&self) -> &[Heading] {
        &self.headings
    }

    /// Headings matching `query` in either direction, plus any heading
    /// naming the chapter number found in the query.
    pub fn find(&self, query: &str) -> Vec<Heading> {
        let q = normalize(query);
        if q.is_empty() {
            return Vec::new();
        }

        let mut found: Vec<Heading> = self
            .headings
            .iter()
            .filter(|h| {
                let title = fold_case(&h.title);
                if title.contains(&q) {
                    return true;
                }
                let lead = truncate_chars(&title, TITLE_LEAD_CHARS).trim();
                lead.chars().count() >= MIN_TITLE_LEAD_CHARS && q.contains(lead)
            })
            .cloned()
            .collect();

        if let Some(n) = chapter_number_in_query(&q) {
            for h in self.for_chapter(n) {
                if !found.iter().any(|f| f.line_index == h.line_index) {
                    found.push(h);
                }
            }
        }

        found.sort_by_key(|h| h.line_index);
        found
    }

    /// Headings whose title contains `Chapter <number>`.
    pub fn for_chapter(&self, number: u32) -> Vec<Heading> {
        let Some(pattern) = chapter_pattern(number) else {
            return Vec::new();
        };
        self.headings
            .iter()
            .filter(|h| pattern.is_match(&h.title))
            .cloned()
            .collect()
    }
}
