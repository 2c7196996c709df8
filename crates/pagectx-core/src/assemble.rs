//! Budgeted context assembly.
//!
//! Produces one context string of at most `budget` chars for an
//! `(instruction, optional excerpt)` pair over the raw document text, using
//! the [`DocumentIndex`] when available and direct string scans otherwise.
//!
//! # Policy
//!
//! Steps run in order; each runs only while the previous ones produced
//! nothing or too little:
//!
//! 1. **excerpt**: windows around every located occurrence of the excerpt,
//!    joined by [`LOCATION_CHANGE_MARKER`]; a raw substring scan when the
//!    index is unavailable or finds nothing.
//! 2. **mentions**: quoted phrases and `Chapter N` / `Section N` references
//!    from the instruction, located in the raw text (only when step 1
//!    produced nothing).
//! 3. **headings**: heading windows for a referenced chapter number (short
//!    context only).
//! 4. **keywords**: top-scoring paragraph blocks for instruction keywords,
//!    padded with their neighbours (short context only).
//! 5. **rename patterns**: fixed heading patterns for a referenced chapter
//!    when the instruction asks for a rename (very short context only).
//! 6. **head/tail**: the document head and tail split by `head_ratio`.
//!
//! The result is then truncated to the budget with [`TRUNCATED_MARKER`].
//! Advisory annotations are returned separately and dropped entirely when
//! their combined length reaches `max_annotation_chars`.
//!
//! Marker literals are part of the output contract and must not change.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::index::DocumentIndex;
use crate::models::AssembledContext;
use crate::structure::referenced_chapter;
use crate::text::{char_len, find_span, fold_case, last_chars, truncate_chars, window_around};

/// Separates windows around distinct occurrences of the same excerpt.
pub const LOCATION_CHANGE_MARKER: &str = "\n\n--- [LOCATION CHANGE] ---\n\n";
/// Separates unrelated retrieved segments.
pub const ELLIPSIS_MARKER: &str = "\n\n[...]\n\n";
/// Separates the document head from its tail.
pub const DOCUMENT_CONTINUES_MARKER: &str = "\n\n[... DOCUMENT CONTINUES ...]\n\n";
/// Appended when the assembled text was cut to fit the budget.
pub const TRUNCATED_MARKER: &str = "\n\n[... TRUNCATED ...]";

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "into", "about", "what", "which", "when",
    "where", "who", "why", "how", "please", "make", "more", "less", "can", "could", "would",
    "should", "you", "your", "are", "was", "were", "have", "has", "had", "all", "any", "its",
    "not", "but", "our", "they", "them", "then", "than", "there", "here", "also", "just", "very",
    "some", "such", "only", "text", "document", "paragraph", "section", "chapter", "rewrite",
    "change", "update", "improve", "edit", "fix",
];

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"\n]{3,200})"|“([^”\n]{3,200})”"#).unwrap());
static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(chapter|section)\s+(\d+)\b").unwrap());
static RENAME_INTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(rename|retitle|re-title|title|heading|call it|name it)\b").unwrap()
});
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// Tunables for the assembly policy. Thresholds are heuristics.
#[derive(Debug, Clone)]
pub struct AssemblyParams {
    /// Default character budget when a request does not set one.
    pub budget: usize,
    /// Occurrence windows taken for an excerpt.
    pub max_occurrences: usize,
    /// Char radius of the raw-text excerpt fallback window.
    pub excerpt_radius_chars: usize,
    /// Char radius around a quoted phrase from the instruction.
    pub quote_radius_chars: usize,
    /// Char radius around a `Chapter N` / `Section N` reference.
    pub reference_radius_chars: usize,
    /// Char radius around each rename-pattern match.
    pub rename_radius_chars: usize,
    /// Paragraph blocks kept by keyword relevance.
    pub top_k_blocks: usize,
    /// Keywords taken from an instruction.
    pub max_keywords: usize,
    /// Mentions stop accumulating past this fraction of the budget.
    pub mention_budget_ratio: f64,
    /// Below this many chars the context counts as short.
    pub short_context_chars: usize,
    /// Below this many chars the context counts as very short.
    pub very_short_context_chars: usize,
    /// Share of the budget given to the document head in the fallback.
    pub head_ratio: f64,
    /// Annotations are dropped when their combined length reaches this.
    pub max_annotation_chars: usize,
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            budget: 25_000,
            max_occurrences: 3,
            excerpt_radius_chars: 5000,
            quote_radius_chars: 3000,
            reference_radius_chars: 2000,
            rename_radius_chars: 2000,
            top_k_blocks: 3,
            max_keywords: 24,
            mention_budget_ratio: 0.7,
            short_context_chars: 1000,
            very_short_context_chars: 500,
            head_ratio: 0.7,
            max_annotation_chars: 2000,
        }
    }
}

/// Inputs for one assembly call.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    /// Current raw document text. May differ from the indexed transcript.
    pub document: &'a str,
    /// Text the user highlighted, if any.
    pub excerpt: Option<&'a str>,
    pub instruction: &'a str,
    /// Overrides [`AssemblyParams::budget`] when set and non-zero.
    pub budget: Option<usize>,
}

/// Accumulates text, notes, and the names of contributing steps.
#[derive(Default)]
struct Draft {
    text: String,
    notes: Vec<String>,
    strategy: Vec<&'static str>,
}

impl Draft {
    fn len(&self) -> usize {
        char_len(&self.text)
    }

    fn append(&mut self, step: &'static str, separator: &str, part: &str) {
        if part.trim().is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push_str(separator);
        }
        self.text.push_str(part);
        if !self.strategy.contains(&step) {
            self.strategy.push(step);
        }
    }
}

/// Assemble a budgeted context. Never fails; for a non-empty document the
/// returned text is never empty.
pub fn assemble(
    index: Option<&DocumentIndex>,
    req: &AssemblyRequest<'_>,
    params: &AssemblyParams,
) -> AssembledContext {
    let budget = req.budget.filter(|b| *b > 0).unwrap_or(params.budget);
    let document = req.document;
    let instruction = req.instruction;
    let chapter = referenced_chapter(instruction);
    let mut draft = Draft::default();

    if let Some(excerpt) = req.excerpt.map(str::trim).filter(|e| !e.is_empty()) {
        excerpt_step(index, document, excerpt, params, &mut draft);
    }

    if draft.text.is_empty() {
        mentions_step(document, instruction, budget, params, &mut draft);
    }

    if draft.len() < params.short_context_chars {
        if let (Some(index), Some(n)) = (index, chapter) {
            headings_step(index, n, &mut draft);
        }
    }

    if draft.len() < params.short_context_chars {
        keywords_step(document, instruction, params, &mut draft);
    }

    if draft.len() < params.very_short_context_chars && RENAME_INTENT.is_match(instruction) {
        if let Some(n) = chapter {
            rename_step(document, n, params, &mut draft);
        }
    }

    if draft.text.trim().is_empty() {
        draft.text.clear();
        let fallback = head_tail(document, budget, params.head_ratio);
        draft.append("head-tail", "", &fallback);
    }

    let text = fit_to_budget(draft.text, budget);
    let annotations = Some(draft.notes.join("\n"))
        .filter(|n| !n.is_empty() && char_len(n) < params.max_annotation_chars);

    tracing::debug!(
        steps = ?draft.strategy,
        chars = char_len(&text),
        budget,
        annotated = annotations.is_some(),
        "context assembled"
    );

    AssembledContext {
        text,
        annotations,
        strategy: draft.strategy,
    }
}

fn excerpt_step(
    index: Option<&DocumentIndex>,
    document: &str,
    excerpt: &str,
    params: &AssemblyParams,
    draft: &mut Draft,
) {
    if let Some(index) = index {
        let locator = index.locator();
        let hits = locator.find_lines(excerpt);
        let shown = locator.occurrences_at(&hits[..hits.len().min(params.max_occurrences)]);
        if !shown.is_empty() {
            let joined = shown
                .iter()
                .map(|o| o.context.as_str())
                .collect::<Vec<_>>()
                .join(LOCATION_CHANGE_MARKER);
            draft.append("excerpt", ELLIPSIS_MARKER, &joined);

            if hits.len() > 1 {
                let mut note = format!(
                    "The selected text occurs {} times in the document. Treat all {} occurrences together.",
                    hits.len(),
                    hits.len()
                );
                if shown.len() < hits.len() {
                    note.push_str(&format!(" Only the first {} are shown.", shown.len()));
                }
                draft.notes.push(note);
            }
            return;
        }
    }

    if let Some((start, end)) = find_span(document, excerpt) {
        let window = window_around(document, start, end, params.excerpt_radius_chars);
        draft.append("excerpt-scan", ELLIPSIS_MARKER, window);
    }
}

/// An explicit pointer into the document found in an instruction.
enum Mention {
    Quote(String),
    Reference { kind: String, number: u32 },
}

fn explicit_mentions(instruction: &str) -> Vec<Mention> {
    let mut mentions = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for caps in QUOTED.captures_iter(instruction) {
        let Some(m) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let phrase = m.as_str().trim();
        let key = fold_case(phrase);
        if phrase.chars().count() >= 3 && !seen.contains(&key) {
            seen.push(key);
            mentions.push(Mention::Quote(phrase.to_string()));
        }
    }

    for caps in REFERENCE.captures_iter(instruction) {
        let kind = caps[1].to_lowercase();
        let Ok(number) = caps[2].parse::<u32>() else {
            continue;
        };
        let key = format!("{} {}", kind, number);
        if !seen.contains(&key) {
            seen.push(key);
            mentions.push(Mention::Reference { kind, number });
        }
    }

    mentions
}

fn mentions_step(
    document: &str,
    instruction: &str,
    budget: usize,
    params: &AssemblyParams,
    draft: &mut Draft,
) {
    let limit = (budget as f64 * params.mention_budget_ratio) as usize;

    for mention in explicit_mentions(instruction) {
        if draft.len() > limit {
            break;
        }
        let (span, radius) = match &mention {
            Mention::Quote(phrase) => (find_span(document, phrase), params.quote_radius_chars),
            Mention::Reference { kind, number } => (
                reference_pattern(kind, *number)
                    .and_then(|re| re.find(document))
                    .map(|m| (m.start(), m.end())),
                params.reference_radius_chars,
            ),
        };
        if let Some((start, end)) = span {
            let window = window_around(document, start, end, radius);
            draft.append("mentions", ELLIPSIS_MARKER, window);
        }
    }
}

/// Word-bounded, case-insensitive `<kind> <number>` pattern.
fn reference_pattern(kind: &str, number: u32) -> Option<Regex> {
    Regex::new(&format!(
        r"(?i)\b{}\s+{}\b",
        regex::escape(kind),
        regex::escape(&number.to_string())
    ))
    .ok()
}

fn headings_step(index: &DocumentIndex, chapter: u32, draft: &mut Draft) {
    let matches = index.headings_for_chapter(chapter);
    if matches.is_empty() {
        return;
    }

    let joined = matches
        .iter()
        .map(|m| m.context.as_str())
        .collect::<Vec<_>>()
        .join(ELLIPSIS_MARKER);
    draft.append("headings", ELLIPSIS_MARKER, &joined);

    let locations = matches
        .iter()
        .map(|m| {
            format!(
                "\"{}\" (page {}, line {})",
                m.heading.title, m.heading.page, m.heading.line_index
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    draft.notes.push(format!(
        "Found {} heading(s) for Chapter {}: {}",
        matches.len(),
        chapter,
        locations
    ));
}

/// Lowercased instruction words of 3+ chars, stopwords removed, in order.
pub fn extract_keywords(instruction: &str, max: usize) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in instruction.split(|c: char| !c.is_alphanumeric()) {
        let word = fold_case(word);
        if word.chars().count() < 3 || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if !keywords.contains(&word) {
            keywords.push(word);
        }
        if keywords.len() >= max {
            break;
        }
    }
    keywords
}

fn keywords_step(document: &str, instruction: &str, params: &AssemblyParams, draft: &mut Draft) {
    let keywords = extract_keywords(instruction, params.max_keywords);
    if keywords.is_empty() {
        return;
    }

    let blocks: Vec<&str> = PARAGRAPH_BREAK
        .split(document)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect();

    let mut ranked: Vec<(usize, usize)> = blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let lower = fold_case(block);
            let score: usize = keywords.iter().map(|k| lower.matches(k.as_str()).count()).sum();
            (i, score)
        })
        .filter(|(_, score)| *score > 0)
        .collect();
    if ranked.is_empty() {
        return;
    }
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen = BTreeSet::new();
    for &(i, _) in ranked.iter().take(params.top_k_blocks) {
        chosen.insert(i.saturating_sub(1));
        chosen.insert(i);
        if i + 1 < blocks.len() {
            chosen.insert(i + 1);
        }
    }

    let joined = chosen
        .into_iter()
        .map(|i| blocks[i])
        .collect::<Vec<_>>()
        .join("\n\n");
    draft.append("keywords", ELLIPSIS_MARKER, &joined);
}

/// Heading shapes tried, in order, when an instruction renames a chapter.
fn rename_patterns(chapter: u32) -> Vec<Regex> {
    let n = regex::escape(&chapter.to_string());
    [
        format!(r"(?i)\\section\*?\{{\s*chapter\s+{}\b[^}}]*\}}", n),
        format!(r"(?i)\\chapter\*?\{{[^}}]*\bchapter\s+{}\b[^}}]*\}}", n),
        format!(r"(?im)^#{{1,6}}[ \t]*chapter\s+{}\b.*$", n),
        format!(r"(?im)^[ \t]*chapter\s+{}\b[^\n]*$", n),
        format!(r"(?i)\bchapter\s+{}\b", n),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

fn rename_step(document: &str, chapter: u32, params: &AssemblyParams, draft: &mut Draft) {
    for pattern in rename_patterns(chapter) {
        let windows: Vec<&str> = pattern
            .find_iter(document)
            .map(|m| window_around(document, m.start(), m.end(), params.rename_radius_chars))
            .collect();
        if !windows.is_empty() {
            draft.append("rename-pattern", ELLIPSIS_MARKER, &windows.join(ELLIPSIS_MARKER));
            return;
        }
    }
}

/// Whole document when it fits, else head and tail split by `head_ratio`
/// around [`DOCUMENT_CONTINUES_MARKER`], sized to fit `budget`.
fn head_tail(document: &str, budget: usize, head_ratio: f64) -> String {
    let marker = char_len(DOCUMENT_CONTINUES_MARKER);
    if char_len(document) <= budget {
        return document.to_string();
    }
    if budget <= marker {
        return truncate_chars(document, budget).to_string();
    }
    let usable = budget - marker;
    let head = ((usable as f64) * head_ratio) as usize;
    let tail = usable.saturating_sub(head);
    format!(
        "{}{}{}",
        truncate_chars(document, head),
        DOCUMENT_CONTINUES_MARKER,
        last_chars(document, tail)
    )
}

/// Cut `text` so that it, plus [`TRUNCATED_MARKER`], fits in `budget` chars.
fn fit_to_budget(text: String, budget: usize) -> String {
    if char_len(&text) <= budget {
        return text;
    }
    let marker = char_len(TRUNCATED_MARKER);
    if budget <= marker {
        return truncate_chars(&text, budget).to_string();
    }
    let mut out = truncate_chars(&text, budget - marker).to_string();
    out.push_str(TRUNCATED_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(document: &'a str, instruction: &'a str) -> AssemblyRequest<'a> {
        AssemblyRequest {
            document,
            excerpt: None,
            instruction,
            budget: None,
        }
    }

    #[test]
    fn test_fit_to_budget_appends_marker() {
        let text = "a".repeat(100);
        let out = fit_to_budget(text, 50);
        assert_eq!(out.chars().count(), 50);
        assert!(out.ends_with(TRUNCATED_MARKER));
    }

    #[test]
    fn test_fit_to_budget_tiny_budget() {
        let out = fit_to_budget("a".repeat(100), 5);
        assert_eq!(out, "aaaaa");
    }

    #[test]
    fn test_head_tail_split() {
        let doc = format!("{}{}", "H".repeat(5000), "T".repeat(5000));
        let out = head_tail(&doc, 1000, 0.7);
        assert!(out.chars().count() <= 1000);
        let (head, tail) = out.split_once(DOCUMENT_CONTINUES_MARKER).unwrap();
        assert!(head.chars().all(|c| c == 'H'));
        assert!(tail.chars().all(|c| c == 'T'));
        assert!(head.len() > tail.len());
    }

    #[test]
    fn test_head_tail_budget_below_marker() {
        let doc = "abcdefghij".repeat(10);
        assert_eq!(head_tail(&doc, 12, 0.7), "abcdefghijab");
        assert_eq!(head_tail(&doc, 0, 0.7), "");
    }

    #[test]
    fn test_long_annotations_dropped() {
        let doc = "intro\nthe bell rang\nmiddle\nthe bell rang\noutro";
        let req = AssemblyRequest {
            document: doc,
            excerpt: Some("the bell rang"),
            instruction: "",
            budget: None,
        };
        let index = DocumentIndex::build(&crate::models::Transcript {
            pages: vec![crate::models::Page {
                page_number: 1,
                lines: doc
                    .lines()
                    .map(|t| crate::models::TranscriptLine {
                        text: t.to_string(),
                        line_number: 0,
                        column: 0,
                        region: None,
                    })
                    .collect(),
            }],
        })
        .unwrap();

        let full = assemble(Some(&index), &req, &AssemblyParams::default());
        let note = full.annotations.clone().unwrap();
        assert!(note.contains('2'));

        let params = AssemblyParams {
            max_annotation_chars: char_len(&note),
            ..AssemblyParams::default()
        };
        let capped = assemble(Some(&index), &req, &params);
        assert!(capped.annotations.is_none());
        assert_eq!(capped.text, full.text);
        assert_eq!(capped.strategy, full.strategy);
    }

    #[test]
    fn test_extract_keywords() {
        let kws = extract_keywords("Please make the Dragon's lair scarier, the dragon!", 10);
        assert_eq!(kws, vec!["dragon", "lair", "scarier"]);
    }

    #[test]
    fn test_explicit_mentions() {
        let m = explicit_mentions(r#"Fix "the old mill" and “river bend” in Chapter 2, then section 4"#);
        assert_eq!(m.len(), 4);
        assert!(matches!(&m[0], Mention::Quote(q) if q == "the old mill"));
        assert!(matches!(&m[1], Mention::Quote(q) if q == "river bend"));
        assert!(matches!(&m[2], Mention::Reference { kind, number: 2 } if kind == "chapter"));
        assert!(matches!(&m[3], Mention::Reference { kind, number: 4 } if kind == "section"));
    }

    #[test]
    fn test_quoted_mention_window() {
        let doc = format!("{}the old mill stood still{}", "x".repeat(5000), "y".repeat(5000));
        let ctx = assemble(None, &request(&doc, r#"Describe "the old mill" better"#), &AssemblyParams::default());
        assert!(ctx.text.contains("the old mill stood still"));
        assert_eq!(ctx.strategy.first(), Some(&"mentions"));
        assert!(ctx.text.chars().count() <= 3000 * 2 + 20);
    }

    #[test]
    fn test_reference_is_word_bounded() {
        let doc = "Chapter 30 is long.\n\nChapter 3 is short.";
        let mut params = AssemblyParams::default();
        params.reference_radius_chars = 2;
        let ctx = assemble(None, &request(doc, "tighten chapter 3"), &params);
        assert_eq!(ctx.text, "\n\nChapter 3 i");
        assert_eq!(ctx.strategy, vec!["mentions"]);
    }

    #[test]
    fn test_keyword_blocks_padded_in_order() {
        let doc = "intro\n\nalpha\n\nthe dragon sleeps\n\nomega\n\nunrelated\n\nend";
        let ctx = assemble(None, &request(doc, "dragon"), &AssemblyParams::default());
        assert_eq!(ctx.text, "alpha\n\nthe dragon sleeps\n\nomega");
        assert_eq!(ctx.strategy, vec!["keywords"]);
    }

    #[test]
    fn test_rename_pattern_step() {
        let doc = "Preface.\n\n## Chapter 4 The Storm\n\nRain.";
        let mut params = AssemblyParams::default();
        params.rename_radius_chars = 0;
        let ctx = assemble(None, &request(doc, "Rename Chapter 4 to The Calm"), &params);
        assert!(ctx.text.contains("## Chapter 4 The Storm"));
        assert_eq!(ctx.strategy, vec!["mentions", "rename-pattern"]);
    }

    #[test]
    fn test_excerpt_scan_without_index() {
        let doc = format!("{}NEEDLE{}", "a".repeat(6000), "b".repeat(6000));
        let req = AssemblyRequest {
            document: &doc,
            excerpt: Some("needle"),
            instruction: "",
            budget: None,
        };
        let ctx = assemble(None, &req, &AssemblyParams::default());
        assert_eq!(ctx.strategy, vec!["excerpt-scan"]);
        assert_eq!(ctx.text.chars().count(), 5000 + 6 + 5000);
        assert!(ctx.annotations.is_none());
    }

    #[test]
    fn test_empty_document_yields_empty_text() {
        let ctx = assemble(None, &request("", "anything"), &AssemblyParams::default());
        assert!(ctx.text.is_empty());
    }

    #[test]
    fn test_zero_budget_uses_default() {
        let doc = "short document";
        let req = AssemblyRequest {
            document: doc,
            excerpt: None,
            instruction: "",
            budget: Some(0),
        };
        let ctx = assemble(None, &req, &AssemblyParams::default());
        assert_eq!(ctx.text, doc);
    }
}
