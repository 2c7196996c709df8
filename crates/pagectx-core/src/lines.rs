//! Flat line store.
//!
//! Flattens a page-structured [`Transcript`] into a single ordered vector of
//! [`LineRecord`]s with stable global indices. Page ownership of a global
//! index is resolved by binary search over the accumulated start offset of
//! each page, so lookups stay `O(log pages)` regardless of document size.

use crate::models::{LineRecord, Transcript};

/// Ordered, immutable sequence of lines derived from one transcript.
#[derive(Debug, Clone, Default)]
pub struct LineStore {
    lines: Vec<LineRecord>,
    /// `(first global index, page number)` for every non-empty page, ascending.
    page_starts: Vec<(usize, u32)>,
    total_pages: usize,
}

impl LineStore {
    /// Flatten `transcript` in page order.
    pub fn from_transcript(transcript: &Transcript) -> Self {
        let mut lines = Vec::with_capacity(transcript.line_count());
        let mut page_starts = Vec::with_capacity(transcript.pages.len());

        for page in &transcript.pages {
            if page.lines.is_empty() {
                continue;
            }
            page_starts.push((lines.len(), page.page_number));
            for line in &page.lines {
                lines.push(LineRecord {
                    index: lines.len(),
                    text: line.text.clone(),
                    page: page.page_number,
                    line_number: line.line_number,
                    column: line.column,
                    region: line.region,
                });
            }
        }

        Self {
            lines,
            page_starts,
            total_pages: transcript.pages.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of pages in the source transcript, including empty ones.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn get(&self, index: usize) -> Option<&LineRecord> {
        self.lines.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineRecord> {
        self.lines.iter()
    }

    /// Every line's text joined by newlines, in global order.
    pub fn joined_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Page number owning the line at global `index`.
    pub fn page_of(&self, index: usize) -> Option<u32> {
        if index >= self.lines.len() {
            return None;
        }
        let pos = self.page_starts.partition_point(|(start, _)| *start <= index);
        pos.checked_sub(1).map(|p| self.page_starts[p].1)
    }

    /// Render lines `index - radius ..= index + radius` (clamped), joined by newlines.
    pub fn render_window(&self, index: usize, radius: usize) -> String {
        self.render_window_with_span(index, radius).0
    }

    /// Like [`render_window`](Self::render_window), also returning the byte
    /// span of the center line inside the rendered text.
    pub fn render_window_with_span(&self, index: usize, radius: usize) -> (String, (usize, usize)) {
        if self.lines.is_empty() {
            return (String::new(), (0, 0));
        }
        let center = index.min(self.lines.len() - 1);
        let from = center.saturating_sub(radius);
        let to = (center + radius).min(self.lines.len() - 1);

        let mut out = String::new();
        let mut span = (0, 0);
        for line in &self.lines[from..=to] {
            if line.index > from {
                out.push('\n');
            }
            if line.index == center {
                span.0 = out.len();
                out.push_str(&line.text);
                span.1 = out.len();
            } else {
                out.push_str(&line.text);
            }
        }
        (out, span)
    }
}
