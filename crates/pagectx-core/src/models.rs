//! Data models shared by the index, the locator, and the assembler.
//!
//! Input types ([`Transcript`], [`Page`], [`TranscriptLine`], [`Region`])
//! mirror the page-structured JSON supplied by the document viewer. Output
//! types are serializable so the CLI and HTTP server can emit them as-is.

use serde::{Deserialize, Serialize};

/// Page-structured document transcript, as delivered by the viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub pages: Vec<Page>,
}

/// One page of a transcript, lines in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    #[serde(default)]
    pub lines: Vec<TranscriptLine>,
}

/// A single line of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub text: String,
    /// Line number on its page.
    #[serde(default)]
    pub line_number: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

/// On-page bounding box of a line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Transcript {
    /// Parse a transcript from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Total number of lines across all pages.
    pub fn line_count(&self) -> usize {
        self.pages.iter().map(|p| p.lines.len()).sum()
    }
}

/// A flattened line with its global position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRecord {
    /// Global 0-based index, strictly increasing across the document.
    pub index: usize,
    pub text: String,
    /// Page number of the page that owns this line.
    pub page: u32,
    pub line_number: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

/// A detected chapter/section heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// Cleaned title: markup stripped, whitespace collapsed, length-capped.
    pub title: String,
    pub line_index: usize,
    pub page: u32,
}

/// A heading together with its rendered surrounding lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingMatch {
    pub heading: Heading,
    pub context: String,
}

/// One located occurrence of a fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occurrence {
    pub line_index: usize,
    pub page: u32,
    /// Text of the matching line (length-capped).
    pub snippet: String,
    /// Lines surrounding the match, newline-joined (length-capped).
    pub context: String,
}

/// Summary of the detected document structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentStructure {
    pub headings: Vec<Heading>,
    pub total_pages: usize,
    pub total_lines: usize,
    /// SHA-256 of the transcript the index was built from. Empty when unloaded.
    pub fingerprint: String,
}

/// The output of context assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    /// Context text, never longer than the requested budget (in chars).
    pub text: String,
    /// Short advisory notes for the consumer, omitted when too long.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<String>,
    /// Names of the policy steps that contributed text.
    pub strategy: Vec<&'static str>,
}
