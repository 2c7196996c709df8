//! Built document index and its load-once gate.
//!
//! A [`DocumentIndex`] bundles the three structures built from one
//! transcript (line store, token index, heading list). It is immutable after
//! construction, so any number of threads can query it through `&self`.
//!
//! An [`IndexGate`] is the caller-owned handle that builds the index lazily
//! from a [`TranscriptSource`] on first need:
//!
//! - the first build is single-flight: concurrent callers block until it
//!   finishes and then share the result;
//! - a failed build is logged and leaves the gate unloaded, so a later call
//!   retries;
//! - query methods on the gate never fail. While unloaded they return empty
//!   values.

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::lines::LineStore;
use crate::locate::{Locator, LocatorParams};
use crate::models::{DocumentStructure, Heading, HeadingMatch, Occurrence, Transcript};
use crate::structure::StructureDetector;
use crate::token_index::TokenIndex;

/// Why an index could not be built.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("transcript is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("transcript could not be read: {0}")]
    Io(String),

    #[error("transcript contains no lines")]
    EmptyTranscript,
}

/// Supplies the page-structured transcript an index is built from.
pub trait TranscriptSource: Send + Sync {
    /// Short label used in log messages.
    fn name(&self) -> &str;

    /// Produce the transcript. Called at most once per successful build.
    fn load(&self) -> Result<Transcript, BuildError>;
}

impl TranscriptSource for Transcript {
    fn name(&self) -> &str {
        "inline"
    }

    fn load(&self) -> Result<Transcript, BuildError> {
        Ok(self.clone())
    }
}

/// A transcript held as unparsed JSON text.
#[derive(Debug, Clone)]
pub struct JsonTranscript(pub String);

impl TranscriptSource for JsonTranscript {
    fn name(&self) -> &str {
        "json"
    }

    fn load(&self) -> Result<Transcript, BuildError> {
        Ok(Transcript::from_json(&self.0)?)
    }
}

/// The immutable structures built from one transcript.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    store: LineStore,
    tokens: TokenIndex,
    structure: StructureDetector,
    params: LocatorParams,
    fingerprint: String,
}

impl DocumentIndex {
    /// Build with default lookup parameters.
    pub fn build(transcript: &Transcript) -> Result<Self, BuildError> {
        Self::build_with(transcript, LocatorParams::default())
    }

    pub fn build_with(transcript: &Transcript, params: LocatorParams) -> Result<Self, BuildError> {
        let store = LineStore::from_transcript(transcript);
        if store.is_empty() {
            return Err(BuildError::EmptyTranscript);
        }
        let tokens = TokenIndex::build(&store);
        let structure = StructureDetector::detect(&store);
        let fingerprint = fingerprint(transcript);

        tracing::debug!(
            lines = store.len(),
            pages = store.total_pages(),
            headings = structure.headings().len(),
            exact_keys = tokens.exact_key_count(),
            word_keys = tokens.word_key_count(),
            "document index built"
        );

        Ok(Self {
            store,
            tokens,
            structure,
            params,
            fingerprint,
        })
    }

    pub fn lines(&self) -> &LineStore {
        &self.store
    }

    pub fn params(&self) -> &LocatorParams {
        &self.params
    }

    pub fn locator(&self) -> Locator<'_> {
        Locator::new(&self.store, &self.tokens, &self.params)
    }

    /// SHA-256 of the transcript this index was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn locate_lines(&self, fragment: &str) -> Vec<usize> {
        self.locator().find_lines(fragment)
    }

    pub fn windowed_occurrences(&self, fragment: &str, max_results: usize) -> Vec<Occurrence> {
        self.locator().windowed_occurrences(fragment, max_results)
    }

    /// Headings matching `query`, each with its rendered context.
    pub fn find_headings(&self, query: &str) -> Vec<HeadingMatch> {
        self.with_context(self.structure.find(query))
    }

    /// Headings naming `Chapter <number>`, each with its rendered context.
    pub fn headings_for_chapter(&self, number: u32) -> Vec<HeadingMatch> {
        self.with_context(self.structure.for_chapter(number))
    }

    pub fn structure(&self) -> DocumentStructure {
        DocumentStructure {
            headings: self.structure.headings().to_vec(),
            total_pages: self.store.total_pages(),
            total_lines: self.store.len(),
            fingerprint: self.fingerprint.clone(),
        }
    }

    fn with_context(&self, headings: Vec<Heading>) -> Vec<HeadingMatch> {
        let locator = self.locator();
        headings
            .into_iter()
            .map(|heading| HeadingMatch {
                context: locator.heading_context(&heading),
                heading,
            })
            .collect()
    }
}

/// Stable digest over every line's position and text, in page order.
fn fingerprint(transcript: &Transcript) -> String {
    let mut hasher = Sha256::new();
    for page in &transcript.pages {
        hasher.update(page.page_number.to_le_bytes());
        for line in &page.lines {
            hasher.update(line.line_number.to_le_bytes());
            hasher.update(line.column.to_le_bytes());
            hasher.update((line.text.len() as u64).to_le_bytes());
            hasher.update(line.text.as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Caller-owned, load-once handle to a [`DocumentIndex`].
pub struct IndexGate {
    source: Box<dyn TranscriptSource>,
    params: LocatorParams,
    cell: OnceCell<DocumentIndex>,
}

impl IndexGate {
    pub fn new(source: impl TranscriptSource + 'static) -> Self {
        Self::with_params(source, LocatorParams::default())
    }

    pub fn with_params(source: impl TranscriptSource + 'static, params: LocatorParams) -> Self {
        Self {
            source: Box::new(source),
            params,
            cell: OnceCell::new(),
        }
    }

    /// True once a build has completed successfully.
    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The index if already built, without triggering a build.
    pub fn loaded(&self) -> Option<&DocumentIndex> {
        self.cell.get()
    }

    /// Build on first call; later calls return the same index.
    ///
    /// Concurrent first callers block on a single build. On failure the
    /// gate stays unloaded and the error is returned.
    pub fn try_load(&self) -> Result<&DocumentIndex, BuildError> {
        self.cell.get_or_try_init(|| {
            let transcript = self.source.load()?;
            DocumentIndex::build_with(&transcript, self.params.clone())
        })
    }

    /// Like [`try_load`](Self::try_load), logging failures instead of
    /// returning them.
    pub fn get(&self) -> Option<&DocumentIndex> {
        match self.try_load() {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!(source = self.source.name(), error = %e, "index unavailable");
                None
            }
        }
    }

    pub fn locate_lines(&self, fragment: &str) -> Vec<usize> {
        self.get()
            .map(|i| i.locate_lines(fragment))
            .unwrap_or_default()
    }

    pub fn windowed_occurrences(&self, fragment: &str, max_results: usize) -> Vec<Occurrence> {
        self.get()
            .map(|i| i.windowed_occurrences(fragment, max_results))
            .unwrap_or_default()
    }

    pub fn find_headings(&self, query: &str) -> Vec<HeadingMatch> {
        self.get()
            .map(|i| i.find_headings(query))
            .unwrap_or_default()
    }

    pub fn structure(&self) -> DocumentStructure {
        self.get().map(|i| i.structure()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Page, TranscriptLine};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn transcript() -> Transcript {
        Transcript {
            pages: vec![Page {
                page_number: 1,
                lines: vec![
                    TranscriptLine {
                        text: r"\section*{Chapter 1: Start}".to_string(),
                        line_number: 1,
                        column: 0,
                        region: None,
                    },
                    TranscriptLine {
                        text: "Once upon a time.".to_string(),
                        line_number: 2,
                        column: 0,
                        region: None,
                    },
                ],
            }],
        }
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    impl TranscriptSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn load(&self) -> Result<Transcript, BuildError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(BuildError::Io("not yet".to_string()));
            }
            Ok(transcript())
        }
    }

    #[test]
    fn test_empty_transcript_is_build_error() {
        let err = DocumentIndex::build(&Transcript::default()).unwrap_err();
        assert!(matches!(err, BuildError::EmptyTranscript));
    }

    #[test]
    fn test_malformed_json_leaves_gate_unloaded() {
        let gate = IndexGate::new(JsonTranscript("{not json".to_string()));
        assert!(gate.locate_lines("anything").is_empty());
        assert!(gate.find_headings("chapter").is_empty());
        assert_eq!(gate.structure(), DocumentStructure::default());
        assert!(!gate.is_ready());
    }

    #[test]
    fn test_gate_builds_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = IndexGate::new(CountingSource {
            calls: calls.clone(),
            fail_first: false,
        });
        assert!(!gate.is_ready());
        assert_eq!(gate.locate_lines("upon"), vec![1]);
        assert_eq!(gate.locate_lines("time"), vec![1]);
        assert!(gate.is_ready());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gate_retries_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = IndexGate::new(CountingSource {
            calls: calls.clone(),
            fail_first: true,
        });
        assert!(gate.get().is_none());
        assert!(!gate.is_ready());
        assert!(gate.get().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_callers_share_one_build() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(IndexGate::new(CountingSource {
            calls: calls.clone(),
            fail_first: false,
        }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || gate.structure().total_lines)
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = DocumentIndex::build(&transcript()).unwrap();
        let b = DocumentIndex::build(&transcript()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut changed = transcript();
        changed.pages[0].lines[1].text.push('!');
        let c = DocumentIndex::build(&changed).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_find_headings_carries_context() {
        let index = DocumentIndex::build(&transcript()).unwrap();
        let found = index.find_headings("Chapter 1");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].heading.page, 1);
        assert!(found[0].context.contains("Once upon a time."));
    }
}
