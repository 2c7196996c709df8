//! Filesystem-backed transcript source and gate construction.

use anyhow::{Context, Result};
use pagectx_core::index::JsonTranscript;
use pagectx_core::{BuildError, IndexGate, Transcript, TranscriptSource};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Reads a transcript JSON file each time a build is attempted.
#[derive(Debug, Clone)]
pub struct FileTranscript {
    path: PathBuf,
    label: String,
}

impl FileTranscript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }
}

impl TranscriptSource for FileTranscript {
    fn name(&self) -> &str {
        &self.label
    }

    fn load(&self) -> Result<Transcript, BuildError> {
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| BuildError::Io(format!("{}: {}", self.label, e)))?;
        JsonTranscript(json).load()
    }
}

/// A fresh, unloaded gate over the configured transcript.
pub fn open_gate(config: &Config) -> IndexGate {
    IndexGate::with_params(
        FileTranscript::new(&config.transcript.path),
        config.retrieval.to_locator_params(),
    )
}

/// Raw document text from `path`.
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))
}
