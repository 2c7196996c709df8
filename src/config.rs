//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Values are validated on load.
//!
//! ```toml
//! [transcript]
//! path = "./data/transcript.json"
//! document = "./data/document.md"
//!
//! [retrieval]
//! budget = 25000
//! max_occurrences = 3
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{bail, Context, Result};
use pagectx_core::locate::LocatorParams;
use pagectx_core::AssemblyParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptConfig {
    /// Page-structured transcript JSON.
    #[serde(default = "default_transcript_path")]
    pub path: PathBuf,
    /// Raw document text used by `context` when `--document` is not given.
    #[serde(default)]
    pub document: Option<PathBuf>,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            path: default_transcript_path(),
            document: None,
        }
    }
}

fn default_transcript_path() -> PathBuf {
    PathBuf::from("./data/transcript.json")
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub budget: usize,
    pub max_occurrences: usize,
    pub occurrence_radius_lines: usize,
    pub heading_radius_lines: usize,
    pub excerpt_radius_chars: usize,
    pub quote_radius_chars: usize,
    pub reference_radius_chars: usize,
    pub rename_radius_chars: usize,
    pub top_k_blocks: usize,
    pub mention_budget_ratio: f64,
    pub short_context_chars: usize,
    pub very_short_context_chars: usize,
    pub head_ratio: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let assembly = AssemblyParams::default();
        let locator = LocatorParams::default();
        Self {
            budget: assembly.budget,
            max_occurrences: assembly.max_occurrences,
            occurrence_radius_lines: locator.occurrence_radius,
            heading_radius_lines: locator.heading_radius,
            excerpt_radius_chars: assembly.excerpt_radius_chars,
            quote_radius_chars: assembly.quote_radius_chars,
            reference_radius_chars: assembly.reference_radius_chars,
            rename_radius_chars: assembly.rename_radius_chars,
            top_k_blocks: assembly.top_k_blocks,
            mention_budget_ratio: assembly.mention_budget_ratio,
            short_context_chars: assembly.short_context_chars,
            very_short_context_chars: assembly.very_short_context_chars,
            head_ratio: assembly.head_ratio,
        }
    }
}

impl RetrievalConfig {
    pub fn to_assembly_params(&self) -> AssemblyParams {
        AssemblyParams {
            budget: self.budget,
            max_occurrences: self.max_occurrences,
            excerpt_radius_chars: self.excerpt_radius_chars,
            quote_radius_chars: self.quote_radius_chars,
            reference_radius_chars: self.reference_radius_chars,
            rename_radius_chars: self.rename_radius_chars,
            top_k_blocks: self.top_k_blocks,
            mention_budget_ratio: self.mention_budget_ratio,
            short_context_chars: self.short_context_chars,
            very_short_context_chars: self.very_short_context_chars,
            head_ratio: self.head_ratio,
            ..AssemblyParams::default()
        }
    }

    pub fn to_locator_params(&self) -> LocatorParams {
        LocatorParams {
            occurrence_radius: self.occurrence_radius_lines,
            heading_radius: self.heading_radius_lines,
            ..LocatorParams::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;

        if r.budget == 0 {
            bail!("retrieval.budget must be > 0");
        }
        if r.max_occurrences < 1 {
            bail!("retrieval.max_occurrences must be >= 1");
        }
        if r.top_k_blocks < 1 {
            bail!("retrieval.top_k_blocks must be >= 1");
        }
        for (name, value) in [
            ("mention_budget_ratio", r.mention_budget_ratio),
            ("head_ratio", r.head_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                bail!("retrieval.{} must be in (0.0, 1.0]", name);
            }
        }
        if self.server.bind.trim().is_empty() {
            bail!("server.bind must not be empty");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}
