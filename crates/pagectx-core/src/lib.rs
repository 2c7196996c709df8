//! # pagectx core
//!
//! Synchronous, IO-free logic for pagectx: transcript models, the flat
//! line store, the inverted token index, heading detection, occurrence
//! lookup, and budgeted context assembly.
//!
//! This crate contains no tokio, filesystem, or network dependencies.
//! Transcripts arrive through the [`index::TranscriptSource`] trait and the
//! raw document text is passed in by the caller on every assembly call.

pub mod assemble;
pub mod index;
pub mod lines;
pub mod locate;
pub mod models;
pub mod structure;
pub mod text;
pub mod token_index;

pub use assemble::{assemble, AssemblyParams, AssemblyRequest};
pub use index::{BuildError, DocumentIndex, IndexGate, TranscriptSource};
pub use models::{
    AssembledContext, DocumentStructure, Heading, HeadingMatch, LineRecord, Occurrence, Page,
    Region, Transcript, TranscriptLine,
};
