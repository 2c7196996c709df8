//! # pagectx
//!
//! Indexes a page-structured document transcript and assembles bounded,
//! relevant context for an editing instruction.
//!
//! The retrieval logic lives in the IO-free [`pagectx_core`] crate. This crate
//! adds configuration, a filesystem transcript source, CLI commands, and a
//! JSON HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────────┐
//! │  transcript  │──▶│  IndexGate (load once)        │
//! │   (JSON)     │   │  lines · tokens · headings    │
//! └──────────────┘   └──────────────┬───────────────┘
//!                                   │
//!   raw document ──────────▶  context assembler
//!                                   │
//!                      ┌────────────┴───────┐
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │   CLI    │        │   HTTP   │
//!                 │(pagectx) │        │  (axum)  │
//!                 └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pagectx structure
//! pagectx locate "the bell rang"
//! pagectx headings "Chapter 3"
//! pagectx context --instruction "tighten the opening of Chapter 3" --document draft.md
//! pagectx serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`transcript`] | Transcript file source and gate construction |
//! | [`search`] | `locate` and `occurrences` commands |
//! | [`structure`] | `headings` and `structure` commands |
//! | [`context`] | `context` command |
//! | [`server`] | HTTP server |

pub mod config;
pub mod context;
pub mod search;
pub mod server;
pub mod structure;
pub mod transcript;
