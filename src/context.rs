//! `context` command: assemble a budgeted context and print it.
//!
//! The raw document text comes from `--document`, then
//! `[transcript].document`, and finally from the transcript lines themselves.
//! A transcript that fails to load is not fatal: assembly falls back to
//! scanning the raw text directly.

use anyhow::{bail, Result};
use pagectx_core::{assemble, AssemblyRequest};
use std::path::Path;

use crate::config::Config;
use crate::transcript::{open_gate, read_document};

pub struct ContextArgs<'a> {
    pub instruction: &'a str,
    pub excerpt: Option<&'a str>,
    pub document: Option<&'a Path>,
    pub budget: Option<usize>,
    pub json: bool,
}

pub fn run_context(config: &Config, args: &ContextArgs<'_>) -> Result<()> {
    if args.budget == Some(0) {
        bail!("--budget must be > 0");
    }

    let gate = open_gate(config);
    let index = gate.get();

    let document = match args.document.or(config.transcript.document.as_deref()) {
        Some(path) => read_document(path)?,
        None => match index {
            Some(index) => index.lines().joined_text(),
            None => bail!(
                "No document text: pass --document, set [transcript].document, or provide a readable transcript"
            ),
        },
    };

    let request = AssemblyRequest {
        document: &document,
        excerpt: args.excerpt,
        instruction: args.instruction,
        budget: args.budget,
    };
    let ctx = assemble(index, &request, &config.retrieval.to_assembly_params());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
        return Ok(());
    }

    println!("{}", ctx.text);
    if let Some(notes) = &ctx.annotations {
        println!();
        println!("--- annotations ---");
        println!("{}", notes);
    }
    Ok(())
}
