//! `headings` and `structure` commands.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::transcript::open_gate;

pub fn run_headings(config: &Config, query: &str) -> Result<()> {
    let gate = open_gate(config);
    let index = gate
        .try_load()
        .with_context(|| "Failed to build index from transcript")?;

    let matches = index.find_headings(query);
    if matches.is_empty() {
        println!("No headings.");
        return Ok(());
    }

    for (n, m) in matches.iter().enumerate() {
        println!(
            "{}. {} (page {}, line {})",
            n + 1,
            m.heading.title,
            m.heading.page,
            m.heading.line_index
        );
        for line in m.context.lines() {
            println!("    | {}", line);
        }
        println!();
    }
    Ok(())
}

pub fn run_structure(config: &Config, json: bool) -> Result<()> {
    let gate = open_gate(config);
    let index = gate
        .try_load()
        .with_context(|| "Failed to build index from transcript")?;
    let structure = index.structure();

    if json {
        println!("{}", serde_json::to_string_pretty(&structure)?);
        return Ok(());
    }

    println!("pages: {}", structure.total_pages);
    println!("lines: {}", structure.total_lines);
    println!("fingerprint: {}", structure.fingerprint);
    println!("headings: {}", structure.headings.len());
    for h in &structure.headings {
        println!("  - {} (page {}, line {})", h.title, h.page, h.line_index);
    }
    Ok(())
}
