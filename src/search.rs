//! `locate` and `occurrences` commands.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::transcript::open_gate;

pub fn run_locate(config: &Config, fragment: &str) -> Result<()> {
    let gate = open_gate(config);
    let index = gate
        .try_load()
        .with_context(|| "Failed to build index from transcript")?;

    let hits = index.locate_lines(fragment);
    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for i in hits {
        if let Some(line) = index.lines().get(i) {
            println!("{}\tpage {}\t{}", i, line.page, line.text.trim());
        }
    }
    Ok(())
}

pub fn run_occurrences(config: &Config, fragment: &str, limit: Option<usize>) -> Result<()> {
    let gate = open_gate(config);
    let index = gate
        .try_load()
        .with_context(|| "Failed to build index from transcript")?;

    let limit = limit.unwrap_or(config.retrieval.max_occurrences);
    let occurrences = index.windowed_occurrences(fragment, limit);
    if occurrences.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for (n, occ) in occurrences.iter().enumerate() {
        println!("{}. line {} (page {})", n + 1, occ.line_index, occ.page);
        println!("    snippet: \"{}\"", occ.snippet.trim());
        for line in occ.context.lines() {
            println!("    | {}", line);
        }
        println!();
    }
    Ok(())
}
