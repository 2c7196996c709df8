//! # pagectx CLI
//!
//! ## Usage
//!
//! ```bash
//! pagectx --config ./config/pagectx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pagectx locate <fragment>` | Global line indices containing a fragment |
//! | `pagectx occurrences <fragment>` | Occurrence windows for a fragment |
//! | `pagectx headings <query>` | Matching headings with surrounding lines |
//! | `pagectx structure` | Detected headings and document totals |
//! | `pagectx context --instruction <text>` | Budgeted context for an instruction |
//! | `pagectx serve` | Start the HTTP server |
//!
//! Logs go to stderr; set `RUST_LOG` or pass `-v` for more detail.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pagectx::context::ContextArgs;
use pagectx::{config, context, search, server, structure};

/// pagectx: transcript indexing and budgeted context retrieval.
#[derive(Parser)]
#[command(
    name = "pagectx",
    about = "Transcript indexing and budgeted context retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pagectx.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/pagectx.toml")]
    config: PathBuf,

    /// Transcript JSON to use instead of `[transcript].path`.
    #[arg(long, global = true)]
    transcript: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print global line indices whose text contains the fragment.
    Locate {
        fragment: String,
    },

    /// Print occurrence windows for a fragment.
    Occurrences {
        fragment: String,

        /// Maximum occurrences (defaults to `retrieval.max_occurrences`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print headings matching a query, e.g. "Chapter 3" or "3".
    Headings {
        query: String,
    },

    /// Print detected headings, page and line totals, and the fingerprint.
    Structure {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Assemble budgeted context for an instruction.
    Context {
        /// The editing instruction.
        #[arg(long)]
        instruction: String,

        /// Text selected in the document.
        #[arg(long)]
        excerpt: Option<String>,

        /// Raw document text (defaults to `[transcript].document`, then the
        /// transcript lines).
        #[arg(long)]
        document: Option<PathBuf>,

        /// Character budget (defaults to `retrieval.budget`).
        #[arg(long)]
        budget: Option<usize>,

        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = config::load_or_default(&cli.config)?;
    if let Some(path) = cli.transcript {
        cfg.transcript.path = path;
    }

    match cli.command {
        Commands::Locate { fragment } => {
            search::run_locate(&cfg, &fragment)?;
        }
        Commands::Occurrences { fragment, limit } => {
            search::run_occurrences(&cfg, &fragment, limit)?;
        }
        Commands::Headings { query } => {
            structure::run_headings(&cfg, &query)?;
        }
        Commands::Structure { json } => {
            structure::run_structure(&cfg, json)?;
        }
        Commands::Context {
            instruction,
            excerpt,
            document,
            budget,
            json,
        } => {
            context::run_context(
                &cfg,
                &ContextArgs {
                    instruction: &instruction,
                    excerpt: excerpt.as_deref(),
                    document: document.as_deref(),
                    budget,
                    json,
                },
            )?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
