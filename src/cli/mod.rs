//! CLI module for the tutor server
//!
//! Argument parsing for the `tutor-server` binary. Uses clap for parsing and
//! owo-colors (see [`output`]) for terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tutor Server - retrieval for a biology tutor
#[derive(Parser, Debug)]
#[command(
    name = "tutor-server",
    version,
    about = "Retrieval server for a biology tutor",
    long_about = "Indexes a folder of biology texts and serves the passages most relevant\n\
                  to a learner's question.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  tutor-server                          # Start the server (requires tutor.toml)\n    \
                  tutor-server index                    # Load or build the default collection\n    \
                  tutor-server index --rebuild          # Rebuild it from the corpus\n    \
                  tutor-server query \"What is ATP?\" -k 3\n    \
                  tutor-server --config my.toml config --validate"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "tutor.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Start with built-in defaults when the configuration file is missing
    #[arg(long, global = true)]
    pub allow_default_config: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Load a collection, building it from the corpus if it does not exist
    Index {
        /// Discard any persisted collection and build it again
        #[arg(long)]
        rebuild: bool,

        /// Collection name (defaults to rag.collection)
        #[arg(long)]
        collection: Option<String>,

        /// Corpus folder (defaults to rag.corpus_dir)
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Print the context retrieved for a query
    Query {
        /// Query text
        text: String,

        /// Number of passages (defaults to rag.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Print scored passages instead of the context string
        #[arg(long)]
        scores: bool,

        /// Collection name (defaults to rag.collection)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and exit
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}
