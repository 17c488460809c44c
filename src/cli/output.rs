//! Colored output helpers for CLI
//!
//! Consistent terminal output for the tutor-server commands.

use crate::types::{BuildReport, IndexSource, RetrievedChunk};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the startup banner
    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n",
                "tutor-server".bright_green().bold(),
                version.dimmed()
            );
        } else {
            println!("\n   tutor-server {}\n", version);
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Summarise how a collection was made available
    pub fn index_source(&self, collection: &str, source: &IndexSource) {
        match source {
            IndexSource::Attached { chunks } | IndexSource::Loaded { chunks } => {
                self.success(&format!("Collection '{}' loaded ({} chunks)", collection, chunks));
            }
            IndexSource::Built(report) => self.build_report(report),
        }
    }

    /// Summarise a build
    pub fn build_report(&self, report: &BuildReport) {
        self.success(&format!(
            "Built '{}': {} chunks from {} documents",
            report.collection, report.chunks, report.documents
        ));
        for skipped in &report.skipped {
            self.warning(&format!("Skipped {} ({})", skipped.path, skipped.reason));
        }
    }

    /// Print one ranked passage
    pub fn passage(&self, rank: usize, chunk: &RetrievedChunk) {
        let heading = format!("#{} {}:{}", rank, chunk.source, chunk.chunk_index);
        let score = format!("{:.4}", chunk.score);
        if self.colored {
            println!("\n  {} {}", heading.bright_cyan().bold(), score.dimmed());
        } else {
            println!("\n  {} ({})", heading, score);
        }
        for line in chunk.text.lines() {
            println!("    {}", line);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "hint:".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }
}
