//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Depth;
use crate::report::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// snaplens - LLM-assisted analysis of system configuration snapshots
///
/// Reads snapshots written by a system collector, asks a local
/// OpenAI-compatible model to assess each section, and stores the
/// results for reports and comparisons.
///
/// Examples:
///   snaplens analyze WS01-20240101
///   snaplens analyze WS01-20240101 --focus Security,Storage --depth detailed
///   snaplens report WS01-20240101 --format json --output report.json
///   snaplens compare WS01-20240101 WS01-20240201
///   snaplens models --refresh
///   snaplens init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Model to use for analysis
    ///
    /// Can also be set via LLM_MODEL env var or .snaplens.toml config.
    #[arg(short, long, global = true, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible model server
    #[arg(long, global = true, value_name = "URL", env = "LLM_SERVER_URL")]
    pub server_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long, global = true, env = "LLM_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Maximum tokens per model response
    #[arg(long, global = true, value_name = "TOKENS", env = "LLM_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Per-section model timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of sections analyzed at once
    #[arg(long, global = true, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Directory holding snapshots
    #[arg(long, global = true, value_name = "DIR")]
    pub snapshots_dir: Option<PathBuf>,

    /// Directory holding analyses
    #[arg(long, global = true, value_name = "DIR")]
    pub analyses_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .snaplens.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze a snapshot
    Analyze {
        /// Snapshot id (directory name under the snapshots directory)
        snapshot_id: String,

        /// Focus areas (comma-separated): Security, Performance, Storage,
        /// Network, Software, Configuration, Services, Updates, All
        #[arg(long, value_name = "AREAS", value_delimiter = ',')]
        focus: Vec<String>,

        /// Exact sections to analyze (comma-separated); overrides --focus
        #[arg(long, value_name = "SECTIONS", value_delimiter = ',')]
        sections: Vec<String>,

        /// Analysis depth: basic, standard or detailed
        #[arg(long, value_name = "DEPTH")]
        depth: Option<Depth>,
    },

    /// List stored analyses, newest first
    List,

    /// Print a stored analysis as JSON
    Show {
        id: String,

        /// Include the raw model interactions
        #[arg(long)]
        interactions: bool,
    },

    /// Delete a stored analysis
    Delete { id: String },

    /// Render the report of an analysis
    Report {
        id: String,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Number of top issues to list
        #[arg(long, value_name = "COUNT")]
        limit: Option<usize>,
    },

    /// Compare two analyses
    Compare {
        baseline: String,
        current: String,

        /// Sections to compare (comma-separated); all when omitted
        #[arg(long, value_name = "SECTIONS", value_delimiter = ',')]
        sections: Vec<String>,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List models offered by the server
    Models {
        /// Bypass the cached list
        #[arg(long)]
        refresh: bool,
    },

    /// Generate a default .snaplens.toml configuration file
    InitConfig,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.server_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Server URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.max_tokens == Some(0) {
            return Err("Max tokens must be at least 1".to_string());
        }

        if let Command::Report { limit: Some(0), .. } = self.command {
            return Err("Limit must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
