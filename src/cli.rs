//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to the
//! configuration file.

use crate::analysis::GroupingPolicy;
use clap::Parser;
use std::path::PathBuf;

/// GenReport - generation report processor
///
/// Watches an input folder for generation report XML files and writes a
/// result document per file with value totals, the peak emission day per
/// fossil generator and coal heat rates.
///
/// Examples:
///   genreport --input ./in --output ./out
///   genreport --file ./in/01-Basic.xml --output ./out
///   genreport --process-existing --no-watch
///   genreport --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Folder to watch for new generation reports
    #[arg(short, long, value_name = "DIR", env = "GENREPORT_INPUT")]
    pub input: Option<PathBuf>,

    /// Folder to write result documents to
    #[arg(short, long, value_name = "DIR", env = "GENREPORT_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Reference factor document
    #[arg(short, long, value_name = "FILE")]
    pub reference_data: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for genreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Process a single file and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["process_existing", "no_watch"])]
    pub file: Option<PathBuf>,

    /// Process files already in the input folder before watching
    #[arg(long)]
    pub process_existing: bool,

    /// Process files already in the input folder, then exit
    #[arg(long)]
    pub no_watch: bool,

    /// Attempts per file before it is abandoned
    #[arg(long, value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Wait between attempts, in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Wait after a file appears before the first attempt, in milliseconds
    #[arg(long, value_name = "MS")]
    pub settle_delay_ms: Option<u64>,

    /// How records are grouped for totals
    #[arg(long, value_name = "POLICY")]
    pub grouping: Option<GroupingPolicy>,

    /// Drop records whose generator label has no factor instead of using 0
    #[arg(long)]
    pub strict_factors: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default genreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.max_retries == Some(0) {
            return Err("Max retries must be at least 1".to_string());
        }

        if let Some(ref file) = self.file {
            if !file.is_file() {
                return Err(format!("Input file does not exist: {}", file.display()));
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_dir() {
                return Err(format!(
                    "Input folder does not exist: {}",
                    input.display()
                ));
            }
        }

        Ok(())
    }

    /// Whether the folder is swept before (or instead of) watching.
    pub fn sweeps_existing(&self) -> bool {
        self.process_existing || self.no_watch
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `verbose`; `--quiet` overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
