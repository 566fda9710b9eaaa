//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `genreport.toml` files.

use crate::analysis::{EngineOptions, GroupingPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "genreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Folder and reference data settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// File arrival and retry settings.
    #[serde(default)]
    pub ingress: IngressConfig,

    /// Calculation settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Folder watched for new generation reports.
    #[serde(default = "default_input_folder")]
    pub input_folder: PathBuf,

    /// Folder result documents are written to.
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,

    /// Reference factor document, loaded once at startup.
    #[serde(default = "default_reference_data")]
    pub reference_data: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            input_folder: default_input_folder(),
            output_folder: default_output_folder(),
            reference_data: default_reference_data(),
            verbose: false,
        }
    }
}

fn default_input_folder() -> PathBuf {
    PathBuf::from("input")
}

fn default_output_folder() -> PathBuf {
    PathBuf::from("output")
}

fn default_reference_data() -> PathBuf {
    PathBuf::from("ReferenceData.xml")
}

/// File arrival settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Attempts per file before it is abandoned.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub retry_delay_ms: u64,

    /// Wait after a file appears before the first attempt.
    #[serde(default = "default_delay_ms")]
    pub settle_delay_ms: u64,

    /// Extension of files to pick up, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_delay_ms(),
            settle_delay_ms: default_delay_ms(),
            extension: default_extension(),
        }
    }
}

fn default_max_retries() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    500
}

fn default_extension() -> String {
    "xml".to_string()
}

/// Calculation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `name-and-kind` (default) or legacy `name` grouping for totals.
    #[serde(default)]
    pub grouping: GroupingPolicy,

    /// Drop records with an unmapped generator label instead of using 0.
    #[serde(default)]
    pub strict_factors: bool,
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            grouping: config.grouping,
            strict_factors: config.strict_factors,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.general.input_folder = input.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output_folder = output.clone();
        }
        if let Some(ref reference) = args.reference_data {
            self.general.reference_data = reference.clone();
        }

        if let Some(retries) = args.max_retries {
            self.ingress.max_retries = retries;
        }
        if let Some(delay) = args.retry_delay_ms {
            self.ingress.retry_delay_ms = delay;
        }
        if let Some(delay) = args.settle_delay_ms {
            self.ingress.settle_delay_ms = delay;
        }

        if let Some(grouping) = args.grouping {
            self.engine.grouping = grouping;
        }

        // Flags always override
        if args.strict_factors {
            self.engine.strict_factors = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check settings that would make every file fail.
    pub fn validate(&self) -> Result<()> {
        if self.ingress.max_retries == 0 {
            anyhow::bail!("max_retries must be at least 1");
        }
        if self.ingress.extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("extension must not be empty");
        }
        Ok(())
    }

    /// Extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.ingress.extension.trim_start_matches('.')
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
