//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.snaplens.toml` files.

use crate::models::Depth;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".snaplens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Storage locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of sections analyzed at once. 1 is sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the OpenAI-compatible server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// How long a fetched model list stays fresh.
    #[serde(default = "default_models_cache_ttl")]
    pub models_cache_ttl_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            server_url: default_server_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            models_cache_ttl_seconds: default_models_cache_ttl(),
        }
    }
}

fn default_model() -> String {
    "local-model".to_string()
}

fn default_server_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> Option<u32> {
    Some(4096)
}

fn default_timeout() -> u64 {
    120
}

fn default_models_cache_ttl() -> u64 {
    300
}

/// Where snapshots are read from and analyses written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshots_dir")]
    pub snapshots_dir: String,

    #[serde(default = "default_analyses_dir")]
    pub analyses_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshots_dir: default_snapshots_dir(),
            analyses_dir: default_analyses_dir(),
        }
    }
}

fn default_snapshots_dir() -> String {
    "./snapshots".to_string()
}

fn default_analyses_dir() -> String {
    "./analyses".to_string()
}

/// Prompt-building settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Depth used when a request does not name one.
    #[serde(default)]
    pub default_depth: Depth,

    /// Section data beyond this many characters is truncated.
    #[serde(default = "default_max_section_chars")]
    pub max_section_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_depth: Depth::default(),
            max_section_chars: default_max_section_chars(),
        }
    }
}

fn default_max_section_chars() -> usize {
    10_000
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Number of findings listed under top issues.
    #[serde(default = "default_top_issues_limit")]
    pub top_issues_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_issues_limit: default_top_issues_limit(),
        }
    }
}

fn default_top_issues_limit() -> usize {
    5
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
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line (or through their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.server_url {
            self.model.server_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(max_tokens) = args.max_tokens {
            self.model.max_tokens = Some(max_tokens);
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref dir) = args.snapshots_dir {
            self.storage.snapshots_dir = dir.display().to_string();
        }
        if let Some(ref dir) = args.analyses_dir {
            self.storage.analyses_dir = dir.display().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.server_url, "http://localhost:1234/v1");
        assert_eq!(config.model.max_tokens, Some(4096));
        assert_eq!(config.general.concurrency, 1);
        assert_eq!(config.report.top_issues_limit, 5);
        assert_eq!(config.analysis.default_depth, Depth::Standard);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[model]
name = "qwen2.5-7b-instruct"
temperature = 0.2

[storage]
snapshots_dir = "/data/snapshots"

[analysis]
default_depth = "detailed"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.model.name, "qwen2.5-7b-instruct");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.timeout_seconds, 120);
        assert_eq!(config.storage.snapshots_dir, "/data/snapshots");
        assert_eq!(config.storage.analyses_dir, "./analyses");
        assert_eq!(config.analysis.default_depth, Depth::Detailed);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[model\nname = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_merge_only_overrides_given_values() {
        let mut config = Config::default();
        config.model.name = "from-file".into();

        let args = crate::cli::Args::parse_from([
            "snaplens",
            "--timeout",
            "30",
            "--concurrency",
            "3",
            "list",
        ]);
        config.merge_with_args(&args);

        assert_eq!(config.model.timeout_seconds, 30);
        assert_eq!(config.general.concurrency, 3);
        assert_eq!(config.storage.snapshots_dir, "./snapshots");
        assert!(!config.general.verbose);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[analysis]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.server_url, default_server_url());
    }
}
