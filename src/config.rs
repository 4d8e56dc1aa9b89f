//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.ourplanet.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::source::EonetConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".ourplanet.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Event source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Fan-out settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output file path. Without one the report goes to
    /// `ourplanet_report.<md|json>`, following the output format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Log at debug level unless `--quiet` is given.
    #[serde(default)]
    pub verbose: bool,

    /// Show a progress bar while fetching.
    #[serde(default = "default_true")]
    pub progress_bar: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: None,
            verbose: false,
            progress_bar: true,
        }
    }
}

const DEFAULT_REPORT_STEM: &str = "ourplanet_report";

/// Where events come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// EONET API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Look-back window in days.
    #[serde(default = "default_days")]
    pub days: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Read events from this fixture directory instead of the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            days: default_days(),
            timeout_seconds: default_timeout(),
            fixtures: None,
        }
    }
}

fn default_api_url() -> String {
    EonetConfig::default().api_url
}

fn default_days() -> u32 {
    360
}

fn default_timeout() -> u64 {
    30
}

/// Fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum category fetches in flight.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    2
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// List individual events under each category.
    #[serde(default = "default_true")]
    pub include_events: bool,

    /// Maximum events listed per category.
    #[serde(default = "default_max_events")]
    pub max_events_per_category: usize,

    /// Keep categories without events in the summary table.
    #[serde(default = "default_true")]
    pub include_empty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_events: true,
            max_events_per_category: default_max_events(),
            include_empty: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_events() -> usize {
    20
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
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.ourplanet.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref api_url) = args.api_url {
            self.source.api_url = api_url.clone();
        }
        if let Some(days) = args.days {
            self.source.days = days;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if let Some(ref fixtures) = args.fixtures {
            self.source.fixtures = Some(fixtures.clone());
        }

        if let Some(max_concurrent) = args.max_concurrent {
            self.fetch.max_concurrent = max_concurrent;
        }

        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
        if args.no_progress || args.quiet {
            self.general.progress_bar = false;
        }
    }

    /// Where the report is written for the given format.
    pub fn output_path(&self, format: OutputFormat) -> String {
        match self.general.output {
            Some(ref output) => output.clone(),
            None => format!("{}.{}", DEFAULT_REPORT_STEM, format.extension()),
        }
    }

    /// Log level from the flags and the `verbose` setting; `--quiet` wins.
    pub fn log_level(&self, args: &Args) -> tracing::Level {
        if args.quiet {
            tracing::Level::ERROR
        } else if args.verbose || self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Settings for the EONET HTTP client.
    pub fn eonet_config(&self) -> EonetConfig {
        EonetConfig {
            api_url: self.source.api_url.clone(),
            days: self.source.days,
            timeout_seconds: self.source.timeout_seconds,
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
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.max_concurrent, 2);
        assert_eq!(config.source.days, 360);
        assert!(config.source.fixtures.is_none());
        assert!(config.report.include_events);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "events.md"
verbose = true

[source]
days = 30
fixtures = "./recorded"

[fetch]
max_concurrent = 4
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output.as_deref(), Some("events.md"));
        assert!(config.general.verbose);
        assert_eq!(config.source.days, 30);
        assert_eq!(config.source.timeout_seconds, 30);
        assert_eq!(config.source.fixtures, Some(PathBuf::from("./recorded")));
        assert_eq!(config.fetch.max_concurrent, 4);
        assert_eq!(config.report.max_events_per_category, 20);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[fetch]"));
        assert!(toml_str.contains("[report]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.fetch.max_concurrent, 2);
    }

    #[test]
    fn test_merge_only_explicit_args() {
        let mut config: Config = toml::from_str("[fetch]\nmax_concurrent = 5\n[source]\ndays = 10\n").unwrap();
        let args = Args::parse_from(["ourplanet", "--days", "90"]);

        config.merge_with_args(&args);

        assert_eq!(config.source.days, 90);
        assert_eq!(config.fetch.max_concurrent, 5);
        assert!(config.general.progress_bar);
    }

    #[test]
    fn test_output_path_follows_format() {
        let config = Config::default();
        assert_eq!(config.output_path(OutputFormat::Markdown), "ourplanet_report.md");
        assert_eq!(config.output_path(OutputFormat::Json), "ourplanet_report.json");

        let mut config = Config::default();
        let args = Args::parse_from(["ourplanet", "--format", "json", "-o", "events.txt"]);
        config.merge_with_args(&args);
        assert_eq!(config.output_path(args.format), "events.txt");
    }

    #[test]
    fn test_log_level() {
        let args = Args::parse_from(["ourplanet"]);
        let mut config = Config::default();
        assert_eq!(config.log_level(&args), tracing::Level::INFO);

        let verbose = Args::parse_from(["ourplanet", "--verbose"]);
        assert_eq!(config.log_level(&verbose), tracing::Level::DEBUG);

        let quiet = Args::parse_from(["ourplanet", "--quiet"]);
        assert_eq!(config.log_level(&quiet), tracing::Level::ERROR);

        config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(config.log_level(&args), tracing::Level::DEBUG);
        assert_eq!(config.log_level(&quiet), tracing::Level::ERROR);
    }

    #[test]
    fn test_quiet_disables_progress_bar() {
        let mut config = Config::default();
        let args = Args::parse_from(["ourplanet", "--quiet"]);
        config.merge_with_args(&args);
        assert!(!config.general.progress_bar);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[fetch]\nmax_concurrent = 3\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.fetch.max_concurrent, 3);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[fetch\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }
}
