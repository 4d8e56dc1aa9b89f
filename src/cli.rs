//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// OurPlanet - natural events per category from NASA EONET
///
/// Fetches the EONET category catalog, downloads each category's events
/// with a bounded number of requests in flight, and writes a Markdown or
/// JSON report.
///
/// Examples:
///   ourplanet
///   ourplanet --days 30 --max-concurrent 4 --format json -o events.json
///   ourplanet --fixtures ./recorded --no-progress
///   ourplanet --list-categories
///   ourplanet --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// EONET API base URL
    ///
    /// Defaults to the public v2.1 API or the value in .ourplanet.toml.
    #[arg(long, value_name = "URL", env = "OURPLANET_API_URL")]
    pub api_url: Option<String>,

    /// Only fetch events from the last DAYS days
    #[arg(short, long, value_name = "DAYS")]
    pub days: Option<u32>,

    /// Maximum number of category fetches in flight
    #[arg(short = 'j', long, value_name = "NUM")]
    pub max_concurrent: Option<usize>,

    /// Per-request timeout in seconds
    ///
    /// A request that times out fails its category; the other categories
    /// still complete.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Read recorded EONET responses from a directory instead of the API
    ///
    /// Expects categories.json and events/<category id>.json.
    #[arg(long, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ourplanet.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Print the category catalog and exit without fetching events
    #[arg(long)]
    pub list_categories: bool,

    /// Generate a default .ourplanet.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension used for the default report path.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
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

        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.days == Some(0) {
            return Err("Days must be at least 1".to_string());
        }

        if self.max_concurrent == Some(0) {
            return Err("Max concurrent fetches must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref fixtures) = self.fixtures {
            if !fixtures.is_dir() {
                return Err(format!(
                    "Fixture directory does not exist: {}",
                    fixtures.display()
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args::parse_from(["ourplanet"])
    }

    #[test]
    fn test_defaults() {
        let args = make_args();
        assert_eq!(args.format, OutputFormat::Markdown);
        assert!(args.max_concurrent.is_none());
        assert!(!args.list_categories);
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "ourplanet",
            "-j",
            "4",
            "--days",
            "30",
            "--format",
            "json",
            "-o",
            "events.json",
        ]);
        assert_eq!(args.max_concurrent, Some(4));
        assert_eq!(args.days, Some(30));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.output, Some(PathBuf::from("events.json")));
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let mut args = make_args();
        args.max_concurrent = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("eonet.gsfc.nasa.gov".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_fixtures() {
        let mut args = make_args();
        args.fixtures = Some(PathBuf::from("/definitely/not/here"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert_eq!(OutputFormat::Json.extension(), "json");
    }
}
