//! Command-line interface definitions for siren.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can also be provided via environment variables (or a `.env`
//! file) and, below those, via the YAML settings file.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

use crate::config::{
    self, DEFAULT_KEYWORDS, FileSettings, HttpSettings, RunConfig, normalize_keywords,
};
use crate::error::ConfigError;

/// Command-line arguments for siren.
///
/// # Examples
///
/// ```sh
/// # Every registered scraper, last eight weeks, default keywords
/// siren --out ./exports
///
/// # One scraper, explicit window and keywords, at most 8 requests in flight
/// siren epaper.toi --start 01-01-2024 --end 31-01-2024 \
///     --keywords suicide "kill self" --max-concurrency 8 --out ./exports
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Scraper to run (see --list); runs all of them when omitted
    pub scraper: Option<String>,

    /// Earliest date to include, DD-MM-YYYY
    #[arg(long, env = "START", value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Latest date to include, DD-MM-YYYY
    #[arg(long, env = "END", value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// Search keywords; comma-separated values are split
    #[arg(long, env = "KEYWORDS", num_args = 1.., value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Output directory for the filesystem backend
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Destination folder beneath the output directory
    #[arg(long, env = "FOLDER_ID")]
    pub folder: Option<String>,

    /// Maximum simultaneous requests per scraper (0 = unlimited)
    #[arg(long, env = "SIREN_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Optional path to a YAML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the registered scraper names and exit
    #[arg(long)]
    pub list: bool,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    config::parse_cli_date(raw).map_err(|e| e.to_string())
}

impl Cli {
    /// Merge flags over the settings file over defaults.
    pub fn resolve(self, file: FileSettings, now: DateTime<Utc>) -> Result<RunConfig, ConfigError> {
        let window = config::resolve_window(self.start, self.end, now)?;

        let keywords = if !self.keywords.is_empty() {
            normalize_keywords(&self.keywords)
        } else if let Some(kw) = &file.keywords {
            normalize_keywords(kw)
        } else {
            DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
        };

        let defaults = HttpSettings::default();
        let http = HttpSettings {
            max_concurrency: self.max_concurrency.or(file.max_concurrency),
            timeout: self
                .timeout_secs
                .or(file.timeout_secs)
                .map(Duration::from_secs),
            user_agent: file.user_agent.unwrap_or(defaults.user_agent),
            follow_redirects: file.follow_redirects.unwrap_or(defaults.follow_redirects),
        };

        Ok(RunConfig {
            scraper: self.scraper,
            window,
            keywords,
            out: self.out.or(file.out).unwrap_or_else(|| PathBuf::from(".")),
            folder: self.folder.or(file.folder).unwrap_or_default(),
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "siren",
            "epaper.toi",
            "--start",
            "01-01-2024",
            "--end",
            "02-01-2024",
            "--keywords",
            "suicide",
            "kill self",
            "--max-concurrency",
            "4",
        ]);

        assert_eq!(cli.scraper.as_deref(), Some("epaper.toi"));
        assert_eq!(cli.keywords, vec!["suicide", "kill self"]);
        assert_eq!(cli.max_concurrency, Some(4));

        let run = cli.resolve(FileSettings::default(), now()).unwrap();
        // IST midnights
        assert_eq!(run.window.start(), Utc.with_ymd_and_hms(2023, 12, 31, 18, 30, 0).unwrap());
        assert_eq!(run.window.end(), Utc.with_ymd_and_hms(2024, 1, 1, 18, 30, 0).unwrap());
        assert_eq!(run.window.start_date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(run.http.max_concurrency, Some(4));
    }

    #[test]
    fn test_cli_keywords_split_on_commas() {
        let cli = Cli::parse_from(["siren", "--keywords", "suicide,kill self"]);
        assert_eq!(cli.keywords, vec!["suicide", "kill self"]);
    }

    #[test]
    fn test_flags_override_settings_file() {
        let cli = Cli::parse_from(["siren", "--timeout-secs", "5", "-o", "/tmp/out"]);
        let file = FileSettings {
            timeout_secs: Some(60),
            max_concurrency: Some(16),
            keywords: Some(vec!["overdose".into()]),
            out: Some(PathBuf::from("/srv/exports")),
            ..FileSettings::default()
        };
        let run = cli.resolve(file, now()).unwrap();

        assert_eq!(run.http.timeout, Some(Duration::from_secs(5)));
        assert_eq!(run.http.max_concurrency, Some(16));
        assert_eq!(run.keywords, vec!["overdose"]);
        assert_eq!(run.out, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_defaults_when_nothing_given() {
        let cli = Cli::parse_from(["siren"]);
        let run = cli.resolve(FileSettings::default(), now()).unwrap();
        assert_eq!(run.scraper, None);
        assert_eq!(run.keywords, vec!["suicide", "kill self"]);
        assert_eq!(run.http.max_concurrency, None);
        assert_eq!(run.window.end(), now());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(Cli::try_parse_from(["siren", "--start", "2024/01/01"]).is_err());
    }
}
