//! Run configuration.
//!
//! Values come from three layers, highest priority first:
//!
//! 1. command-line flags and their environment variables ([`crate::cli::Cli`])
//! 2. an optional YAML settings file (`--config`)
//! 3. the defaults in this module
//!
//! A `.env` file is loaded before the CLI is parsed, so env-backed flags can
//! live there too.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::models::TimeWindow;
use crate::utils::IST;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:130.0) Gecko/20100101 Firefox/130.0";
pub const DEFAULT_KEYWORDS: &[&str] = &["suicide", "kill self"];
pub const DEFAULT_LOOKBACK_WEEKS: i64 = 8;
pub const CLI_DATE_FORMAT: &str = "%d-%m-%Y";

/// Knobs for the underlying HTTP client and the concurrency gate.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub max_concurrency: Option<usize>,
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub follow_redirects: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            follow_redirects: true,
        }
    }
}

/// Shape of the optional YAML settings file. Every key is optional.
///
/// ```yaml
/// max_concurrency: 16
/// timeout_secs: 60
/// keywords: ["suicide", "kill self"]
/// out: ./exports
/// folder: weekly
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub max_concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub follow_redirects: Option<bool>,
    pub keywords: Option<Vec<String>>,
    pub out: Option<PathBuf>,
    pub folder: Option<String>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: FileSettings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), "Loaded settings file");
        debug!(?settings, "Settings file contents");
        Ok(settings)
    }
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub scraper: Option<String>,
    pub window: TimeWindow,
    pub keywords: Vec<String>,
    pub out: PathBuf,
    pub folder: String,
    pub http: HttpSettings,
}

/// Parse a `DD-MM-YYYY` date as given on the command line.
pub fn parse_cli_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), CLI_DATE_FORMAT).map_err(|_| ConfigError::Date(raw.to_string()))
}

/// Midnight IST at the start of `date`, as a UTC instant.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    midnight
        .and_local_timezone(*IST)
        .single()
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// Resolve the window: explicit dates win; a missing end is `now`, a
/// missing start is eight weeks before the end.
pub fn resolve_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<TimeWindow, ConfigError> {
    let end = end.map(start_of_day).unwrap_or(now);
    let start = start
        .map(start_of_day)
        .unwrap_or_else(|| end - chrono::Duration::weeks(DEFAULT_LOOKBACK_WEEKS));
    Ok(TimeWindow::new(start, end)?)
}

/// Split comma-separated keyword arguments, trimming blanks.
pub fn normalize_keywords<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|s| {
            s.as_ref()
                .split(',')
                .map(|k| k.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|k| !k.is_empty())
        .collect()
}
