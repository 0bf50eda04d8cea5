//! Error types shared by the HTTP layer, the scrapers and the export pipeline.
//!
//! Failures are split by where they are caught:
//!
//! - [`HttpError`] and [`ValidationError`] are unit-level. Fan-out helpers log
//!   them and drop the failing unit (one page, one record, one partition).
//! - [`ScrapeError`] is what escapes `scrape()` / `to_file()`. The runner logs
//!   it and moves on to the next scraper.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A request that could not be completed.
///
/// The concurrency wrapper never retries; whatever the underlying client
/// reports is handed back unchanged.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Raised by non-reqwest clients (test stubs, alternative transports).
    #[error("request to {url} failed: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("could not build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("concurrency gate closed")]
    GateClosed,
}

impl HttpError {
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
            }
        } else {
            HttpError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// A fetched payload that does not have the shape of the expected record.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid {kind} payload: {source}")]
    Json {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} is missing `{field}`")]
    Missing {
        kind: &'static str,
        field: &'static str,
    },

    #[error("could not parse {kind} date {raw:?}")]
    Date { kind: &'static str, raw: String },
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("csv write failed: {0}")]
    Write(#[from] csv::Error),

    #[error("csv flush failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid date {0:?}, expected DD-MM-YYYY")]
    Date(String),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Everything that can make a whole scraper run fail.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("worker thread failed: {0}")]
    Offload(#[from] tokio::task::JoinError),

    #[error("no scraper registered as {0:?}")]
    UnknownScraper(String),
}
