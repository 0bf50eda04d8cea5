//! The contract every source-specific scraper implements.
//!
//! A scraper is built from [`ScrapeParams`] (window, keywords, HTTP handle)
//! and exposes one real operation, [`Scraper::scrape`], returning the full
//! validated record list. [`Scraper::to_file`] is provided on top of it and
//! runs the CSV pipeline.
//!
//! [`Source`] is the object-safe view of a scraper the registry and runner
//! hold as `Box<dyn Source>`; every [`Scraper`] is a [`Source`].
//!
//! Errors escaping `scrape()` are not caught here. They reach the runner,
//! which logs them and carries on with the other scrapers.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::error::ScrapeError;
use crate::http::Http;
use crate::models::{Record, TimeWindow};
use crate::outputs::csv::{CsvOptions, to_csv};
use crate::outputs::file::{OriginFile, csv_file_name};

/// What every scraper is constructed with. Fixed for the whole run.
#[derive(Debug, Clone)]
pub struct ScrapeParams {
    pub window: TimeWindow,
    pub keywords: Vec<String>,
    pub http: Http,
}

impl ScrapeParams {
    pub fn new(window: TimeWindow, keywords: Vec<String>, http: Http) -> Self {
        Self {
            window,
            keywords,
            http,
        }
    }
}

#[async_trait]
pub trait Scraper: Send + Sync {
    type Record: Record;

    /// Identity used for logging and for the output file name.
    fn name(&self) -> &'static str;

    fn params(&self) -> &ScrapeParams;

    /// Search, enrich, deduplicate and window-filter. Returns every record.
    async fn scrape(&self) -> Result<Vec<Self::Record>, ScrapeError>;

    /// Column tweaks applied when this scraper's records are exported.
    fn csv_options(&self) -> CsvOptions {
        CsvOptions::default()
    }

    #[instrument(level = "info", skip_all, fields(scraper = Scraper::name(self)))]
    async fn to_file(&self) -> Result<OriginFile, ScrapeError> {
        let origin = Scraper::name(self);
        let records = self.scrape().await?;
        let buffer = to_csv(&records, &self.csv_options())?;
        let name = csv_file_name(origin, &self.params().window);
        info!(records = records.len(), file = %name, "Serialized scrape results");
        Ok(OriginFile::new(buffer.into_inner(), name, origin))
    }
}

/// Type-erased scraper, as stored in the registry.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;

    async fn to_file(&self) -> Result<OriginFile, ScrapeError>;
}

#[async_trait]
impl<S: Scraper> Source for S {
    fn name(&self) -> &'static str {
        Scraper::name(self)
    }

    async fn to_file(&self) -> Result<OriginFile, ScrapeError> {
        Scraper::to_file(self).await
    }
}
