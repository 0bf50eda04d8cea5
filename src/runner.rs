//! Selects scrapers, runs them, and routes their files to storage.
//!
//! A scraper whose `to_file()` fails is logged and reported; it never stops
//! the others. An upload failure is treated the same way.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{error, info, instrument};

use crate::base::{ScrapeParams, Source};
use crate::error::ScrapeError;
use crate::outputs::storage::Storage;
use crate::registry;

/// Outcome of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// `(scraper, location)` for every uploaded file.
    pub uploaded: Vec<(String, String)>,
    /// `(scraper, error)` for every scraper that produced nothing.
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Produce one scraper's file and upload it. Returns where it landed.
#[instrument(level = "info", skip_all, fields(scraper = source.name()))]
pub async fn run_source(source: &dyn Source, storage: &dyn Storage, folder: &str) -> Result<String, ScrapeError> {
    let file = source.to_file().await?;
    let location = storage.upload_file(&file, folder).await?;
    info!(file = file.name(), %location, bytes = file.data().len(), "Uploaded scrape results");
    Ok(location)
}

/// Build and run the scraper registered as `name`.
pub async fn run_one(
    name: &str,
    params: ScrapeParams,
    storage: &dyn Storage,
    folder: &str,
) -> Result<String, ScrapeError> {
    let source = registry::build(name, params)?;
    run_source(source.as_ref(), storage, folder).await
}

/// Run every given source concurrently, isolating each one's failure.
pub async fn run_sources(sources: Vec<Box<dyn Source>>, storage: &dyn Storage, folder: &str) -> RunReport {
    let mut pending: FuturesUnordered<_> = sources
        .iter()
        .map(|source| async move {
            let name = source.name().to_string();
            (name, run_source(source.as_ref(), storage, folder).await)
        })
        .collect();

    let mut report = RunReport::default();
    while let Some((name, result)) = pending.next().await {
        match result {
            Ok(location) => report.uploaded.push((name, location)),
            Err(e) => {
                error!(scraper = %name, error = %e, "Scraper failed; continuing with the rest");
                report.failed.push((name, e.to_string()));
            }
        }
    }
    info!(
        uploaded = report.uploaded.len(),
        failed = report.failed.len(),
        "Batch finished"
    );
    report
}

/// Run every registered scraper against the same parameters.
pub async fn run_all(params: ScrapeParams, storage: &dyn Storage, folder: &str) -> RunReport {
    let sources = registry::SCRAPERS
        .iter()
        .map(|(_, ctor)| ctor(params.clone()))
        .collect();
    run_sources(sources, storage, folder).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Scraper;
    use crate::error::HttpError;
    use crate::http::{Http, ReqwestClient};
    use crate::models::TimeWindow;
    use crate::outputs::storage::FileSystem;
    use crate::scrapers::dummy::{DummyRecord, DummyScraper};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct Broken {
        params: ScrapeParams,
    }

    #[async_trait]
    impl Scraper for Broken {
        type Record = DummyRecord;

        fn name(&self) -> &'static str {
            "BrokenScraper"
        }

        fn params(&self) -> &ScrapeParams {
            &self.params
        }

        async fn scrape(&self) -> Result<Vec<DummyRecord>, ScrapeError> {
            Err(HttpError::Unavailable {
                url: "https://example.com".into(),
                reason: "upstream contract changed".into(),
            }
            .into())
        }
    }

    fn params() -> ScrapeParams {
        let day = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let http = Http::new(ReqwestClient::from_client(reqwest::Client::new()), None);
        ScrapeParams::new(TimeWindow::new(day, day).unwrap(), vec![], http)
    }

    fn temp_root(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("siren-runner-{tag}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let root = temp_root("batch");
        let storage = FileSystem::new(&root);
        let sources: Vec<Box<dyn Source>> = vec![
            Box::new(Broken { params: params() }),
            Box::new(DummyScraper::new(params())),
        ];

        let report = run_sources(sources, &storage, "weekly").await;

        assert!(!report.is_clean());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "BrokenScraper");
        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(report.uploaded[0].0, "DummyScraper");
        assert!(root.join("weekly/DummyScraper_2024-01-01.csv").is_file());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_run_one_unknown_name() {
        let storage = FileSystem::new(temp_root("unknown"));
        let err = run_one("nope", params(), &storage, "").await.unwrap_err();
        assert!(matches!(err, ScrapeError::UnknownScraper(_)));
    }

    #[tokio::test]
    async fn test_run_one_dummy() {
        let root = temp_root("one");
        let storage = FileSystem::new(&root);
        let location = run_one("dummy", params(), &storage, "").await.unwrap();
        assert!(location.ends_with("DummyScraper_2024-01-01.csv"));
        let _ = std::fs::remove_dir_all(&root);
    }
}
