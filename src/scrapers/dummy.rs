//! A scraper that never touches the network. Useful for exercising storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::base::{ScrapeParams, Scraper};
use crate::error::ScrapeError;
use crate::models::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq)]
pub struct DummyRecord {
    pub data: Option<String>,
    pub date: DateTime<Utc>,
}

impl Record for DummyRecord {
    fn fields() -> &'static [&'static str] {
        &["data", "date"]
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "data" => Some(self.data.clone().into()),
            "date" => Some(self.date.into()),
            _ => None,
        }
    }
}

pub struct DummyScraper {
    params: ScrapeParams,
}

impl DummyScraper {
    pub fn new(params: ScrapeParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl Scraper for DummyScraper {
    type Record = DummyRecord;

    fn name(&self) -> &'static str {
        "DummyScraper"
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    async fn scrape(&self) -> Result<Vec<DummyRecord>, ScrapeError> {
        debug!(keywords = ?self.params.keywords, "Dummy scrape");
        let date = self.params.window.start();
        Ok(vec![
            DummyRecord {
                data: Some("Dummy Sample A".into()),
                date,
            },
            DummyRecord {
                data: Some("Dummy Sample B".into()),
                date,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Http, ReqwestClient};
    use crate::models::TimeWindow;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_dummy_to_file() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::new(start, start).unwrap();
        let http = Http::new(ReqwestClient::from_client(reqwest::Client::new()), None);
        let scraper = DummyScraper::new(ScrapeParams::new(window, vec![], http));

        let file = scraper.to_file().await.unwrap();
        assert_eq!(file.name(), "DummyScraper_2024-05-01.csv");
        assert_eq!(file.origin(), "DummyScraper");
        let text = String::from_utf8(file.data().to_vec()).unwrap();
        assert_eq!(
            text,
            "data,date\nDummy Sample A,2024-05-01\nDummy Sample B,2024-05-01\n"
        );
    }
}
