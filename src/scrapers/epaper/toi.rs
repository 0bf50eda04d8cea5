//! Times of India e-paper, through the Harns Cloud search API.
//!
//! One search covers every edition: keywords are sent as "any of these" and
//! the API paginates with a reported `totalDocs`. The first page is
//! load-bearing (it carries the total), so its failure fails the scraper;
//! later pages are isolated.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use crate::base::{ScrapeParams, Scraper};
use crate::error::{ScrapeError, ValidationError};
use crate::fanout::{dedup_by_key, gather_isolated, remaining_pages};
use crate::http::RequestOptions;
use crate::models::{Bounds, FieldValue, Record};
use crate::outputs::csv::CsvOptions;
use crate::utils::de;

pub const SEARCH_URL: &str = "https://epsearch.harnscloud.com/api/v1/epaper/search";
pub const PAGE_SIZE: usize = 50;
const EXCLUDED_TERMS: &[&str] = &["bomb"];

const HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json, text/plain, */*"),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Referer", "https://bcclepaper.indiatimes.com/"),
    ("Content-Type", "application/json"),
    ("Origin", "https://bcclepaper.indiatimes.com"),
    ("Sec-Fetch-Dest", "empty"),
    ("Sec-Fetch-Mode", "cors"),
    ("Sec-Fetch-Site", "cross-site"),
];

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Edition {
    pub date: NaiveDate,
    pub edition_code: String,
    pub publication_code: String,
    pub edition_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TOIArticle {
    pub article_id: String,
    pub edition_id: String,
    #[serde(deserialize_with = "de::string_or_number")]
    pub page: String,
    #[serde(rename = "type")]
    pub kind: i64,
    pub author: String,
    #[serde(default)]
    pub blurb: Option<String>,
    pub body: String,
    pub column_title: String,
    #[serde(rename = "createdAt", default, deserialize_with = "de::opt_flexible_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    pub location: String,
    #[serde(default)]
    pub page_name: String,
    #[serde(default)]
    pub page_title: String,
    pub title: String,
    #[serde(rename = "updatedAt", deserialize_with = "de::flexible_datetime")]
    pub updated_at: DateTime<Utc>,
    pub epaper_view: String,
    pub score: f64,
    pub edition_details: Edition,
}

impl TOIArticle {
    pub fn url(&self) -> String {
        format!(
            "https://epaper.timesgroup.com/article-share?article={}_{}",
            self.page_name, self.edition_details.publication_code
        )
    }
}

impl Record for TOIArticle {
    fn fields() -> &'static [&'static str] {
        &[
            "article_id",
            "edition_id",
            "page",
            "type",
            "author",
            "blurb",
            "body",
            "column_title",
            "createdAt",
            "location",
            "page_name",
            "page_title",
            "title",
            "updatedAt",
            "epaper_view",
            "score",
            "date",
            "edition_code",
            "publication_code",
            "edition_name",
        ]
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let ed = &self.edition_details;
        Some(match name {
            "article_id" => (&self.article_id).into(),
            "edition_id" => (&self.edition_id).into(),
            "page" => (&self.page).into(),
            "type" => self.kind.into(),
            "author" => (&self.author).into(),
            "blurb" => self.blurb.clone().into(),
            "body" => (&self.body).into(),
            "column_title" => (&self.column_title).into(),
            "createdAt" => self.created_at.into(),
            "location" => (&self.location).into(),
            "page_name" => (&self.page_name).into(),
            "page_title" => (&self.page_title).into(),
            "title" => (&self.title).into(),
            "updatedAt" => self.updated_at.into(),
            "epaper_view" => (&self.epaper_view).into(),
            "score" => self.score.into(),
            "date" => ed.date.into(),
            "edition_code" => (&ed.edition_code).into(),
            "publication_code" => (&ed.publication_code).into(),
            "edition_name" => (&ed.edition_name).into(),
            "url" => self.url().into(),
            _ => return None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(rename = "totalDocs")]
    total_docs: usize,
    #[serde(default)]
    data: Vec<Value>,
}

/// One validated page of search results.
#[derive(Debug)]
pub struct SearchPage {
    pub page: u32,
    pub total: usize,
    pub articles: Vec<TOIArticle>,
}

/// Validate a raw search response. Items that do not fit [`TOIArticle`] are
/// logged and skipped; a body without `totalDocs` is an error.
pub fn parse_search_page(body: &[u8], page: u32) -> Result<SearchPage, ValidationError> {
    let raw: RawPage = serde_json::from_slice(body).map_err(|source| ValidationError::Json {
        kind: "SearchResult",
        source,
    })?;

    let mut articles = Vec::with_capacity(raw.data.len());
    for item in raw.data {
        match serde_json::from_value::<TOIArticle>(item) {
            Ok(article) => articles.push(article),
            Err(e) => error!(page, error = %e, "Ignoring invalid TOI article"),
        }
    }
    Ok(SearchPage {
        page,
        total: raw.total_docs,
        articles,
    })
}

pub struct TOIScraper {
    params: ScrapeParams,
    page_size: usize,
}

impl TOIScraper {
    pub fn new(params: ScrapeParams) -> Self {
        Self {
            params,
            page_size: PAGE_SIZE,
        }
    }

    /// Override the `limit` sent to the API.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn query(&self, page: u32) -> Value {
        let window = &self.params.window;
        json!({
            "page": page,
            "allOfThese": "",
            "exactPhrase": "",
            "anyOfThese": self.params.keywords.join(", "),
            "excludeThese": EXCLUDED_TERMS.join(", "),
            "byline": "",
            "location": "",
            "fromDate": window.start_date().format("%Y-%m-%d").to_string(),
            "toDate": window.end_date().format("%Y-%m-%d").to_string(),
            "type": "article",
            "sortBy": "relevance",
            "allEditions": true,
            "editionCode": "All",
            "limit": self.page_size,
            "pageTitle": "",
        })
    }

    #[instrument(level = "info", skip(self))]
    async fn search_page(&self, page: u32) -> Result<SearchPage, ScrapeError> {
        let opts = RequestOptions::new().headers(HEADERS).json(self.query(page));
        let resp = self
            .params
            .http
            .post(SEARCH_URL, opts)
            .await?
            .error_for_status()?;
        let parsed = parse_search_page(&resp.body, page)?;
        info!(total = parsed.total, count = parsed.articles.len(), "Fetched TOI search page");
        Ok(parsed)
    }
}

#[async_trait]
impl Scraper for TOIScraper {
    type Record = TOIArticle;

    fn name(&self) -> &'static str {
        "TOIScraper"
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    fn csv_options(&self) -> CsvOptions {
        CsvOptions::new().include("url")
    }

    #[instrument(level = "info", skip_all, fields(scraper = "TOIScraper"))]
    async fn scrape(&self) -> Result<Vec<TOIArticle>, ScrapeError> {
        if self.params.keywords.is_empty() {
            warn!("No keywords; nothing to search for");
            return Ok(Vec::new());
        }

        let initial = self.search_page(1).await?;
        let total = initial.total;
        let pages = remaining_pages(total, self.page_size, 1);
        info!(total, extra_pages = pages.len(), "Paginating TOI search");

        let rest = gather_isolated(pages.map(|page| {
            let fut = async move { self.search_page(page).await.map(|p| p.articles) };
            (format!("page {page}"), fut)
        }))
        .await;

        let mut articles = initial.articles;
        articles.extend(rest);
        if articles.len() != total {
            warn!(obtained = articles.len(), total, "TOI search returned a different count than reported");
        }

        let window = self.params.window;
        let articles: Vec<TOIArticle> = dedup_by_key(articles, |a| a.article_id.clone())
            .into_iter()
            .filter(|a| window.contains_date(a.edition_details.date, Bounds::Inclusive))
            .collect();
        info!(count = articles.len(), "Scraped TOI articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_json(id: &str, date: &str) -> Value {
        json!({
            "_id": format!("oid-{id}"),
            "article_id": id,
            "edition_id": "TOIDEL",
            "page": "1",
            "type": 1,
            "__v": 0,
            "author": "Staff Reporter",
            "body": "Body text",
            "column_title": "City",
            "createdAt": "2024-01-01T04:00:00Z",
            "location": "Delhi",
            "page_name": format!("TOIDEL_{id}"),
            "title": format!("Title {id}"),
            "updatedAt": "2024-01-01T05:00:00Z",
            "epaper_view": "view",
            "score": 1.5,
            "edition_details": {
                "date": date,
                "edition_code": "TOIDEL",
                "publication_code": "TOI",
                "edition_name": "Delhi"
            }
        })
    }

    #[test]
    fn test_parse_search_page_skips_invalid_items() {
        let body = json!({
            "totalDocs": 3,
            "data": [article_json("a1", "2024-01-01"), {"article_id": "broken"}, article_json("a2", "2024-01-02")]
        });
        let page = parse_search_page(body.to_string().as_bytes(), 1).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.articles.len(), 2);
        assert_eq!(page.articles[0].edition_details.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(page.articles[0].blurb, None);
        assert_eq!(page.articles[0].page_title, "");
    }

    #[test]
    fn test_parse_search_page_requires_total() {
        let err = parse_search_page(br#"{"data": []}"#, 1).unwrap_err();
        assert!(matches!(err, ValidationError::Json { kind: "SearchResult", .. }));
    }

    #[test]
    fn test_record_fields_and_url() {
        let article: TOIArticle = serde_json::from_value(article_json("a9", "2024-01-01")).unwrap();
        assert_eq!(
            article.url(),
            "https://epaper.timesgroup.com/article-share?article=TOIDEL_a9_TOI"
        );
        assert_eq!(article.field("edition_name").unwrap().to_string(), "Delhi");
        assert_eq!(article.field("createdAt").unwrap().to_string(), "2024-01-01");
        assert_eq!(article.field("type").unwrap().to_string(), "1");
        assert!(article.field("_id").is_none());
    }
}
