//! indiatoday.in group search API.
//!
//! The JSON search already filters by date; each hit's page is fetched for
//! its body text. The window is half-open, `[start, end)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::base::{ScrapeParams, Scraper};
use crate::error::{ScrapeError, ValidationError};
use crate::fanout::{dedup_by_key, gather_isolated, offload};
use crate::http::RequestOptions;
use crate::models::{Bounds, FieldValue, Record};
use crate::utils::{de, element_text};

pub const BASE_URL: &str = "https://www.indiatoday.in";
const CONTENT_TYPES: &str = "all,story,video,photo_gallery,audio,visualstory";

static STORY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.Story_description__fq_4S:nth-child(1) p").expect("valid selector"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Author {
    pub title: String,
}

/// The parts of a search hit the export uses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentItem {
    pub title_short: String,
    pub description_short: String,
    pub canonical_url: String,
    #[serde(default)]
    pub share_link_url: Option<String>,
    #[serde(deserialize_with = "de::flexible_datetime")]
    pub datetime_published: DateTime<Utc>,
    #[serde(default)]
    pub author: Vec<Author>,
}

impl ContentItem {
    pub fn url(&self) -> String {
        format!("{BASE_URL}/{}", self.canonical_url.trim_start_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Search {
    status_code: i64,
    data: SearchData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndiaTodayArticle {
    pub content_item: ContentItem,
    pub body: String,
    pub keyword: String,
}

impl IndiaTodayArticle {
    pub fn date(&self) -> DateTime<Utc> {
        self.content_item.datetime_published
    }

    pub fn author(&self) -> Option<&str> {
        self.content_item.author.first().map(|a| a.title.as_str())
    }
}

impl Record for IndiaTodayArticle {
    fn fields() -> &'static [&'static str] {
        &["content_item", "body", "keyword"]
    }

    fn allow_list() -> Option<&'static [&'static str]> {
        Some(&["date", "url", "title", "desc", "author", "keyword", "body"])
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let item = &self.content_item;
        Some(match name {
            "date" => self.date().into(),
            "url" => item.url().into(),
            "title" => (&item.title_short).into(),
            "desc" => (&item.description_short).into(),
            "author" => self.author().into(),
            "keyword" => (&self.keyword).into(),
            "body" => (&self.body).into(),
            _ => return None,
        })
    }
}

/// Validate the search response, dropping hits that do not fit.
pub fn parse_search(body: &[u8]) -> Result<Vec<ContentItem>, ValidationError> {
    let search: Search = serde_json::from_slice(body).map_err(|source| ValidationError::Json {
        kind: "IndiaTodaySearch",
        source,
    })?;
    debug!(status = search.status_code, hits = search.data.content.len(), "India Today search");
    let mut items = Vec::with_capacity(search.data.content.len());
    for raw in search.data.content {
        match serde_json::from_value::<ContentItem>(raw) {
            Ok(item) => items.push(item),
            Err(e) => error!(error = %e, "Ignoring invalid India Today content item"),
        }
    }
    Ok(items)
}

pub fn parse_story(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.select(&STORY).map(element_text).collect::<Vec<_>>().join("\n")
}

pub struct IndiaTodayOnlineScraper {
    params: ScrapeParams,
}

impl IndiaTodayOnlineScraper {
    pub fn new(params: ScrapeParams) -> Self {
        Self { params }
    }

    async fn expand(&self, item: ContentItem, keyword: &str) -> Result<IndiaTodayArticle, ScrapeError> {
        let resp = self
            .params
            .http
            .get(&item.url(), RequestOptions::new())
            .await?
            .error_for_status()?;
        let html = resp.text();
        let body = offload(move || parse_story(&html)).await?;
        Ok(IndiaTodayArticle {
            content_item: item,
            body,
            keyword: keyword.to_string(),
        })
    }

    #[instrument(level = "info", skip(self))]
    async fn search(&self, keyword: &str) -> Result<Vec<IndiaTodayArticle>, ScrapeError> {
        let window = &self.params.window;
        let opts = RequestOptions::new()
            .param("q", keyword)
            .param("site", "it")
            .param("ctype", CONTENT_TYPES)
            .param("datestart", window.start_date().format("%Y-%m-%d"))
            .param("dateend", window.end_date().format("%Y-%m-%d"));
        let resp = self
            .params
            .http
            .get(&format!("{BASE_URL}/api/ajax/groupsearchlist"), opts)
            .await?
            .error_for_status()?;
        let items = parse_search(&resp.body)?;

        Ok(gather_isolated(items.into_iter().map(|item| {
            (item.url(), async move { self.expand(item, keyword).await.map(Some) })
        }))
        .await)
    }
}

#[async_trait]
impl Scraper for IndiaTodayOnlineScraper {
    type Record = IndiaTodayArticle;

    fn name(&self) -> &'static str {
        "IndiaTodayOnlineScraper"
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    #[instrument(level = "info", skip_all, fields(scraper = "IndiaTodayOnlineScraper"))]
    async fn scrape(&self) -> Result<Vec<IndiaTodayArticle>, ScrapeError> {
        let units = self
            .params
            .keywords
            .iter()
            .map(|kw| (format!("keyword {kw:?}"), self.search(kw)));
        let articles = gather_isolated(units).await;

        let window = self.params.window;
        let articles: Vec<IndiaTodayArticle> = dedup_by_key(articles, |a| a.content_item.canonical_url.clone())
            .into_iter()
            .filter(|a| window.contains(a.date(), Bounds::HalfOpen))
            .collect();
        info!(count = articles.len(), "Scraped India Today articles");
        Ok(articles)
    }
}
