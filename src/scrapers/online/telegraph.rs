//! telegraphindia.com site search.
//!
//! The search page reports a total hit count and serves 20 results per page,
//! starting at page 0. Each hit is fetched and its publish stamp parsed; the
//! window is exclusive at both ends.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};

use crate::base::{ScrapeParams, Scraper};
use crate::error::ScrapeError;
use crate::fanout::{dedup_by_key, gather_isolated, offload, remaining_pages};
use crate::http::RequestOptions;
use crate::models::{Bounds, FieldValue, Record};
use crate::utils::{IST, absolute_url, element_text};

pub const BASE_URL: &str = "https://www.telegraphindia.com";
pub const PAGE_SIZE: usize = 20;

const HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Referer", "https://www.telegraphindia.com/"),
    ("Cookie", "AKA_A2=A"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "same-origin"),
];

static RESULT_COUNT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.searchresult").expect("valid selector"));
static RESULT_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul.storylisting li > a").expect("valid selector"));
static SECTION: Lazy<Selector> = Lazy::new(|| Selector::parse(".articletsection").expect("valid selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));
static H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("valid selector"));
static PUBLISH: Lazy<Selector> = Lazy::new(|| Selector::parse(".publishdate").expect("valid selector"));
static STRONG: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").expect("valid selector"));
static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").expect("valid selector"));
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("#contentbox > div p").expect("valid selector"));
static PUBLISHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Published (\d{2}\.\d{2}\.\d{2}), (\d{2}:\d{2}) (\w{2})").expect("valid publish pattern")
});

#[derive(Debug, Clone, PartialEq)]
pub struct TelegraphOnlineArticle {
    pub date: Option<DateTime<Utc>>,
    pub title: String,
    pub content: String,
    pub author: String,
    pub location: String,
    pub header: String,
    pub url: String,
}

impl Record for TelegraphOnlineArticle {
    fn fields() -> &'static [&'static str] {
        &["date", "title", "content", "author", "location", "header", "url"]
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "date" => self.date.into(),
            "title" => (&self.title).into(),
            "content" => (&self.content).into(),
            "author" => (&self.author).into(),
            "location" => (&self.location).into(),
            "header" => (&self.header).into(),
            "url" => (&self.url).into(),
            _ => return None,
        })
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub total: usize,
    pub article_urls: Vec<String>,
}

/// `None` when the page has no result counter at all (no hits, or blocked).
pub fn parse_search_page(html: &str) -> Option<SearchPage> {
    let doc = Html::parse_document(html);
    let counter = doc.select(&RESULT_COUNT).next()?;
    let total = element_text(counter)
        .split_whitespace()
        .last()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    let article_urls = doc
        .select(&RESULT_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| absolute_url(BASE_URL, href))
        .collect();
    Some(SearchPage { total, article_urls })
}

/// Parse "Published 05.01.24, 10:42 PM" as IST.
pub fn parse_publish_stamp(text: &str) -> Option<DateTime<Utc>> {
    let caps = PUBLISHED.captures(text)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%d.%m.%y").ok()?;
    let time = NaiveTime::parse_from_str(&format!("{} {}", &caps[2], &caps[3]), "%I:%M %p").ok()?;
    IST.from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_article(html: &str, url: String) -> TelegraphOnlineArticle {
    let doc = Html::parse_document(html);
    let mut article = TelegraphOnlineArticle {
        date: None,
        title: String::new(),
        content: String::new(),
        author: String::new(),
        location: String::new(),
        header: String::new(),
        url,
    };

    if let Some(section) = doc.select(&SECTION).next() {
        article.title = section.select(&H1).next().map(element_text).unwrap_or_default();
        article.header = section.select(&H2).next().map(element_text).unwrap_or_default();
        if let Some(meta) = section.select(&PUBLISH).next() {
            article.author = meta.select(&STRONG).next().map(element_text).unwrap_or_default();
            article.location = meta.select(&SPAN).next().map(element_text).unwrap_or_default();
            article.date = parse_publish_stamp(&meta.text().collect::<String>());
        }
    }
    article.content = doc.select(&PARAGRAPHS).map(element_text).collect::<Vec<_>>().join("\n");
    article
}

pub struct TelegraphOnlineScraper {
    params: ScrapeParams,
}

impl TelegraphOnlineScraper {
    pub fn new(params: ScrapeParams) -> Self {
        Self { params }
    }

    async fn search_page(&self, keyword: &str, page: u32) -> Result<Option<SearchPage>, ScrapeError> {
        let opts = RequestOptions::new()
            .headers(HEADERS)
            .param("search-term", keyword)
            .param("page", page);
        let resp = self
            .params
            .http
            .get(&format!("{BASE_URL}/search"), opts)
            .await?
            .error_for_status()?;
        let html = resp.text();
        Ok(offload(move || parse_search_page(&html)).await?)
    }

    async fn fetch_article(&self, url: String) -> Result<TelegraphOnlineArticle, ScrapeError> {
        let resp = self
            .params
            .http
            .get(&url, RequestOptions::new().headers(HEADERS))
            .await?
            .error_for_status()?;
        let html = resp.text();
        Ok(offload(move || parse_article(&html, url)).await?)
    }

    /// Fetch every hit on a page and keep the ones inside the window.
    async fn articles_in(&self, page: SearchPage) -> Vec<TelegraphOnlineArticle> {
        let listed = page.article_urls.len();
        let window = self.params.window;
        let articles: Vec<TelegraphOnlineArticle> = gather_isolated(page.article_urls.into_iter().map(|url| {
            (url.clone(), async move { self.fetch_article(url).await.map(Some) })
        }))
        .await
        .into_iter()
        .filter(|a| a.date.is_some_and(|d| window.contains(d, Bounds::Exclusive)))
        .collect();
        debug!(kept = articles.len(), listed, "Filtered Telegraph search page");
        articles
    }

    #[instrument(level = "info", skip(self))]
    async fn search_keyword(&self, keyword: &str) -> Result<Vec<TelegraphOnlineArticle>, ScrapeError> {
        let Some(initial) = self.search_page(keyword, 0).await? else {
            debug!("No search results");
            return Ok(Vec::new());
        };
        let pages = remaining_pages(initial.total, PAGE_SIZE, 0);
        info!(total = initial.total, extra_pages = pages.len(), "Paginating Telegraph search");

        let mut articles = self.articles_in(initial).await;
        let rest = gather_isolated(pages.map(|page| {
            let fut = async move {
                Ok::<_, ScrapeError>(match self.search_page(keyword, page).await? {
                    Some(found) => self.articles_in(found).await,
                    None => Vec::new(),
                })
            };
            (format!("page {page}"), fut)
        }))
        .await;
        articles.extend(rest);
        Ok(articles)
    }
}

#[async_trait]
impl Scraper for TelegraphOnlineScraper {
    type Record = TelegraphOnlineArticle;

    fn name(&self) -> &'static str {
        "TelegraphOnlineScraper"
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    #[instrument(level = "info", skip_all, fields(scraper = "TelegraphOnlineScraper"))]
    async fn scrape(&self) -> Result<Vec<TelegraphOnlineArticle>, ScrapeError> {
        let units = self
            .params
            .keywords
            .iter()
            .map(|kw| (format!("keyword {kw:?}"), self.search_keyword(kw)));
        let articles = dedup_by_key(gather_isolated(units).await, |a| a.url.clone());
        info!(count = articles.len(), "Scraped Telegraph articles");
        Ok(articles)
    }
}
