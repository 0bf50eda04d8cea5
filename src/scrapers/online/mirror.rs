//! Mumbai Mirror and Bangalore Mirror. The two sites share a CMS, so one
//! scraper type serves both.
//!
//! Search pages are plain HTML lists of links; articles carry their metadata
//! as JSON-LD. The search is walked over a fixed page range per keyword.

use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::base::{ScrapeParams, Scraper};
use crate::error::{ScrapeError, ValidationError};
use crate::fanout::{dedup_by_key, gather_isolated, offload};
use crate::http::RequestOptions;
use crate::models::{Bounds, FieldValue, Record};
use crate::utils::de;

/// Search result pages walked for every keyword.
pub const PAGES: Range<u32> = 10..50;

#[derive(Debug)]
pub struct MirrorSite {
    pub name: &'static str,
    pub base_url: &'static str,
}

pub static MUMBAI: MirrorSite = MirrorSite {
    name: "MumbaiMirrorOnlineScraper",
    base_url: "https://mumbaimirror.indiatimes.com",
};

pub static BANGALORE: MirrorSite = MirrorSite {
    name: "BangaloreMirrorOnlineScraper",
    base_url: "https://bangaloremirror.indiatimes.com",
};

static SEARCH_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("div.searchcontent a").expect("valid selector"));
static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector"));

fn dash() -> String {
    "-".to_string()
}

#[derive(Debug, Deserialize)]
struct LdAuthor {
    #[serde(default = "dash")]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LdArticle {
    url: String,
    #[serde(default = "dash")]
    thumbnail_url: String,
    #[serde(deserialize_with = "de::flexible_datetime")]
    date_published: DateTime<Utc>,
    #[serde(deserialize_with = "de::flexible_datetime")]
    date_modified: DateTime<Utc>,
    #[serde(default = "dash")]
    headline: String,
    description: String,
    #[serde(default)]
    author: Option<LdAuthor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirrorOnlineArticle {
    pub url: String,
    pub thumbnail_url: String,
    pub date_published: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub headline: String,
    pub description: String,
    pub author: String,
}

impl Record for MirrorOnlineArticle {
    fn fields() -> &'static [&'static str] {
        &[
            "url",
            "thumbnailUrl",
            "datePublished",
            "dateModified",
            "headline",
            "description",
            "author",
        ]
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "url" => (&self.url).into(),
            "thumbnailUrl" => (&self.thumbnail_url).into(),
            "datePublished" => self.date_published.into(),
            "dateModified" => self.date_modified.into(),
            "headline" => (&self.headline).into(),
            "description" => (&self.description).into(),
            "author" => (&self.author).into(),
            _ => return None,
        })
    }
}

fn in_pagination(anchor: ElementRef<'_>) -> bool {
    anchor.ancestors().filter_map(ElementRef::wrap).any(|el| {
        let classes: Vec<&str> = el.value().classes().collect();
        classes.contains(&"Pagination")
    })
}

/// Article links on a search page, minus the pager.
pub fn parse_search_page(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&SEARCH_LINKS)
        .filter(|a| !in_pagination(*a))
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Read an article's JSON-LD block.
pub fn parse_article(html: &str) -> Result<MirrorOnlineArticle, ValidationError> {
    let doc = Html::parse_document(html);
    let raw = doc
        .select(&LD_JSON)
        .next()
        .map(|s| s.text().collect::<String>())
        .unwrap_or_else(|| "{}".to_string());
    let ld: LdArticle = serde_json::from_str(&raw).map_err(|source| ValidationError::Json {
        kind: "MirrorOnlineArticle",
        source,
    })?;
    Ok(MirrorOnlineArticle {
        url: ld.url,
        thumbnail_url: ld.thumbnail_url,
        date_published: ld.date_published,
        date_modified: ld.date_modified,
        headline: ld.headline,
        description: ld.description,
        author: ld.author.map(|a| a.name).unwrap_or_else(dash),
    })
}

pub struct MirrorOnlineScraper {
    params: ScrapeParams,
    site: &'static MirrorSite,
    pages: Range<u32>,
}

impl MirrorOnlineScraper {
    pub fn new(site: &'static MirrorSite, params: ScrapeParams) -> Self {
        Self {
            params,
            site,
            pages: PAGES,
        }
    }

    pub fn mumbai(params: ScrapeParams) -> Self {
        Self::new(&MUMBAI, params)
    }

    pub fn bangalore(params: ScrapeParams) -> Self {
        Self::new(&BANGALORE, params)
    }

    pub fn with_pages(mut self, pages: Range<u32>) -> Self {
        self.pages = pages;
        self
    }

    async fn fetch_article(&self, path: String) -> Result<MirrorOnlineArticle, ScrapeError> {
        let url = format!("{}/news/{}", self.site.base_url, path.trim_start_matches('/'));
        let resp = self.params.http.get(&url, RequestOptions::new()).await?.error_for_status()?;
        let html = resp.text();
        Ok(offload(move || parse_article(&html)).await??)
    }

    /// One search page. A non-200 answer means the page does not exist.
    #[instrument(level = "debug", skip(self))]
    async fn search_page(&self, keyword: &str, page: u32) -> Result<Vec<MirrorOnlineArticle>, ScrapeError> {
        let opts = RequestOptions::new().param("query", keyword).param("pagenumber", page);
        let resp = self
            .params
            .http
            .get(&format!("{}/getsearchdata.cms", self.site.base_url), opts)
            .await?;
        if resp.status != 200 {
            debug!(status = resp.status, "Search page unavailable");
            return Ok(Vec::new());
        }
        let html = resp.text();
        let paths = offload(move || parse_search_page(&html)).await?;

        let window = self.params.window;
        let articles = gather_isolated(paths.into_iter().map(|path| {
            (path.clone(), async move { self.fetch_article(path).await.map(Some) })
        }))
        .await
        .into_iter()
        .filter(|a| window.contains(a.date_published, Bounds::Exclusive))
        .collect();
        Ok(articles)
    }
}

#[async_trait]
impl Scraper for MirrorOnlineScraper {
    type Record = MirrorOnlineArticle;

    fn name(&self) -> &'static str {
        self.site.name
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    #[instrument(level = "info", skip_all, fields(scraper = self.site.name))]
    async fn scrape(&self) -> Result<Vec<MirrorOnlineArticle>, ScrapeError> {
        let units = self.params.keywords.iter().flat_map(|kw| {
            self.pages.clone().map(move |page| {
                (format!("{kw:?} page {page}"), self.search_page(kw, page))
            })
        });
        let articles = dedup_by_key(gather_isolated(units).await, |a| a.url.clone());
        info!(count = articles.len(), "Scraped Mirror articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_search_page_skips_pager() {
        let html = r#"
            <div class="searchcontent">
              <a href="/mumbai/crime/story/1.cms">One</a>
              <a href="/mumbai/other/story/2.cms">Two</a>
              <div class="Pagination clearfix"><a href="?page=2">2</a></div>
            </div>"#;
        assert_eq!(
            parse_search_page(html),
            vec!["/mumbai/crime/story/1.cms", "/mumbai/other/story/2.cms"]
        );
    }

    #[test]
    fn test_parse_article_defaults() {
        let html = r#"<html><head><script type="application/ld+json">
            {"url": "https://mumbaimirror.indiatimes.com/news/1.cms",
             "datePublished": "2024-01-01T10:00:00+05:30",
             "dateModified": "2024-01-01T11:00:00+05:30",
             "description": "Desc"}
        </script></head></html>"#;
        let article = parse_article(html).unwrap();
        assert_eq!(article.headline, "-");
        assert_eq!(article.thumbnail_url, "-");
        assert_eq!(article.author, "-");
        assert_eq!(article.date_published, Utc.with_ymd_and_hms(2024, 1, 1, 4, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_article_without_ld_json_is_invalid() {
        assert!(parse_article("<html></html>").is_err());
    }

    #[test]
    fn test_sites() {
        assert_eq!(MUMBAI.name, "MumbaiMirrorOnlineScraper");
        assert_eq!(BANGALORE.base_url, "https://bangaloremirror.indiatimes.com");
        assert_eq!(PAGES.len(), 40);
    }
}
