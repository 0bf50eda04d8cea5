//! The Telegraph e-paper.
//!
//! There is no search endpoint. Every page of every day in the window is
//! walked, every text-view article on it is fetched, and keywords are matched
//! locally against the lower-cased title and body.

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};

use crate::base::{ScrapeParams, Scraper};
use crate::error::ScrapeError;
use crate::fanout::{dedup_by_key, gather_isolated, offload};
use crate::http::RequestOptions;
use crate::models::{Bounds, FieldValue, Record};
use crate::utils::element_text;

pub const BASE_URL: &str = "https://epaper.telegraphindia.com";

/// Editions whose text view is available. North and South Bengal only serve
/// page images.
pub const TEXTVIEW_EDITIONS: &[(&str, u32)] = &[("calcutta", 71)];

static IMAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"show_pop\('(\d+)','(\d+)','(\d+)'\)").expect("valid show_pop pattern"));
static TOTAL_PAGES: Lazy<Selector> = Lazy::new(|| Selector::parse("#totalpages").expect("valid selector"));
static HEADLINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".haedlinesstory > b:nth-child(1)").expect("valid selector"));
static STORY: Lazy<Selector> = Lazy::new(|| Selector::parse(".storyview-div p").expect("valid selector"));

#[derive(Debug, Clone, PartialEq)]
pub struct TGArticle {
    pub date: NaiveDate,
    pub title: Option<String>,
    pub body: String,
    pub url: String,
    pub page: u32,
    pub page_url: String,
    pub pages: u32,
}

impl TGArticle {
    /// Whether any keyword occurs in the title or body, ignoring case.
    pub fn matches_any(&self, keywords: &[String]) -> bool {
        let title = self.title.as_deref().unwrap_or_default().to_lowercase();
        let body = self.body.to_lowercase();
        keywords.iter().map(|k| k.to_lowercase()).any(|k| title.contains(&k) || body.contains(&k))
    }
}

impl Record for TGArticle {
    fn fields() -> &'static [&'static str] {
        &["date", "title", "body", "url", "page", "page_url", "pages"]
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "date" => self.date.into(),
            "title" => self.title.clone().into(),
            "body" => (&self.body).into(),
            "url" => (&self.url).into(),
            "page" => self.page.into(),
            "page_url" => (&self.page_url).into(),
            "pages" => self.pages.into(),
            _ => return None,
        })
    }
}

/// What one newspaper page links to.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLinks {
    pub total_pages: u32,
    pub textviews: Vec<String>,
}

/// Read the page count and the text-view URLs off one page.
pub fn parse_page(html: &str, edition_id: u32) -> PageLinks {
    let doc = Html::parse_document(html);
    let total_pages = doc
        .select(&TOTAL_PAGES)
        .next()
        .and_then(|e| e.value().attr("value"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    let textviews = IMAGE_REGEX
        .captures_iter(html)
        .map(|c| format!("{BASE_URL}/textview/{}/{}/{edition_id}.html", &c[1], &c[2]))
        .collect();
    PageLinks {
        total_pages,
        textviews,
    }
}

/// Title and body text of a text-view page.
pub fn parse_textview(html: &str) -> (Option<String>, String) {
    let doc = Html::parse_document(html);
    let title = doc.select(&HEADLINE).next().map(element_text);
    let body = doc.select(&STORY).map(element_text).collect::<Vec<_>>().join("\n");
    (title, body)
}

/// One day's paper of one edition.
#[derive(Debug, Clone, Copy)]
struct Paper {
    edition: &'static str,
    edition_id: u32,
    date: NaiveDate,
}

impl Paper {
    fn page_url(&self, page: u32) -> String {
        format!(
            "{BASE_URL}/{}/{}/{}/Page-{page}.html",
            urlencoding::encode(self.edition),
            self.date.format("%Y-%m-%d"),
            self.edition_id
        )
    }
}

pub struct TGScraper {
    params: ScrapeParams,
    editions: &'static [(&'static str, u32)],
}

impl TGScraper {
    pub fn new(params: ScrapeParams) -> Self {
        Self {
            params,
            editions: TEXTVIEW_EDITIONS,
        }
    }

    async fn fetch_page(&self, paper: Paper, page: u32) -> Result<(String, PageLinks), ScrapeError> {
        let url = paper.page_url(page);
        let resp = self.params.http.get(&url, RequestOptions::new()).await?.error_for_status()?;
        let html = resp.text();
        let edition_id = paper.edition_id;
        let links = offload(move || parse_page(&html, edition_id)).await?;
        Ok((url, links))
    }

    async fn fetch_article(
        &self,
        paper: Paper,
        url: String,
        page: u32,
        page_url: String,
        pages: u32,
    ) -> Result<TGArticle, ScrapeError> {
        let resp = self.params.http.get(&url, RequestOptions::new()).await?.error_for_status()?;
        let html = resp.text();
        let (title, body) = offload(move || parse_textview(&html)).await?;
        Ok(TGArticle {
            date: paper.date,
            title,
            body,
            url,
            page,
            page_url,
            pages,
        })
    }

    /// Every article on one page. Articles that fail to load are dropped.
    async fn articles_on(&self, paper: Paper, page: u32, page_url: String, links: PageLinks) -> Vec<TGArticle> {
        let pages = links.total_pages;
        gather_isolated(links.textviews.into_iter().map(|url| {
            let label = url.clone();
            let fut = self.fetch_article(paper, url, page, page_url.clone(), pages);
            (label, async move { fut.await.map(Some) })
        }))
        .await
    }

    /// Walk one paper: page 1 tells how many pages follow.
    #[instrument(level = "info", skip(self), fields(edition = paper.edition, date = %paper.date))]
    async fn search_paper(&self, paper: Paper) -> Result<Vec<TGArticle>, ScrapeError> {
        let (first_url, first) = self.fetch_page(paper, 1).await?;
        let total = first.total_pages;
        debug!(total, "Walking Telegraph paper");

        let mut articles = self.articles_on(paper, 1, first_url, first).await;
        let rest = gather_isolated((2..=total).map(|page| {
            let fut = async move {
                let (url, links) = self.fetch_page(paper, page).await?;
                Ok::<_, ScrapeError>(self.articles_on(paper, page, url, links).await)
            };
            (format!("page {page}"), fut)
        }))
        .await;
        articles.extend(rest);

        let keywords = &self.params.keywords;
        Ok(articles.into_iter().filter(|a| a.matches_any(keywords)).collect())
    }
}

#[async_trait]
impl Scraper for TGScraper {
    type Record = TGArticle;

    fn name(&self) -> &'static str {
        "TGScraper"
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    #[instrument(level = "info", skip_all, fields(scraper = "TGScraper"))]
    async fn scrape(&self) -> Result<Vec<TGArticle>, ScrapeError> {
        let window = self.params.window;
        let papers = self.editions.iter().flat_map(|&(edition, edition_id)| {
            window.days().into_iter().map(move |date| Paper {
                edition,
                edition_id,
                date,
            })
        });
        let units = papers.map(|paper| {
            let label = format!("{} {}", paper.edition, paper.date);
            (label, self.search_paper(paper))
        });
        let articles = gather_isolated(units).await;

        let articles: Vec<TGArticle> = dedup_by_key(articles, |a| a.url.clone())
            .into_iter()
            .filter(|a| window.contains_date(a.date, Bounds::Inclusive))
            .collect();
        info!(count = articles.len(), "Scraped Telegraph e-paper articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        let html = r#"
            <input type="hidden" id="totalpages" value="12">
            <area onclick="show_pop('101','5001','1')">
            <area onclick="show_pop('101','5002','2')">
        "#;
        let links = parse_page(html, 71);
        assert_eq!(links.total_pages, 12);
        assert_eq!(
            links.textviews,
            vec![
                "https://epaper.telegraphindia.com/textview/101/5001/71.html",
                "https://epaper.telegraphindia.com/textview/101/5002/71.html",
            ]
        );
    }

    #[test]
    fn test_parse_page_without_total() {
        assert_eq!(parse_page("<html></html>", 71).total_pages, 0);
    }

    #[test]
    fn test_parse_textview() {
        let html = r#"
            <div class="haedlinesstory"><b>Student found dead</b><b>ignored</b></div>
            <div class="storyview-div"><p>First.</p><p>Second.</p></div>
        "#;
        let (title, body) = parse_textview(html);
        assert_eq!(title.as_deref(), Some("Student found dead"));
        assert_eq!(body, "First.\nSecond.");
    }

    #[test]
    fn test_keyword_match_ignores_case() {
        let article = TGArticle {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            title: Some("Police report SUICIDE".into()),
            body: "".into(),
            url: "u".into(),
            page: 1,
            page_url: "p".into(),
            pages: 1,
        };
        assert!(article.matches_any(&["Suicide".into()]));
        assert!(!article.matches_any(&["overdose".into()]));
        assert!(!article.matches_any(&[]));
    }

    #[test]
    fn test_page_url_encodes_edition() {
        let paper = Paper {
            edition: "north bengal",
            edition_id: 72,
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        };
        assert_eq!(
            paper.page_url(3),
            "https://epaper.telegraphindia.com/north%20bengal/2024-01-05/72/Page-3.html"
        );
    }
}
