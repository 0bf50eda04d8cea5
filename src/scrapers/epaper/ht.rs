//! Hindustan Times e-paper.
//!
//! The search endpoint returns an HTML table of hits for one edition and one
//! keyword; each hit is then expanded through the JSON article view. Edition
//! ids are not published, so every id in `0..60` is searched.

use std::ops::Range;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::base::{ScrapeParams, Scraper};
use crate::error::{ScrapeError, ValidationError};
use crate::fanout::{Seen, dedup_by_key, gather_isolated, offload};
use crate::http::RequestOptions;
use crate::models::{Bounds, FieldValue, Record};
use crate::utils::{de, element_text};

pub const SEARCH_URL: &str = "https://epaper.hindustantimes.com/Home/Search";
pub const ARTICLE_URL: &str = "https://epaper.hindustantimes.com/User/ShowArticleView";
pub const EDITIONS: Range<u32> = 0..60;
const SEARCH_DATE_FORMAT: &str = "%d/%m/%Y";

static ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".table > tbody:nth-child(2) > tr").expect("valid selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("td > label").expect("valid selector"));
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td[data-name]").expect("valid selector"));
static ONCLICK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'[^']*','([^']+)'").expect("valid onclick pattern"));

/// A search hit, before the article view is fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct HtPartialArticle {
    pub article_id: String,
    pub page_no: u32,
    pub edition_name: String,
    pub edition_date: NaiveDate,
    pub edition_id: u32,
}

impl HtPartialArticle {
    pub fn url(&self) -> String {
        format!(
            "https://epaper.hindustantimes.com/Home/ShareArticle?OrgId={}&textview=0",
            self.article_id
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LinkPicture {
    #[serde(rename = "url")]
    full_path_link: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Story {
    #[serde(rename = "Headlines")]
    headlines: Vec<String>,
    #[serde(rename = "Body")]
    body: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ArticleView {
    #[serde(rename = "ParentEdition", default)]
    parent_edition: Option<String>,
    #[serde(rename = "PageId", default)]
    page_id: Option<i64>,
    #[serde(rename = "storyid", default, deserialize_with = "de::opt_string_or_number")]
    story_id: Option<String>,
    #[serde(rename = "Eddate", default)]
    edition_date: Option<String>,
    #[serde(rename = "Edname", default)]
    edition_name: Option<String>,
    #[serde(rename = "PageNumber", deserialize_with = "de::string_or_number")]
    page_number: String,
    #[serde(rename = "LinkPicture", default)]
    link_pictures: Vec<LinkPicture>,
    #[serde(rename = "StoryContent")]
    story_content: Vec<Story>,
}

/// A fully expanded article. Owns a copy of the hit it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct HtArticle {
    pub partial: HtPartialArticle,
    pub parent_edition: Option<String>,
    pub page_id: Option<i64>,
    pub story_id: Option<String>,
    edition_date_override: Option<NaiveDate>,
    edition_name_override: Option<String>,
    page_number_override: String,
    pub thumbnail: Option<String>,
    pub headline: String,
    pub content: String,
}

impl HtArticle {
    /// Combine a search hit with its article view JSON.
    pub fn from_view(partial: HtPartialArticle, body: &[u8]) -> Result<Self, ValidationError> {
        let view: ArticleView = serde_json::from_slice(body).map_err(|source| ValidationError::Json {
            kind: "HtArticle",
            source,
        })?;
        let story = view.story_content.into_iter().next().ok_or(ValidationError::Missing {
            kind: "HtArticle",
            field: "StoryContent",
        })?;
        let headline = story.headlines.into_iter().next().ok_or(ValidationError::Missing {
            kind: "HtArticle",
            field: "Headlines",
        })?;
        let edition_date_override = match view.edition_date.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => Some(NaiveDate::parse_from_str(raw, SEARCH_DATE_FORMAT).map_err(|_| {
                ValidationError::Date {
                    kind: "HtArticle",
                    raw: raw.to_string(),
                }
            })?),
        };

        Ok(Self {
            partial,
            parent_edition: view.parent_edition,
            page_id: view.page_id,
            story_id: view.story_id,
            edition_date_override,
            edition_name_override: view.edition_name.filter(|s| !s.is_empty()),
            page_number_override: view.page_number,
            thumbnail: view.link_pictures.into_iter().next().map(|p| p.full_path_link),
            headline,
            content: story.body,
        })
    }

    pub fn url(&self) -> String {
        self.partial.url()
    }

    pub fn edition_date(&self) -> NaiveDate {
        self.edition_date_override.unwrap_or(self.partial.edition_date)
    }

    pub fn edition_name(&self) -> &str {
        self.edition_name_override
            .as_deref()
            .unwrap_or(&self.partial.edition_name)
    }

    pub fn page_number(&self) -> String {
        if self.page_number_override.is_empty() {
            self.partial.page_no.to_string()
        } else {
            self.page_number_override.clone()
        }
    }
}

impl Record for HtArticle {
    fn fields() -> &'static [&'static str] {
        &[
            "parent_edition",
            "page_id",
            "story_id",
            "headline",
            "content",
            "thumbnail",
        ]
    }

    fn allow_list() -> Option<&'static [&'static str]> {
        Some(&[
            "url",
            "page_number",
            "headline",
            "content",
            "edition_date",
            "edition_name",
            "thumbnail",
        ])
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "url" => self.url().into(),
            "page_number" => self.page_number().into(),
            "headline" => (&self.headline).into(),
            "content" => (&self.content).into(),
            "edition_date" => self.edition_date().into(),
            "edition_name" => self.edition_name().into(),
            "thumbnail" => self.thumbnail.clone().into(),
            "parent_edition" => self.parent_edition.clone().into(),
            "page_id" => self.page_id.into(),
            "story_id" => self.story_id.clone().into(),
            _ => return None,
        })
    }
}

/// Extract the hits from one search result page. Rows that cannot be read
/// are skipped with a warning.
pub fn parse_search_results(html: &str, edition_id: u32) -> Vec<HtPartialArticle> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();
    for row in doc.select(&ROWS) {
        match parse_row(row, edition_id) {
            Ok(partial) => out.push(partial),
            Err(e) => warn!(edition_id, error = %e, "Skipping unreadable HT search row"),
        }
    }
    out
}

fn parse_row(row: scraper::ElementRef<'_>, edition_id: u32) -> Result<HtPartialArticle, ValidationError> {
    const KIND: &str = "HtPartialArticle";
    let missing = |field| ValidationError::Missing { kind: KIND, field };

    let onclick = row
        .select(&TITLE)
        .next()
        .and_then(|label| label.value().attr("onclick"))
        .ok_or_else(|| missing("article_id"))?;
    let article_id = ONCLICK_ID
        .captures(onclick)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| missing("article_id"))?;

    let (mut page_no, mut edition_name, mut edition_date) = (None, None, None);
    for cell in row.select(&CELLS) {
        let text = element_text(cell);
        match cell.value().attr("data-name") {
            Some("PageNo") => page_no = Some(text),
            Some("EditionName") => edition_name = Some(text),
            Some("editionDate") => edition_date = Some(text),
            _ => {}
        }
    }

    let page_no = page_no
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| missing("page_no"))?;
    let raw_date = edition_date.ok_or_else(|| missing("edition_date"))?;
    let edition_date = NaiveDate::parse_from_str(&raw_date, "%Y/%m/%d").map_err(|_| ValidationError::Date {
        kind: KIND,
        raw: raw_date.clone(),
    })?;

    Ok(HtPartialArticle {
        article_id,
        page_no,
        edition_name: edition_name.ok_or_else(|| missing("edition_name"))?,
        edition_date,
        edition_id,
    })
}

pub struct HTScraper {
    params: ScrapeParams,
    editions: Vec<u32>,
}

impl HTScraper {
    pub fn new(params: ScrapeParams) -> Self {
        Self {
            params,
            editions: EDITIONS.collect(),
        }
    }

    /// Restrict the search to the given edition ids.
    pub fn with_editions(mut self, editions: impl IntoIterator<Item = u32>) -> Self {
        self.editions = editions.into_iter().collect();
        self
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, edition_id: u32, keyword: &str) -> Result<Vec<HtPartialArticle>, ScrapeError> {
        let window = &self.params.window;
        let opts = RequestOptions::new()
            .param("SearchText", keyword)
            .param("EditionID", edition_id)
            .param("FromDate", window.start_date().format(SEARCH_DATE_FORMAT))
            .param("ToDate", window.end_date().format(SEARCH_DATE_FORMAT));
        let resp = self.params.http.get(SEARCH_URL, opts).await?.error_for_status()?;
        let html = resp.text();
        let hits = offload(move || parse_search_results(&html, edition_id)).await?;
        debug!(count = hits.len(), "Parsed HT search results");
        Ok(hits)
    }

    async fn expand(&self, partial: HtPartialArticle) -> Result<HtArticle, ScrapeError> {
        let opts = RequestOptions::new().param("OrgId", &partial.article_id);
        let resp = self.params.http.get(ARTICLE_URL, opts).await?.error_for_status()?;
        Ok(HtArticle::from_view(partial, &resp.body)?)
    }

    /// One `(edition, keyword)` partition: search, then expand each distinct hit.
    #[instrument(level = "info", skip(self))]
    async fn scrape_partition(&self, edition_id: u32, keyword: &str) -> Result<Vec<HtArticle>, ScrapeError> {
        let mut seen = Seen::new();
        let partials: Vec<HtPartialArticle> = self
            .search(edition_id, keyword)
            .await?
            .into_iter()
            .filter(|p| seen.first(p.article_id.clone()))
            .collect();

        let articles = gather_isolated(partials.into_iter().map(|partial| {
            let label = format!("article {}", partial.article_id);
            (label, async move { self.expand(partial).await.map(Some) })
        }))
        .await;
        Ok(articles)
    }
}

#[async_trait]
impl Scraper for HTScraper {
    type Record = HtArticle;

    fn name(&self) -> &'static str {
        "HTScraper"
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    #[instrument(level = "info", skip_all, fields(scraper = "HTScraper"))]
    async fn scrape(&self) -> Result<Vec<HtArticle>, ScrapeError> {
        let units: Vec<_> = self.editions.iter().flat_map(|&edition_id| {
            self.params.keywords.iter().map(move |keyword| {
                let label = format!("edition {edition_id} / {keyword:?}");
                (label, self.scrape_partition(edition_id, keyword))
            })
        }).collect();
        let articles = gather_isolated(units).await;

        let window = self.params.window;
        let articles: Vec<HtArticle> = dedup_by_key(articles, |a| a.headline.clone())
            .into_iter()
            .filter(|a| window.contains_date(a.edition_date(), Bounds::Inclusive))
            .collect();
        info!(count = articles.len(), "Scraped HT articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::csv::{CsvOptions, columns};

    const SEARCH_HTML: &str = r#"
        <html><body>
        <table class="table">
          <thead><tr><th>Title</th></tr></thead>
          <tbody>
            <tr>
              <td><label onclick="ShowArticle('x','HT_111');">Man found dead</label></td>
              <td data-name="PageNo">4</td>
              <td data-name="EditionName">Delhi</td>
              <td data-name="editionDate">2024/01/02</td>
            </tr>
            <tr>
              <td><label>No onclick here</label></td>
              <td data-name="PageNo">5</td>
              <td data-name="EditionName">Delhi</td>
              <td data-name="editionDate">2024/01/02</td>
            </tr>
            <tr>
              <td><label onclick="ShowArticle('y','HT_222');">Second</label></td>
              <td data-name="PageNo">7</td>
              <td data-name="EditionName">Mumbai</td>
              <td data-name="editionDate">2024/01/01</td>
            </tr>
          </tbody>
        </table>
        </body></html>"#;

    fn partial() -> HtPartialArticle {
        HtPartialArticle {
            article_id: "HT_111".into(),
            page_no: 4,
            edition_name: "Delhi".into(),
            edition_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            edition_id: 3,
        }
    }

    #[test]
    fn test_parse_search_results() {
        let hits = parse_search_results(SEARCH_HTML, 3);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], partial());
        assert_eq!(hits[1].article_id, "HT_222");
        assert_eq!(hits[1].page_no, 7);
    }

    #[test]
    fn test_article_falls_back_to_partial() {
        let body = br#"{
            "PageNumber": "",
            "LinkPicture": [],
            "StoryContent": [{"Headlines": ["Man found dead"], "Body": "Text"}]
        }"#;
        let article = HtArticle::from_view(partial(), body).unwrap();
        assert_eq!(article.page_number(), "4");
        assert_eq!(article.edition_name(), "Delhi");
        assert_eq!(article.edition_date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(article.thumbnail, None);
        assert_eq!(
            article.url(),
            "https://epaper.hindustantimes.com/Home/ShareArticle?OrgId=HT_111&textview=0"
        );
    }

    #[test]
    fn test_article_prefers_view_values() {
        let body = br#"{
            "Eddate": "03/01/2024",
            "Edname": "Lucknow",
            "PageNumber": 9,
            "storyid": 77,
            "LinkPicture": [{"caption": "c", "url": "https://img/1.jpg"}],
            "StoryContent": [{"Headlines": ["H"], "Body": "B"}]
        }"#;
        let article = HtArticle::from_view(partial(), body).unwrap();
        assert_eq!(article.page_number(), "9");
        assert_eq!(article.edition_name(), "Lucknow");
        assert_eq!(article.edition_date(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(article.thumbnail.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(article.story_id.as_deref(), Some("77"));
    }

    #[test]
    fn test_article_without_story_is_invalid() {
        let body = br#"{"PageNumber": "1", "StoryContent": []}"#;
        assert!(matches!(
            HtArticle::from_view(partial(), body),
            Err(ValidationError::Missing { field: "StoryContent", .. })
        ));
    }

    #[test]
    fn test_allow_list_wins() {
        let cols = columns::<HtArticle>(&CsvOptions::new().include("story_id").exclude("url"));
        assert_eq!(
            cols,
            vec!["url", "page_number", "headline", "content", "edition_date", "edition_name", "thumbnail"]
        );
    }
}
