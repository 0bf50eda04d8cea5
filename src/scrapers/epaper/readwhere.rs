//! Readwhere-hosted e-papers: The New Indian Express, The Tribune and The
//! Indian Express share one platform and differ only in base URL and
//! edition table.
//!
//! For every edition, the `publishdates` endpoint lists the issues inside the
//! window; each issue is then searched once per keyword.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::base::{ScrapeParams, Scraper};
use crate::error::{ScrapeError, ValidationError};
use crate::fanout::{dedup_by_key, gather_isolated};
use crate::http::RequestOptions;
use crate::models::{Bounds, FieldValue, Record};
use crate::outputs::csv::CsvOptions;
use crate::utils::{de, strip_tags};

/// One Readwhere deployment.
#[derive(Debug)]
pub struct Site {
    pub name: &'static str,
    pub base_url: &'static str,
    /// `(edition id, edition name)`
    pub editions: &'static [(&'static str, &'static str)],
}

pub static TNIE: Site = Site {
    name: "TNIEScraper",
    base_url: "https://epaper.newindianexpress.com",
    editions: &[
        ("6539", "The New Indian Express-Kollam"),
        ("3469", "The New Indian Express-Kozhikode"),
        ("11447", "The New Indian Express-Kannur"),
        ("5605", "The New Indian Express-Sambalpur"),
        ("11782", "The New Indian Express-Jeypore"),
        ("3359", "The New Indian Express-Bhubaneswar"),
        ("3353", "The New Indian Express-Chennai"),
        ("3463", "The New Indian Express-Vishakapatnam"),
        ("3464", "The New Indian Express-Vijayawada"),
        ("3381", "The New Indian Express-Hyderabad"),
        ("3357", "The New Indian Express-Bengaluru"),
        ("3358", "The New Indian Express-Kochi"),
        ("3468", "The New Indian Express-Thiruvananthapuram"),
        ("3361", "The New Indian Express-Madurai"),
        ("3480", "The New Indian Express-Tirunelveli"),
        ("3360", "The New Indian Express-Coimbatore"),
        ("3455", "The New Indian Express-Tiruchy"),
        ("11449", "The New Indian Express-Nagapattinam"),
        ("3466", "The New Indian Express-Hubballi"),
        ("28559", "The New Indian Express-Mysuru"),
        ("4619", "The New Indian Express-Shivamogga"),
        ("3456", "The New Indian Express-Vellore"),
        ("3458", "The New Indian Express-Dharmapuri"),
        ("8681", "The New Indian Express-Tadepalligudem"),
        ("8680", "The New Indian Express-Anantapur"),
        ("5601", "The New Indian Express-Kottayam"),
        ("3511", "The New Indian Express-Tirupati"),
        ("11448", "The New Indian Express-Thrissur"),
        ("22689", "The New Indian Express-Kalaburagi"),
        ("3467", "The New Indian Express-Belagavi"),
        ("3474", "The New Indian Express-Mangaluru"),
    ],
};

pub static TRIBUNE: Site = Site {
    name: "TribuneScraper",
    base_url: "https://epaper.tribuneindia.com",
    editions: &[
        ("702", "Jalandhar Edition"),
        ("684", "Bathinda Edition"),
        ("109", "Ludhiana Tribune"),
        ("691", "Life+Style (Ldh)"),
        ("106", "The Tribune"),
        ("686", "Jalandhar Tribune"),
        ("690", "Delhi Edition"),
        ("780", "Haryana Edition"),
        ("108", "Life+Style (Chd)"),
        ("685", "Amritsar Tribune"),
        ("299", "Chandigarh Tribune"),
        ("687", "Himachal Edition"),
    ],
};

pub static TIE: Site = Site {
    name: "TIEScraper",
    base_url: "https://epaper.indianexpress.com",
    editions: &[
        ("271", "CHANDIGARH"),
        ("336", "KOLKATA"),
        ("10015", "JAIPUR"),
        ("433", "LUCKNOW"),
        ("300", "AHMEDABAD"),
        ("266", "PUNE"),
        ("236", "MUMBAI"),
        ("226", "DELHI"),
    ],
};

/// An issue of one edition, as listed by `publishdates`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Issue {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "de::flexible_datetime")]
    pub published: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "pageNum", default, deserialize_with = "de::opt_string_or_number")]
    page_num: Option<String>,
    excerpt: String,
    #[serde(deserialize_with = "de::string_or_number")]
    issue_id: String,
    #[serde(deserialize_with = "de::string_or_number")]
    title_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    status: bool,
    #[serde(rename = "numFound", default)]
    num_found: Option<u64>,
    #[serde(default)]
    data: Vec<Value>,
}

/// A keyword hit inside an issue, carrying a copy of the issue it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadwhereArticle {
    pub id: String,
    pub published: DateTime<Utc>,
    pub base_url: &'static str,
    pub page_num: Option<String>,
    pub excerpt: String,
    pub issue_id: String,
    pub title_id: String,
}

impl ReadwhereArticle {
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.issue_id)
    }
}

impl Record for ReadwhereArticle {
    fn fields() -> &'static [&'static str] {
        &[
            "id",
            "published",
            "base_url",
            "pageNum",
            "excerpt",
            "issue_id",
            "title_id",
        ]
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => (&self.id).into(),
            "published" => self.published.into(),
            "base_url" => self.base_url.into(),
            "pageNum" => self.page_num.clone().into(),
            "excerpt" => (&self.excerpt).into(),
            "issue_id" => (&self.issue_id).into(),
            "title_id" => (&self.title_id).into(),
            "url" => self.url().into(),
            _ => return None,
        })
    }
}

/// Parse the `publishdates` listing.
pub fn parse_issues(body: &[u8]) -> Result<Vec<Issue>, ValidationError> {
    serde_json::from_slice(body).map_err(|source| ValidationError::Json { kind: "Issue", source })
}

/// Parse one issue search. A `status: false` answer means no hits. Hits that
/// do not validate are logged and skipped.
pub fn parse_search(body: &[u8], issue: &Issue, base_url: &'static str) -> Result<Vec<ReadwhereArticle>, ValidationError> {
    let result: SearchResult = serde_json::from_slice(body).map_err(|source| ValidationError::Json {
        kind: "SearchResult",
        source,
    })?;
    if !result.status {
        return Ok(Vec::new());
    }
    debug!(issue = %issue.id, found = ?result.num_found, "Readwhere issue search");

    let mut out = Vec::with_capacity(result.data.len());
    for item in result.data {
        match serde_json::from_value::<Hit>(item) {
            Ok(hit) => out.push(ReadwhereArticle {
                id: issue.id.clone(),
                published: issue.published,
                base_url,
                page_num: hit.page_num,
                excerpt: strip_tags(&hit.excerpt),
                issue_id: hit.issue_id,
                title_id: hit.title_id,
            }),
            Err(e) => error!(issue = %issue.id, error = %e, "Ignoring invalid Readwhere hit"),
        }
    }
    Ok(out)
}

pub struct ReadwhereScraper {
    params: ScrapeParams,
    site: &'static Site,
}

impl ReadwhereScraper {
    pub fn new(site: &'static Site, params: ScrapeParams) -> Self {
        Self { params, site }
    }

    pub fn tnie(params: ScrapeParams) -> Self {
        Self::new(&TNIE, params)
    }

    pub fn tribune(params: ScrapeParams) -> Self {
        Self::new(&TRIBUNE, params)
    }

    pub fn tie(params: ScrapeParams) -> Self {
        Self::new(&TIE, params)
    }

    pub fn site(&self) -> &'static Site {
        self.site
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.site.base_url.trim_end_matches('/'), path)
    }

    async fn issues(&self, edition_id: &str) -> Result<Vec<Issue>, ScrapeError> {
        let window = &self.params.window;
        let url = self.url(&format!(
            "viewer/publishdates/{edition_id}/{}/{}/json",
            window.start().timestamp(),
            window.end().timestamp()
        ));
        let resp = self.params.http.get(&url, RequestOptions::new()).await?.error_for_status()?;
        Ok(parse_issues(&resp.body)?)
    }

    async fn search_issue(&self, issue: &Issue, keyword: &str) -> Result<Vec<ReadwhereArticle>, ScrapeError> {
        let url = self.url(&format!(
            "search/issue/{}/{}",
            issue.id,
            urlencoding::encode(keyword)
        ));
        let resp = self.params.http.get(&url, RequestOptions::new()).await?.error_for_status()?;
        Ok(parse_search(&resp.body, issue, self.site.base_url)?)
    }

    /// One edition: list its issues, then search each issue for each keyword.
    #[instrument(level = "info", skip(self), fields(site = self.site.name))]
    async fn search_edition(&self, edition_id: &str, edition_name: &str) -> Result<Vec<ReadwhereArticle>, ScrapeError> {
        let issues = self.issues(edition_id).await?;
        debug!(issues = issues.len(), "Listed Readwhere issues");

        let units = issues.iter().flat_map(|issue| {
            self.params.keywords.iter().map(move |keyword| {
                let label = format!("issue {} / {keyword:?}", issue.id);
                (label, self.search_issue(issue, keyword))
            })
        }).collect::<Vec<_>>();
        Ok(gather_isolated(units).await)
    }
}

#[async_trait]
impl Scraper for ReadwhereScraper {
    type Record = ReadwhereArticle;

    fn name(&self) -> &'static str {
        self.site.name
    }

    fn params(&self) -> &ScrapeParams {
        &self.params
    }

    fn csv_options(&self) -> CsvOptions {
        CsvOptions::new().include("url").exclude("base_url")
    }

    #[instrument(level = "info", skip_all, fields(scraper = self.site.name))]
    async fn scrape(&self) -> Result<Vec<ReadwhereArticle>, ScrapeError> {
        let units = self.site.editions.iter().map(|&(id, name)| {
            (format!("edition {id} ({name})"), self.search_edition(id, name))
        }).collect::<Vec<_>>();
        let articles = gather_isolated(units).await;

        let window = self.params.window;
        let articles: Vec<ReadwhereArticle> =
            dedup_by_key(articles, |a| (a.issue_id.clone(), a.title_id.clone()))
                .into_iter()
                .filter(|a| window.contains(a.published, Bounds::Inclusive))
                .collect();
        info!(count = articles.len(), "Scraped Readwhere articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::csv::columns;
    use chrono::TimeZone;

    fn issue() -> Issue {
        Issue {
            id: "9001".into(),
            published: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_parse_issues() {
        let issues = parse_issues(br#"[{"id": 9001, "published": 1704067200}, {"id": "9002", "published": "2024-01-02T00:00:00Z"}]"#).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0], issue());
        assert_eq!(issues[1].id, "9002");
    }

    #[test]
    fn test_parse_search_copies_issue_fields() {
        let body = br#"{
            "status": true,
            "numFound": 2,
            "data": [
                {"pageNum": "3", "excerpt": "a <strong>suicide</strong> note", "issue_id": "9001", "title_id": "t1"},
                {"excerpt": "missing ids"}
            ]
        }"#;
        let hits = parse_search(body, &issue(), TNIE.base_url).unwrap();
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.id, "9001");
        assert_eq!(hit.excerpt, "a suicide note");
        assert_eq!(hit.page_num.as_deref(), Some("3"));
        assert_eq!(hit.url(), "https://epaper.newindianexpress.com/9001");
    }

    #[test]
    fn test_parse_search_status_false_is_empty() {
        let hits = parse_search(br#"{"status": false}"#, &issue(), TIE.base_url).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_columns_swap_base_url_for_url() {
        let opts = CsvOptions::new().include("url").exclude("base_url");
        let cols = columns::<ReadwhereArticle>(&opts);
        assert!(cols.contains(&"url".to_string()));
        assert!(!cols.contains(&"base_url".to_string()));
        assert_eq!(cols.first().map(String::as_str), Some("id"));
    }

    #[test]
    fn test_sites_are_distinct() {
        let names = [TNIE.name, TRIBUNE.name, TIE.name];
        assert_eq!(names, ["TNIEScraper", "TribuneScraper", "TIEScraper"]);
        assert!(TNIE.editions.iter().any(|(id, _)| *id == "3353"));
    }
}
