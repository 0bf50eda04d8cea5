//! Small helpers shared by the scrapers and the binary.
//!
//! - String truncation for logging
//! - Lenient date parsing for the formats the sites return
//! - HTML text extraction helpers on top of `scraper`
//! - File system validation for the output directory

use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

use crate::error::StorageError;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

/// India Standard Time, which every source in this crate publishes in.
pub static IST: Lazy<FixedOffset> =
    Lazy::new(|| FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("valid IST offset"));

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with a
/// `"…(+N bytes)"` suffix.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Parse the datetime shapes the JSON APIs hand back.
///
/// Accepts unix seconds (as a string), RFC 3339, `YYYY-MM-DD HH:MM:SS` and
/// plain `YYYY-MM-DD`. Naive values are taken as IST.
pub fn parse_flexible_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })?;
    IST.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Remove inline markup such as the `<strong>` highlight search APIs wrap
/// around matches.
pub fn strip_tags(s: &str) -> String {
    TAG.replace_all(s, "").into_owned()
}

/// All text beneath `element`, trimmed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolve an `href` found on `base` into an absolute URL.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(String::from)
}

/// `deserialize_with` helpers for loosely-typed JSON payloads.
pub mod de {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Str(String),
    }

    impl Scalar {
        fn into_string(self) -> String {
            match self {
                Scalar::Int(n) => n.to_string(),
                Scalar::Float(x) => x.trunc().to_string(),
                Scalar::Str(s) => s,
            }
        }
    }

    /// A timestamp given as unix seconds, RFC 3339 or a naive IST string.
    pub fn flexible_datetime<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = Scalar::deserialize(d)?.into_string();
        super::parse_flexible_datetime(&raw)
            .ok_or_else(|| D::Error::custom(format!("unrecognized datetime {raw:?}")))
    }

    pub fn opt_flexible_datetime<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<Scalar>::deserialize(d)? {
            None => Ok(None),
            Some(s) => {
                let raw = s.into_string();
                super::parse_flexible_datetime(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("unrecognized datetime {raw:?}")))
            }
        }
    }

    /// Ids that some endpoints send as numbers and others as strings.
    pub fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Scalar::deserialize(d)?.into_string())
    }

    pub fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Scalar>::deserialize(d)?.map(Scalar::into_string))
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then writes and removes a
/// scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), StorageError> {
    let io = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).await.map_err(io)?;
    let scratch = path.join("..__write_check__");
    fs::write(&scratch, b"").await.map_err(io)?;
    let _ = fs::remove_file(&scratch).await;
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "आत्महत्या".repeat(10);
        let result = truncate_for_log(&s, 4);
        assert!(result.starts_with("आ"));
    }

    #[test]
    fn test_parse_flexible_datetime() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_flexible_datetime("1704067200"), Some(expected));
        assert_eq!(parse_flexible_datetime("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(
            parse_flexible_datetime("2024-01-01 05:30:00"),
            Some(expected),
            "naive times are IST"
        );
        assert_eq!(
            parse_flexible_datetime("2024-01-01"),
            Some(expected - chrono::Duration::minutes(330))
        );
        assert_eq!(parse_flexible_datetime("yesterday"), None);
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("a <strong>suicide</strong> note"),
            "a suicide note"
        );
    }

    #[test]
    fn test_absolute_url() {
        let base = "https://www.telegraphindia.com/search";
        assert_eq!(
            absolute_url(base, "/india/story/cid/1").as_deref(),
            Some("https://www.telegraphindia.com/india/story/cid/1")
        );
        assert_eq!(
            absolute_url(base, "https://example.com/a").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(absolute_url("not a url", "/x"), None);
    }

    #[test]
    fn test_element_text() {
        let doc = Html::parse_fragment("<p> one <b>two</b> </p>");
        let sel = Selector::parse("p").unwrap();
        let p = doc.select(&sel).next().unwrap();
        assert_eq!(element_text(p), "one two");
    }

    #[test]
    fn test_de_helpers() {
        #[derive(serde::Deserialize)]
        struct Row {
            #[serde(deserialize_with = "de::string_or_number")]
            id: String,
            #[serde(default, deserialize_with = "de::opt_string_or_number")]
            page: Option<String>,
            #[serde(deserialize_with = "de::flexible_datetime")]
            at: DateTime<Utc>,
        }

        let row: Row = serde_json::from_str(r#"{"id": 42, "at": 1704067200}"#).unwrap();
        assert_eq!(row.id, "42");
        assert_eq!(row.page, None);
        assert_eq!(row.at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let row: Row =
            serde_json::from_str(r#"{"id": "a1", "page": 3, "at": "2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(row.page.as_deref(), Some("3"));

        assert!(serde_json::from_str::<Row>(r#"{"id": 1, "at": "soon"}"#).is_err());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let dir = std::env::temp_dir().join(format!("siren-utils-{}", std::process::id()));
        let nested = dir.join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
