//! Data model shared by every scraper.
//!
//! This module defines:
//! - [`Record`]: the contract each scraped entity type implements so the CSV
//!   pipeline can enumerate its columns and read them by name
//! - [`FieldValue`]: one cell, before rendering
//! - [`TimeWindow`] and [`Bounds`]: the publish-date filter every scraper
//!   is constructed with
//!
//! Instants are stored in UTC. Anything that becomes a calendar date (CSV
//! cells, window edges, file names) is read on the IST calendar, since that
//! is where every source publishes.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::error::WindowError;
use crate::utils::IST;

/// A single field value read off a record.
///
/// Rendering (via `Display`) is the only normalization the CSV pipeline does:
/// dates and datetimes become `YYYY-MM-DD` (datetimes on the IST calendar),
/// `Null` becomes an empty cell,
/// lists are joined with `", "`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    List(Vec<FieldValue>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.with_timezone(&*IST).format("%Y-%m-%d")),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<&String> for FieldValue {
    fn from(v: &String) -> Self {
        FieldValue::Text(v.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        FieldValue::DateTime(v.with_timezone(&Utc))
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Date(v)
    }
}

/// Naive timestamps from the sites are IST wall-clock times.
impl From<NaiveDateTime> for FieldValue {
    fn from(v: NaiveDateTime) -> Self {
        let instant = v
            .and_local_timezone(*IST)
            .single()
            .map_or_else(|| v.and_utc(), |dt| dt.with_timezone(&Utc));
        FieldValue::DateTime(instant)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// A scraped entity that can be written out as one CSV row.
///
/// `fields()` lists the stored fields in declaration order; it is the
/// natural column order. `field()` answers for stored *and* computed
/// fields. Returning `None` means the record has no such attribute at all,
/// which the CSV pipeline renders as a sentinel; a present-but-empty value
/// should be `Some(FieldValue::Null)`.
pub trait Record: Send + Sync + 'static {
    fn fields() -> &'static [&'static str];

    /// Authoritative, ordered column list. When present it replaces the
    /// natural fields and ignores include/exclude.
    fn allow_list() -> Option<&'static [&'static str]> {
        None
    }

    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// Which window edges count as "inside".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounds {
    /// `[start, end]`
    Inclusive,
    /// `(start, end)`
    Exclusive,
    /// `[start, end)`
    HalfOpen,
}

/// The `(start, end)` publish window a scraper filters by. `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>, bounds: Bounds) -> bool {
        match bounds {
            Bounds::Inclusive => self.start <= ts && ts <= self.end,
            Bounds::Exclusive => self.start < ts && ts < self.end,
            Bounds::HalfOpen => self.start <= ts && ts < self.end,
        }
    }

    /// IST calendar date of `start`.
    pub fn start_date(&self) -> NaiveDate {
        self.start.with_timezone(&*IST).date_naive()
    }

    /// IST calendar date of `end`.
    pub fn end_date(&self) -> NaiveDate {
        self.end.with_timezone(&*IST).date_naive()
    }

    /// Date-granular check, comparing against the IST calendar dates of the edges.
    pub fn contains_date(&self, date: NaiveDate, bounds: Bounds) -> bool {
        let (start, end) = (self.start_date(), self.end_date());
        match bounds {
            Bounds::Inclusive => start <= date && date <= end,
            Bounds::Exclusive => start < date && date < end,
            Bounds::HalfOpen => start <= date && date < end,
        }
    }

    /// Every calendar date from `start` to `end`, both included.
    pub fn days(&self) -> Vec<NaiveDate> {
        let end = self.end_date();
        self.start_date().iter_days().take_while(|d| *d <= end).collect()
    }

    /// True when both edges fall on the same calendar date.
    pub fn is_single_day(&self) -> bool {
        self.start_date() == self.end_date()
    }
}
