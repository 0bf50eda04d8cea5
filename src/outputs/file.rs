//! The hand-off artifact between a scraper run and a storage backend.

use std::io::Cursor;

use chrono::NaiveDate;

use crate::models::TimeWindow;

/// Serialized output of one scraper run, tagged with the scraper that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginFile {
    data: Vec<u8>,
    name: String,
    origin: String,
    mimetype: &'static str,
}

impl OriginFile {
    pub fn new(data: Vec<u8>, name: impl Into<String>, origin: impl Into<String>) -> Self {
        let name = name.into();
        let mimetype = guess_mimetype(&name);
        Self {
            data,
            name,
            origin: origin.into(),
            mimetype,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn mimetype(&self) -> &'static str {
        self.mimetype
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// A fresh reader over the contents, positioned at the start.
    pub fn buffer(&self) -> Cursor<&[u8]> {
        Cursor::new(self.data.as_slice())
    }
}

fn guess_mimetype(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "csv" => "text/csv",
        Some(ext) if ext == "json" => "application/json",
        Some(ext) if ext == "txt" => "text/plain",
        _ => "application/pdf",
    }
}

/// `{origin}_{date}.csv` for a single-day window, `{origin}_{start}_{end}.csv`
/// otherwise. Dates are on the IST calendar.
pub fn csv_file_name(origin: &str, window: &TimeWindow) -> String {
    let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
    if window.is_single_day() {
        format!("{}_{}.csv", origin, fmt(window.start_date()))
    } else {
        format!("{}_{}_{}.csv", origin, fmt(window.start_date()), fmt(window.end_date()))
    }
}
