//! Record list to CSV.
//!
//! A pure synchronous transform; no scraper or network is involved, so it can
//! be used and tested on its own.
//!
//! # Column resolution
//!
//! 1. If the record type declares an allow-list, it is used verbatim and
//!    `include` / `exclude` are ignored.
//! 2. Otherwise: natural fields in declaration order, then any extra
//!    `include` names, with every `exclude` name removed.
//!
//! Headers go through `aliases`. A column the record cannot answer for is
//! written as [`MISSING`].

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;

use tracing::{debug, instrument};

use crate::error::CsvError;
use crate::models::Record;

/// Cell text for an attribute the record does not have.
pub const MISSING: &str = "- no data -";

/// Field inclusion, exclusion and header aliasing.
#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
    pub aliases: HashMap<String, String>,
}

impl CsvOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.include.insert(field.into());
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.exclude.insert(field.into());
        self
    }

    pub fn alias(mut self, field: impl Into<String>, header: impl Into<String>) -> Self {
        self.aliases.insert(field.into(), header.into());
        self
    }
}

/// The ordered column names for `R` under `opts`.
pub fn columns<R: Record>(opts: &CsvOptions) -> Vec<String> {
    if let Some(allowed) = R::allow_list() {
        return allowed.iter().map(|f| f.to_string()).collect();
    }

    let mut cols: Vec<String> = R::fields().iter().map(|f| f.to_string()).collect();
    for extra in &opts.include {
        if !cols.contains(extra) {
            cols.push(extra.clone());
        }
    }
    cols.retain(|c| !opts.exclude.contains(c));
    cols
}

/// Serialize `records` into an in-memory CSV buffer positioned at its start.
///
/// An empty slice gives an empty buffer: no header, no error.
#[instrument(level = "debug", skip_all, fields(records = records.len()))]
pub fn to_csv<R: Record>(records: &[R], opts: &CsvOptions) -> Result<Cursor<Vec<u8>>, CsvError> {
    if records.is_empty() {
        debug!("No records; writing empty CSV");
        return Ok(Cursor::new(Vec::new()));
    }

    let cols = columns::<R>(opts);
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(cols.iter().map(|c| opts.aliases.get(c).unwrap_or(c)))?;

    for record in records {
        let row = cols.iter().map(|c| match record.field(c) {
            Some(value) => value.to_string(),
            None => MISSING.to_string(),
        });
        writer.write_record(row)?;
    }

    let buffer = writer.into_inner().map_err(|e| e.into_error())?;
    debug!(columns = cols.len(), bytes = buffer.len(), "CSV written");
    Ok(Cursor::new(buffer))
}
