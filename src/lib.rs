//! # siren
//!
//! Scrapes Indian newspaper e-paper portals and news sites for articles that
//! match a keyword list inside a date window, and exports each source's
//! matches as one CSV file.
//!
//! ## Architecture
//!
//! 1. **Construction**: every scraper gets the same [`base::ScrapeParams`]
//!    (window, keywords, concurrency-limited [`http::Http`] handle)
//! 2. **Scrape**: the source fans out over its partitions, pages and hits,
//!    isolating failures per unit ([`fanout`])
//! 3. **Serialize**: records become a CSV buffer ([`outputs::csv`]) wrapped in
//!    an origin-tagged file ([`outputs::file`])
//! 4. **Store**: the runner hands the file to a [`outputs::storage::Storage`]
//!    backend; one source's failure never stops the others ([`runner`])

pub mod base;
pub mod cli;
pub mod config;
pub mod error;
pub mod fanout;
pub mod http;
pub mod models;
pub mod outputs;
pub mod registry;
pub mod runner;
pub mod scrapers;
pub mod utils;
