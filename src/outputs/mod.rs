//! Everything after `scrape()`: serialization, the output artifact, storage.
//!
//! # Submodules
//!
//! - [`csv`]: turns a list of records into a CSV buffer
//! - [`file`]: the origin-tagged file handed to storage, and its naming
//! - [`storage`]: backends that persist a file
//!
//! # Output Structure
//!
//! ```text
//! out/
//! └── {folder}/
//!     ├── TOIScraper_2024-01-01_2024-02-26.csv
//!     ├── HTScraper_2024-01-01_2024-02-26.csv
//!     └── copy-HTScraper_2024-01-01_2024-02-26.csv   # second run, same window
//! ```

pub mod csv;
pub mod file;
pub mod storage;
