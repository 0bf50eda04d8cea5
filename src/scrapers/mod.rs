//! Source-specific scrapers.
//!
//! Every scraper is one concrete type holding its [`ScrapeParams`] plus the
//! static data its site needs (base URL, edition table). They all follow the
//! same fan-out shape, built from the helpers in [`crate::fanout`]:
//!
//! 1. **Partitions**: discover what can be searched independently (editions,
//!    issues, day buckets, keywords)
//! 2. **Search**: one concurrent task per `(partition, keyword)`, paginated
//!    where the site reports a total
//! 3. **Enrich**: fetch each hit's full article
//! 4. **Merge**: deduplicate on a per-source identity key, then window-filter
//!
//! A failing page, record or partition is logged and dropped; only an error
//! the scraper cannot work around escapes `scrape()`.
//!
//! # Supported Sources
//!
//! | Registry name | Type | Method | Identity key | Window |
//! |---------------|------|--------|--------------|--------|
//! | `epaper.toi` | [`epaper::toi::TOIScraper`] | JSON search API | `article_id` | inclusive |
//! | `epaper.ht` | [`epaper::ht::HTScraper`] | HTML search + JSON article | headline | inclusive |
//! | `epaper.readwhere.*` | [`epaper::readwhere::ReadwhereScraper`] | JSON issue search | `(issue_id, title_id)` | inclusive |
//! | `epaper.telegraph` | [`epaper::telegraph::TGScraper`] | HTML pages + text view | text view URL | inclusive |
//! | `online.telegraph` | [`online::telegraph::TelegraphOnlineScraper`] | HTML search | URL | exclusive |
//! | `online.indiatoday` | [`online::indiatoday::IndiaTodayOnlineScraper`] | JSON search + HTML | URL | half-open |
//! | `online.mirror.*` | [`online::mirror::MirrorOnlineScraper`] | HTML search + JSON-LD | URL | exclusive |
//! | `dummy` | [`dummy::DummyScraper`] | none | none | none |
//!
//! [`ScrapeParams`]: crate::base::ScrapeParams

pub mod dummy;
pub mod epaper;
pub mod online;
