//! Name → constructor table for every scraper the binary can run.

use crate::base::{ScrapeParams, Source};
use crate::error::ScrapeError;
use crate::scrapers::dummy::DummyScraper;
use crate::scrapers::epaper::ht::HTScraper;
use crate::scrapers::epaper::readwhere::ReadwhereScraper;
use crate::scrapers::epaper::telegraph::TGScraper;
use crate::scrapers::epaper::toi::TOIScraper;
use crate::scrapers::online::indiatoday::IndiaTodayOnlineScraper;
use crate::scrapers::online::mirror::MirrorOnlineScraper;
use crate::scrapers::online::telegraph::TelegraphOnlineScraper;

pub type Constructor = fn(ScrapeParams) -> Box<dyn Source>;

/// Every registered scraper, in the order `run_all` starts them.
pub static SCRAPERS: &[(&str, Constructor)] = &[
    ("epaper.toi", |p| Box::new(TOIScraper::new(p))),
    ("epaper.ht", |p| Box::new(HTScraper::new(p))),
    ("epaper.readwhere.tnie", |p| Box::new(ReadwhereScraper::tnie(p))),
    ("epaper.readwhere.tribune", |p| Box::new(ReadwhereScraper::tribune(p))),
    ("epaper.readwhere.tie", |p| Box::new(ReadwhereScraper::tie(p))),
    ("epaper.telegraph", |p| Box::new(TGScraper::new(p))),
    ("online.telegraph", |p| Box::new(TelegraphOnlineScraper::new(p))),
    ("online.indiatoday", |p| Box::new(IndiaTodayOnlineScraper::new(p))),
    ("online.mirror.mumbai", |p| Box::new(MirrorOnlineScraper::mumbai(p))),
    ("online.mirror.bangalore", |p| Box::new(MirrorOnlineScraper::bangalore(p))),
    ("dummy", |p| Box::new(DummyScraper::new(p))),
];

pub fn names() -> impl Iterator<Item = &'static str> {
    SCRAPERS.iter().map(|(name, _)| *name)
}

pub fn lookup(name: &str) -> Option<Constructor> {
    SCRAPERS.iter().find(|(n, _)| *n == name).map(|(_, ctor)| *ctor)
}

/// Construct the scraper registered as `name`.
pub fn build(name: &str, params: ScrapeParams) -> Result<Box<dyn Source>, ScrapeError> {
    let ctor = lookup(name).ok_or_else(|| ScrapeError::UnknownScraper(name.to_string()))?;
    Ok(ctor(params))
}
