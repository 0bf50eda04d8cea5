//! News websites, searched through their public site search.

pub mod indiatoday;
pub mod mirror;
pub mod telegraph;
