//! E-paper portals: digital replicas of the printed editions.

pub mod ht;
pub mod readwhere;
pub mod telegraph;
pub mod toi;
