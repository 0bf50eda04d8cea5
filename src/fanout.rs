//! Building blocks for the per-source fan-out.
//!
//! Every scraper follows the same shape: discover partitions, run one task per
//! `(partition, keyword)`, paginate, merge, deduplicate, window-filter. The
//! helpers here implement the parts of that which do not depend on a site:
//!
//! - [`gather_isolated`]: run a batch of units concurrently; a failing unit is
//!   logged and contributes nothing, its siblings are unaffected
//! - [`remaining_pages`]: which extra pages a paginated search needs
//! - [`dedup_by_key`]: collapse records reached through several paths
//! - [`offload`]: push CPU-bound parsing onto the blocking pool

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::ops::Range;

use futures::stream::{FuturesUnordered, StreamExt};
use itertools::Itertools;
use tracing::{debug, error};

use crate::error::ScrapeError;

/// Await every unit, keeping the output of the ones that succeed.
///
/// Each unit is `(label, future)`; the label only shows up in logs. Units are
/// polled together on the current task, so the HTTP gate is the only thing
/// bounding how many are actually waiting on the network.
pub async fn gather_isolated<L, Fut, I, T, E>(units: impl IntoIterator<Item = (L, Fut)>) -> Vec<T>
where
    L: Display,
    Fut: Future<Output = Result<I, E>>,
    I: IntoIterator<Item = T>,
    E: Display,
{
    let mut pending: FuturesUnordered<_> = units
        .into_iter()
        .map(|(label, fut)| async move { (label, fut.await) })
        .collect();

    let total = pending.len();
    let mut failed = 0usize;
    let mut out = Vec::new();
    while let Some((label, result)) = pending.next().await {
        match result {
            Ok(items) => out.extend(items),
            Err(e) => {
                failed += 1;
                error!(unit = %label, error = %e, "Unit failed; dropping its results");
            }
        }
    }
    debug!(total, failed, items = out.len(), "Gathered units");
    out
}

/// Page numbers still to fetch after `first_page`, for `total` results
/// served `page_size` at a time.
///
/// ```ignore
/// assert_eq!(remaining_pages(120, 50, 1), 2..4); // pages 2 and 3
/// assert_eq!(remaining_pages(7, 20, 0), 1..1);   // nothing left
/// ```
pub fn remaining_pages(total: usize, page_size: usize, first_page: u32) -> Range<u32> {
    let page_size = page_size.max(1);
    let needed = total.div_ceil(page_size).max(1);
    let last = first_page.saturating_add(u32::try_from(needed).unwrap_or(u32::MAX));
    first_page.saturating_add(1)..last
}

/// Keep the first record seen for every key.
pub fn dedup_by_key<T, K, F>(records: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let before = records.len();
    let unique: Vec<T> = records.into_iter().unique_by(key).collect();
    if unique.len() != before {
        debug!(before, after = unique.len(), "Dropped duplicate records");
    }
    unique
}

/// Incremental form of [`dedup_by_key`], for when records arrive in batches.
#[derive(Debug)]
pub struct Seen<K> {
    keys: HashSet<K>,
}

impl<K: Eq + Hash> Default for Seen<K> {
    fn default() -> Self {
        Self {
            keys: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash> Seen<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `key` is offered.
    pub fn first(&mut self, key: K) -> bool {
        self.keys.insert(key)
    }
}

/// Run a CPU-bound closure on the blocking thread pool.
pub async fn offload<F, T>(f: F) -> Result<T, ScrapeError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;

    #[test]
    fn test_remaining_pages() {
        assert_eq!(remaining_pages(120, 50, 1), 2..4);
        assert_eq!(remaining_pages(100, 50, 1), 2..3);
        assert_eq!(remaining_pages(5, 3, 1), 2..3);
        assert_eq!(remaining_pages(0, 50, 1), 2..2);
        assert_eq!(remaining_pages(45, 20, 0), 1..3);
        assert!(remaining_pages(7, 20, 0).is_empty());
        assert!(remaining_pages(3, 0, 1).contains(&3));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let items = vec![(1, "a"), (2, "b"), (1, "c"), (3, "d"), (2, "e")];
        let unique = dedup_by_key(items, |(id, _)| *id);
        assert_eq!(unique, vec![(1, "a"), (2, "b"), (3, "d")]);
    }

    #[test]
    fn test_seen() {
        let mut seen = Seen::new();
        assert!(seen.first("x"));
        assert!(!seen.first("x"));
        assert!(seen.first("y"));
    }

    #[tokio::test]
    async fn test_gather_isolates_failures() {
        let units = (1..=5).map(|p| {
            let fut = async move {
                if p == 3 {
                    Err(HttpError::Unavailable {
                        url: format!("partition-{p}"),
                        reason: "boom".into(),
                    })
                } else {
                    Ok(vec![p * 10, p * 10 + 1])
                }
            };
            (format!("partition {p}"), fut)
        });

        let mut out = gather_isolated(units).await;
        out.sort();
        assert_eq!(out, vec![10, 11, 20, 21, 40, 41, 50, 51]);
    }

    #[tokio::test]
    async fn test_gather_accepts_optional_units() {
        let units = vec![
            ("a", futures::FutureExt::boxed(async { Ok::<_, HttpError>(Some(1)) })),
            ("b", futures::FutureExt::boxed(async { Ok::<_, HttpError>(None) })),
        ];
        assert_eq!(gather_isolated(units).await, vec![1]);
    }

    #[tokio::test]
    async fn test_offload_returns_value() {
        let n = offload(|| (1..=10).sum::<u32>()).await.unwrap();
        assert_eq!(n, 55);
    }
}
