//! Run-scoped lookup cache
//!
//! Series statistics from the series fulfillment service and child listings
//! from the media server are fetched at most once per key per run. A failed
//! or empty fetch is remembered as `None` so it is not repeated either.

use std::collections::HashMap;
use std::future::Future;

use super::sources::{FulfilledSeries, MediaServerChild};

/// Memo table owned by a single sync session
#[derive(Debug, Default)]
pub struct LookupCache {
    /// (fulfillment server id, external series id) -> series statistics
    series: HashMap<(i64, i64), Option<FulfilledSeries>>,
    /// media server rating key -> child listing
    children: HashMap<String, Option<Vec<MediaServerChild>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get series statistics, running `fetch` on first use of the key
    pub async fn series<F, Fut>(
        &mut self,
        server_id: i64,
        external_id: i64,
        fetch: F,
    ) -> Option<&FulfilledSeries>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<FulfilledSeries>>,
    {
        let key = (server_id, external_id);
        if !self.series.contains_key(&key) {
            let fetched = fetch().await;
            self.series.insert(key, fetched);
        }
        self.series.get(&key).and_then(Option::as_ref)
    }

    /// Get the media server child listing, running `fetch` on first use of the key
    pub async fn children<F, Fut>(&mut self, rating_key: &str, fetch: F) -> &[MediaServerChild]
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Vec<MediaServerChild>>>,
    {
        if !self.children.contains_key(rating_key) {
            let fetched = fetch().await;
            self.children.insert(rating_key.to_string(), fetched);
        }
        self.children
            .get(rating_key)
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    /// Number of distinct keys fetched so far
    pub fn len(&self) -> usize {
        self.series.len() + self.children.len()
    }
}
