//! Time based revalidation of the public pages
//!
//! Public reads are served from memory for up to the revalidation window, then fetched
//! again on the next request. Failed fetches are never cached, so the next request
//! retries right away. Unknown slugs are not remembered, and expired entries are
//! dropped whenever a new one is stored. Admin writes do not invalidate entries: a
//! change shows up on the public pages within one window.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;

use crate::models::CaseStudy;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FreshnessKey {
    /// Every case study, for the home page
    List,
    /// The case study at a slug. Holds one element at most.
    Detail(String),
    /// Related candidates of the case study at a slug
    Related(String),
}

#[derive(Debug)]
struct Entry {
    fetched_at: Instant,
    value: Arc<Vec<CaseStudy>>,
}

#[derive(Debug)]
pub struct FreshnessCache {
    revalidate: Duration,
    entries: DashMap<FreshnessKey, Entry>,
}

impl FreshnessCache {
    pub fn new(revalidate: Duration) -> Self {
        Self {
            revalidate,
            entries: DashMap::new(),
        }
    }

    fn fresh(&self, key: &FreshnessKey) -> Option<Arc<Vec<CaseStudy>>> {
        let entry = self.entries.get(key)?;
        (entry.fetched_at.elapsed() < self.revalidate).then(|| entry.value.clone())
    }

    /// Returns the cached value of `key` if still fresh, calls `fetch` otherwise
    ///
    /// Concurrent misses on the same key may each call `fetch`; the last one wins.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: FreshnessKey,
        fetch: F,
    ) -> Result<Arc<Vec<CaseStudy>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<CaseStudy>, E>>,
    {
        if let Some(value) = self.fresh(&key) {
            tracing::debug!(?key, "serving cached case studies");
            return Ok(value);
        }
        let value = Arc::new(fetch().await?);
        let not_found = matches!(key, FreshnessKey::Detail(_)) && value.is_empty();
        if !self.revalidate.is_zero() && !not_found {
            self.entries
                .retain(|_, entry| entry.fetched_at.elapsed() < self.revalidate);
            self.entries.insert(
                key,
                Entry {
                    fetched_at: Instant::now(),
                    value: value.clone(),
                },
            );
        }
        Ok(value)
    }
}
