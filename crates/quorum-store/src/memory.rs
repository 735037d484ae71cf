use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use quorum_models::{FundamentalRecord, NewsItem, PriceBar};

/// A decoded series as held in the hot cache.
#[derive(Debug, Clone)]
pub enum CachedSeries {
    Prices(Arc<Vec<PriceBar>>),
    News(Arc<Vec<NewsItem>>),
    Fundamentals(Arc<Vec<FundamentalRecord>>),
}

/// Hot cache of decoded series, keyed by `store_schema::key_patterns`.
///
/// Repeated runs over the same universe (stability sweeps, A/B variants)
/// skip SQLite and row decoding entirely while an entry is live.
pub struct MemoryCache {
    inner: Cache<String, CachedSeries>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedSeries> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, series: CachedSeries) {
        self.inner.insert(key, series).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
