use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quorum_models::store_schema::{key_patterns, SeriesKind};
use quorum_models::{FundamentalRecord, Instrument, MarketSnapshot, NewsItem, PriceBar};
use tracing::debug;

use crate::error::StoreError;
use crate::memory::{CachedSeries, MemoryCache};
use crate::sqlite::SqliteStore;

/// Read-through store: moka (hot) → SQLite.
///
/// SQLite hits are decoded once and promoted to moka. SQLite access is
/// serialized through a `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct SnapshotReader {
    memory: MemoryCache,
    sqlite: Mutex<SqliteStore>,
}

impl SnapshotReader {
    pub fn new(sqlite: SqliteStore, max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, memory_ttl),
            sqlite: Mutex::new(sqlite),
        }
    }

    pub async fn prices(&self, instrument_id: &str) -> Result<Arc<Vec<PriceBar>>, StoreError> {
        match self.series(SeriesKind::Prices, instrument_id).await? {
            CachedSeries::Prices(bars) => Ok(bars),
            _ => Err(mismatch(SeriesKind::Prices, instrument_id)),
        }
    }

    pub async fn news(&self, instrument_id: &str) -> Result<Arc<Vec<NewsItem>>, StoreError> {
        match self.series(SeriesKind::News, instrument_id).await? {
            CachedSeries::News(items) => Ok(items),
            _ => Err(mismatch(SeriesKind::News, instrument_id)),
        }
    }

    pub async fn fundamentals(
        &self,
        instrument_id: &str,
    ) -> Result<Arc<Vec<FundamentalRecord>>, StoreError> {
        match self.series(SeriesKind::Fundamentals, instrument_id).await? {
            CachedSeries::Fundamentals(records) => Ok(records),
            _ => Err(mismatch(SeriesKind::Fundamentals, instrument_id)),
        }
    }

    /// Assemble the immutable input for one run. Instruments with no rows
    /// simply have empty series; the agents report them.
    pub async fn load_snapshot(&self, universe: &[Instrument]) -> Result<MarketSnapshot, StoreError> {
        let mut prices = BTreeMap::new();
        let mut news = BTreeMap::new();
        let mut fundamentals = BTreeMap::new();

        for instrument in universe {
            let id = instrument.id.as_str();
            prices.insert(id.to_string(), self.prices(id).await?.as_ref().clone());
            news.insert(id.to_string(), self.news(id).await?.as_ref().clone());
            fundamentals.insert(id.to_string(), self.fundamentals(id).await?.as_ref().clone());
        }

        debug!(
            instruments = universe.len(),
            hot_entries = self.hot_cache_size(),
            "Snapshot loaded"
        );

        Ok(MarketSnapshot::new(
            universe.to_vec(),
            prices,
            news,
            fundamentals,
        ))
    }

    /// Number of series held in the hot moka cache.
    pub fn hot_cache_size(&self) -> u64 {
        self.memory.entry_count()
    }

    async fn series(&self, kind: SeriesKind, instrument_id: &str) -> Result<CachedSeries, StoreError> {
        let key = key_patterns::series(kind, instrument_id);
        if let Some(series) = self.memory.get(&key).await {
            return Ok(series);
        }

        let series = {
            let sqlite = self
                .sqlite
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
            match kind {
                SeriesKind::Prices => CachedSeries::Prices(Arc::new(sqlite.load_prices(instrument_id)?)),
                SeriesKind::News => CachedSeries::News(Arc::new(sqlite.load_news(instrument_id)?)),
                SeriesKind::Fundamentals => {
                    CachedSeries::Fundamentals(Arc::new(sqlite.load_fundamentals(instrument_id)?))
                }
            }
        };

        self.memory.insert(key, series.clone()).await;
        Ok(series)
    }
}

fn mismatch(kind: SeriesKind, instrument_id: &str) -> StoreError {
    StoreError::Unavailable(format!(
        "hot cache entry {} holds the wrong series kind",
        key_patterns::series(kind, instrument_id)
    ))
}
