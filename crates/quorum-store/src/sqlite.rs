use std::str::FromStr;

use chrono::NaiveDate;
use quorum_models::store_schema::{SeriesKind, SNAPSHOT_DDL};
use quorum_models::{FundamentalRecord, NewsItem, PriceBar};
use rusqlite::{Connection, OpenFlags};
use rust_decimal::Decimal;

use crate::error::StoreError;

/// SQLite access to the snapshot database.
///
/// Data acquisition writes the tables in [`SNAPSHOT_DDL`]; a pipeline run
/// opens the file read-only. Every `load_*` returns the full series for one
/// instrument in date order. As-of filtering is the snapshot's job.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a read-only connection to an existing snapshot database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open read-write, creating the schema if needed. Enables WAL mode.
    pub fn create(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SNAPSHOT_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Writable in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SNAPSHOT_DDL)?;
        Ok(Self { conn })
    }

    pub fn insert_price(&self, instrument_id: &str, bar: &PriceBar) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO prices \
             (instrument_id, date, open, high, low, close, volume) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                instrument_id,
                bar.date,
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                i64::try_from(bar.volume).unwrap_or(i64::MAX),
            ],
        )?;
        Ok(())
    }

    /// Insert a whole price series in one transaction.
    pub fn insert_prices(&mut self, instrument_id: &str, bars: &[PriceBar]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO prices \
                 (instrument_id, date, open, high, low, close, volume) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for bar in bars {
                stmt.execute(rusqlite::params![
                    instrument_id,
                    bar.date,
                    bar.open.to_string(),
                    bar.high.to_string(),
                    bar.low.to_string(),
                    bar.close.to_string(),
                    i64::try_from(bar.volume).unwrap_or(i64::MAX),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_news(&self, instrument_id: &str, item: &NewsItem) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO news (instrument_id, date, title, snippet, source) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![instrument_id, item.date, item.title, item.snippet, item.source],
        )?;
        Ok(())
    }

    pub fn insert_fundamentals(
        &self,
        instrument_id: &str,
        record: &FundamentalRecord,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO fundamentals \
             (instrument_id, period_end, report_date, sector, revenue_growth, \
              operating_margin, debt_to_equity, capex_intensity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                instrument_id,
                record.period_end,
                record.report_date,
                record.sector,
                record.revenue_growth,
                record.operating_margin,
                record.debt_to_equity,
                record.capex_intensity,
            ],
        )?;
        Ok(())
    }

    pub fn load_prices(&self, instrument_id: &str) -> Result<Vec<PriceBar>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT date, open, high, low, close, volume FROM prices \
             WHERE instrument_id = ?1 ORDER BY date",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![instrument_id], |row| {
                Ok((
                    row.get::<_, NaiveDate>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, open, high, low, close, volume)| {
                Ok(PriceBar {
                    date,
                    open: parse_decimal(instrument_id, "open", &open)?,
                    high: parse_decimal(instrument_id, "high", &high)?,
                    low: parse_decimal(instrument_id, "low", &low)?,
                    close: parse_decimal(instrument_id, "close", &close)?,
                    volume: u64::try_from(volume).unwrap_or(0),
                })
            })
            .collect()
    }

    pub fn load_news(&self, instrument_id: &str) -> Result<Vec<NewsItem>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT date, title, snippet, source FROM news \
             WHERE instrument_id = ?1 ORDER BY date, id",
        )?;

        let items = stmt
            .query_map(rusqlite::params![instrument_id], |row| {
                Ok(NewsItem {
                    date: row.get(0)?,
                    title: row.get(1)?,
                    snippet: row.get(2)?,
                    source: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn load_fundamentals(
        &self,
        instrument_id: &str,
    ) -> Result<Vec<FundamentalRecord>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT period_end, report_date, sector, revenue_growth, operating_margin, \
             debt_to_equity, capex_intensity FROM fundamentals \
             WHERE instrument_id = ?1 ORDER BY report_date, period_end",
        )?;

        let records = stmt
            .query_map(rusqlite::params![instrument_id], |row| {
                Ok(FundamentalRecord {
                    period_end: row.get(0)?,
                    report_date: row.get(1)?,
                    sector: row.get(2)?,
                    revenue_growth: row.get(3)?,
                    operating_margin: row.get(4)?,
                    debt_to_equity: row.get(5)?,
                    capex_intensity: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Row count of one table.
    pub fn count(&self, kind: SeriesKind) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn parse_decimal(instrument_id: &str, column: &'static str, value: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(value).map_err(|_| StoreError::Malformed {
        instrument_id: instrument_id.to_string(),
        column,
        value: value.to_string(),
    })
}
