use serde::{Deserialize, Serialize};

/// Series kinds held in the snapshot store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Prices,
    News,
    Fundamentals,
}

impl SeriesKind {
    pub fn table(self) -> &'static str {
        match self {
            SeriesKind::Prices => "prices",
            SeriesKind::News => "news",
            SeriesKind::Fundamentals => "fundamentals",
        }
    }
}

/// Tables the data-acquisition side writes and the pipeline reads.
///
/// Prices are stored as decimal strings so no precision is lost before the
/// agents convert to `f64`. Dates are ISO-8601 (`YYYY-MM-DD`).
pub const SNAPSHOT_DDL: &str = "\
CREATE TABLE IF NOT EXISTS prices (
    instrument_id TEXT NOT NULL,
    date          TEXT NOT NULL,
    open          TEXT NOT NULL,
    high          TEXT NOT NULL,
    low           TEXT NOT NULL,
    close         TEXT NOT NULL,
    volume        INTEGER NOT NULL,
    PRIMARY KEY (instrument_id, date)
);
CREATE TABLE IF NOT EXISTS news (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    instrument_id TEXT NOT NULL,
    date          TEXT NOT NULL,
    title         TEXT NOT NULL,
    snippet       TEXT NOT NULL,
    source        TEXT
);
CREATE TABLE IF NOT EXISTS fundamentals (
    instrument_id    TEXT NOT NULL,
    period_end       TEXT NOT NULL,
    report_date      TEXT NOT NULL,
    sector           TEXT NOT NULL,
    revenue_growth   REAL,
    operating_margin REAL,
    debt_to_equity   REAL,
    capex_intensity  REAL,
    PRIMARY KEY (instrument_id, period_end)
);
CREATE INDEX IF NOT EXISTS idx_news_instrument ON news(instrument_id, date);
CREATE INDEX IF NOT EXISTS idx_fundamentals_report ON fundamentals(instrument_id, report_date);
";

/// In-memory cache key conventions.
///
/// - Price series: `prices:{instrument}` (e.g., `prices:AAPL`)
/// - News series: `news:{instrument}`
/// - Fundamentals history: `fundamentals:{instrument}`
pub mod key_patterns {
    use super::SeriesKind;

    pub fn series(kind: SeriesKind, instrument_id: &str) -> String {
        format!("{}:{instrument_id}", kind.table())
    }

    pub fn prices(instrument_id: &str) -> String {
        series(SeriesKind::Prices, instrument_id)
    }

    pub fn news(instrument_id: &str) -> String {
        series(SeriesKind::News, instrument_id)
    }

    pub fn fundamentals(instrument_id: &str) -> String {
        series(SeriesKind::Fundamentals, instrument_id)
    }
}
