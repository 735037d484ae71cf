//! Immutable per-run input snapshot.
//!
//! Agents must read through the `*_through(as_of)` accessors, which never
//! expose a record dated after the as-of date. Only the backtest reads the
//! unfiltered series via [`MarketSnapshot::price_series`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A member of the rating universe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instrument {
    pub id: String,
    #[serde(default = "default_sector")]
    pub sector: String,
}

fn default_sector() -> String {
    "default".to_string()
}

impl Instrument {
    pub fn new(id: &str, sector: &str) -> Self {
        Self {
            id: id.to_string(),
            sector: sector.to_string(),
        }
    }
}

/// Daily OHLCV bar, already validated for OHLC consistency upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl PriceBar {
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub date: NaiveDate,
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl NewsItem {
    /// Text fed to the sentiment analyzer.
    pub fn text(&self) -> String {
        format!("{}. {}", self.title.trim(), self.snippet.trim())
    }
}

/// Quarterly fundamentals. `report_date` is when the figures became public
/// and is the date checked against the as-of boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundamentalRecord {
    pub period_end: NaiveDate,
    pub report_date: NaiveDate,
    pub sector: String,
    pub revenue_growth: Option<f64>,
    pub operating_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub capex_intensity: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub universe: Vec<Instrument>,
    prices: BTreeMap<String, Vec<PriceBar>>,
    news: BTreeMap<String, Vec<NewsItem>>,
    fundamentals: BTreeMap<String, Vec<FundamentalRecord>>,
}

impl MarketSnapshot {
    /// Build a snapshot; every series is sorted by date.
    pub fn new(
        universe: Vec<Instrument>,
        mut prices: BTreeMap<String, Vec<PriceBar>>,
        mut news: BTreeMap<String, Vec<NewsItem>>,
        mut fundamentals: BTreeMap<String, Vec<FundamentalRecord>>,
    ) -> Self {
        for bars in prices.values_mut() {
            bars.sort_by_key(|b| b.date);
            bars.dedup_by_key(|b| b.date);
        }
        for items in news.values_mut() {
            items.sort_by_key(|n| n.date);
        }
        for records in fundamentals.values_mut() {
            records.sort_by_key(|f| (f.report_date, f.period_end));
        }
        Self {
            universe,
            prices,
            news,
            fundamentals,
        }
    }

    pub fn instrument_ids(&self) -> impl Iterator<Item = &str> {
        self.universe.iter().map(|i| i.id.as_str())
    }

    pub fn sector_of(&self, instrument_id: &str) -> Option<&str> {
        self.universe
            .iter()
            .find(|i| i.id == instrument_id)
            .map(|i| i.sector.as_str())
    }

    /// Bars dated on or before `as_of`.
    pub fn prices_through(&self, instrument_id: &str, as_of: NaiveDate) -> &[PriceBar] {
        match self.prices.get(instrument_id) {
            Some(bars) => {
                let end = bars.partition_point(|b| b.date <= as_of);
                &bars[..end]
            }
            None => &[],
        }
    }

    pub fn closes_through(&self, instrument_id: &str, as_of: NaiveDate) -> Vec<f64> {
        self.prices_through(instrument_id, as_of)
            .iter()
            .map(PriceBar::close_f64)
            .collect()
    }

    /// News published on or before `as_of`.
    pub fn news_through(
        &self,
        instrument_id: &str,
        as_of: NaiveDate,
    ) -> impl Iterator<Item = &NewsItem> {
        self.news
            .get(instrument_id)
            .into_iter()
            .flatten()
            .filter(move |n| n.date <= as_of)
    }

    /// Most recent fundamentals reported on or before `as_of`.
    pub fn fundamentals_through(
        &self,
        instrument_id: &str,
        as_of: NaiveDate,
    ) -> Option<&FundamentalRecord> {
        self.fundamentals
            .get(instrument_id)?
            .iter()
            .rev()
            .find(|f| f.report_date <= as_of)
    }

    /// Full, unfiltered price series. Reserved for forward-return evaluation.
    pub fn price_series(&self, instrument_id: &str) -> &[PriceBar] {
        self.prices
            .get(instrument_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Latest bar dated on or before `date` in a sorted series.
pub fn bar_on_or_before(bars: &[PriceBar], date: NaiveDate) -> Option<&PriceBar> {
    let end = bars.partition_point(|b| b.date <= date);
    end.checked_sub(1).map(|i| &bars[i])
}
