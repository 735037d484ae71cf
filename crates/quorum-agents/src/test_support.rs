//! Fixtures shared by unit and integration tests.
//!
//! `SnapshotBuilder` assembles synthetic markets relative to a fixed as-of
//! date. `FixedAgent` and `PanickingAgent` stand in for the production agents
//! when a test needs to pin the labels or exercise failure handling.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use quorum_models::{
    AgentKind, CoordinatorDecision, FundamentalRecord, Instrument, MarketSnapshot, NewsItem,
    PriceBar, Rating, RatingLabel,
};

use crate::agent::{AgentOutput, ScoringAgent};

/// Default as-of date for fixtures (a Friday).
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

pub fn rating(instrument_id: &str, agent: AgentKind, label: RatingLabel, score: f64) -> Rating {
    Rating {
        instrument_id: instrument_id.to_string(),
        agent,
        label,
        score,
        rationale: "fixture".to_string(),
        as_of_date: as_of(),
        degraded: false,
    }
}

/// Fundamentals with every metric present. Dates and sector are set by
/// [`SnapshotBuilder::fundamentals`].
pub fn metrics(growth: f64, margin: f64, debt_to_equity: f64, capex: f64) -> FundamentalRecord {
    FundamentalRecord {
        period_end: as_of(),
        report_date: as_of(),
        sector: "default".to_string(),
        revenue_growth: Some(growth),
        operating_margin: Some(margin),
        debt_to_equity: Some(debt_to_equity),
        capex_intensity: Some(capex),
    }
}

/// A bare decision carrying only the final label.
pub fn decision(instrument_id: &str, label: RatingLabel) -> CoordinatorDecision {
    CoordinatorDecision {
        instrument_id: instrument_id.to_string(),
        component_ratings: vec![],
        weights_used: BTreeMap::new(),
        numeric_coordinate: label.coordinate(),
        final_label: label,
        debate_applied: false,
        missing_agents: vec![],
        degraded: false,
        rationale: "fixture".to_string(),
    }
}

fn bar(date: NaiveDate, close: f64) -> PriceBar {
    let close = Decimal::from_f64_retain(close)
        .unwrap_or_default()
        .round_dp(8);
    PriceBar {
        date,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000_000,
    }
}

/// Deterministic ±0.5% wiggle so trending series have non-zero volatility.
/// The pattern is identical for every instrument.
fn noise(t: usize) -> f64 {
    (((t * 7919) % 13) as f64 / 13.0 - 0.5) * 0.01
}

pub struct SnapshotBuilder {
    as_of: NaiveDate,
    universe: Vec<Instrument>,
    prices: BTreeMap<String, Vec<PriceBar>>,
    news: BTreeMap<String, Vec<NewsItem>>,
    fundamentals: BTreeMap<String, Vec<FundamentalRecord>>,
}

impl SnapshotBuilder {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            universe: Vec::new(),
            prices: BTreeMap::new(),
            news: BTreeMap::new(),
            fundamentals: BTreeMap::new(),
        }
    }

    /// Add an instrument to the universe. No-op if already present.
    pub fn instrument(mut self, id: &str, sector: &str) -> Self {
        if !self.universe.iter().any(|i| i.id == id) {
            self.universe.push(Instrument::new(id, sector));
        }
        self
    }

    /// `bars` consecutive daily closes ending on the as-of date, growing by
    /// `drift` per day from 100.
    pub fn trending(mut self, id: &str, sector: &str, bars: usize, drift: f64) -> Self {
        self = self.instrument(id, sector);
        let start = self.as_of - Duration::days(bars as i64 - 1);
        let series = self.prices.entry(id.to_string()).or_default();
        for t in 0..bars {
            let close = 100.0 * (1.0 + drift).powi(t as i32) * (1.0 + noise(t));
            series.push(bar(start + Duration::days(t as i64), close));
        }
        self
    }

    /// Explicit closes at day offsets from the as-of date. Positive offsets
    /// are after the as-of date.
    pub fn path(mut self, id: &str, sector: &str, points: &[(i64, f64)]) -> Self {
        self = self.instrument(id, sector);
        let as_of = self.as_of;
        let series = self.prices.entry(id.to_string()).or_default();
        series.extend(
            points
                .iter()
                .map(|&(offset, close)| bar(as_of + Duration::days(offset), close)),
        );
        self
    }

    /// A bar `days` after the as-of date, `forward_return` above the last
    /// close on or before it.
    pub fn forward(mut self, id: &str, days: i64, forward_return: f64) -> Self {
        let as_of = self.as_of;
        let series = self.prices.entry(id.to_string()).or_default();
        let base = series
            .iter()
            .filter(|b| b.date <= as_of)
            .max_by_key(|b| b.date)
            .map(PriceBar::close_f64)
            .unwrap_or(100.0);
        series.push(bar(as_of + Duration::days(days), base * (1.0 + forward_return)));
        self
    }

    /// News item published `days_before` the as-of date. Negative values
    /// date it after the as-of date.
    pub fn news(mut self, id: &str, days_before: i64, title: &str, snippet: &str) -> Self {
        self = self.instrument(id, "default");
        let date = self.as_of - Duration::days(days_before);
        self.news.entry(id.to_string()).or_default().push(NewsItem {
            date,
            title: title.to_string(),
            snippet: snippet.to_string(),
            source: Some("fixture".to_string()),
        });
        self
    }

    /// Fundamentals reported `report_days_before` the as-of date, for the
    /// quarter ending 30 days before that.
    pub fn fundamentals(
        mut self,
        id: &str,
        sector: &str,
        report_days_before: i64,
        mut record: FundamentalRecord,
    ) -> Self {
        self = self.instrument(id, sector);
        record.sector = sector.to_string();
        record.report_date = self.as_of - Duration::days(report_days_before);
        record.period_end = record.report_date - Duration::days(30);
        self.fundamentals
            .entry(id.to_string())
            .or_default()
            .push(record);
        self
    }

    pub fn build(self) -> MarketSnapshot {
        MarketSnapshot::new(self.universe, self.prices, self.news, self.fundamentals)
    }
}

/// Agent returning preset labels. Counts how often it was asked to score.
pub struct FixedAgent {
    kind: AgentKind,
    labels: BTreeMap<String, (RatingLabel, f64)>,
    calls: Arc<AtomicUsize>,
}

impl FixedAgent {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            labels: BTreeMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with(mut self, instrument_id: &str, label: RatingLabel, score: f64) -> Self {
        self.labels
            .insert(instrument_id.to_string(), (label, score));
        self
    }

    /// Shared handle to the call counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ScoringAgent for FixedAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    fn name(&self) -> &str {
        "fixed_agent"
    }

    fn score(&self, snapshot: &MarketSnapshot, as_of: NaiveDate) -> AgentOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ratings = snapshot
            .instrument_ids()
            .filter_map(|id| {
                self.labels.get(id).map(|&(label, score)| Rating {
                    as_of_date: as_of,
                    ..rating(id, self.kind, label, score)
                })
            })
            .collect();
        AgentOutput {
            ratings,
            diagnostics: vec![],
        }
    }
}

/// Agent that panics when scoring.
pub struct PanickingAgent(pub AgentKind);

impl ScoringAgent for PanickingAgent {
    fn kind(&self) -> AgentKind {
        self.0
    }

    fn name(&self) -> &str {
        "panicking_agent"
    }

    fn score(&self, _snapshot: &MarketSnapshot, _as_of: NaiveDate) -> AgentOutput {
        panic!("{} agent blew up", self.0)
    }
}
