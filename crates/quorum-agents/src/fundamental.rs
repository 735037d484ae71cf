use std::collections::BTreeMap;

use chrono::NaiveDate;
use quorum_models::{
    AgentKind, Diagnostic, DiagnosticKind, FundamentalConfig, FundamentalRecord, MarketSnapshot,
    MetricBounds, Rating, RatingLabel, SectorBounds, Stage,
};
use tracing::{debug, warn};

use crate::agent::{AgentOutput, ScoringAgent};
use crate::stats::{mean, median};

pub const DEGRADED_NOTE: &str = "degraded confidence";

/// The four quality metrics in composite order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    RevenueGrowth,
    OperatingMargin,
    DebtToEquity,
    CapexIntensity,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::RevenueGrowth,
        Metric::OperatingMargin,
        Metric::DebtToEquity,
        Metric::CapexIntensity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::RevenueGrowth => "revenue_growth",
            Metric::OperatingMargin => "operating_margin",
            Metric::DebtToEquity => "debt_to_equity",
            Metric::CapexIntensity => "capex_intensity",
        }
    }

    pub fn value(self, record: &FundamentalRecord) -> Option<f64> {
        match self {
            Metric::RevenueGrowth => record.revenue_growth,
            Metric::OperatingMargin => record.operating_margin,
            Metric::DebtToEquity => record.debt_to_equity,
            Metric::CapexIntensity => record.capex_intensity,
        }
        .filter(|v| v.is_finite())
    }

    pub fn bounds(self, sector: &SectorBounds) -> MetricBounds {
        match self {
            Metric::RevenueGrowth => sector.revenue_growth,
            Metric::OperatingMargin => sector.operating_margin,
            Metric::DebtToEquity => sector.debt_to_equity,
            Metric::CapexIntensity => sector.capex_intensity,
        }
    }
}

/// Composite quality score for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityScore {
    pub scaled: [f64; 4],
    pub composite: f64,
    /// Metrics that were filled from peers or bounds midpoints.
    pub substituted: Vec<Metric>,
}

/// Median of each metric across the qualifying records of one sector.
type SectorMedians = BTreeMap<(String, Metric), f64>;

/// Scores quality fundamentals against sector bounds.
pub struct FundamentalAgent {
    config: FundamentalConfig,
}

impl FundamentalAgent {
    pub fn new(config: FundamentalConfig) -> Self {
        Self { config }
    }

    /// Score a (possibly absent) record. Missing metrics fall back to the
    /// sector median, then to the bounds midpoint.
    pub fn quality_score(
        &self,
        sector: &str,
        record: Option<&FundamentalRecord>,
        medians: &SectorMedians,
    ) -> QualityScore {
        let bounds = self.config.bounds_for(sector);
        let mut scaled = [0.0; 4];
        let mut substituted = Vec::new();

        for (slot, metric) in scaled.iter_mut().zip(Metric::ALL) {
            let metric_bounds = metric.bounds(&bounds);
            let raw = match record.and_then(|r| metric.value(r)) {
                Some(v) => v,
                None => {
                    substituted.push(metric);
                    medians
                        .get(&(sector.to_string(), metric))
                        .copied()
                        .unwrap_or_else(|| metric_bounds.midpoint())
                }
            };
            *slot = metric_bounds.scale(raw);
        }

        QualityScore {
            scaled,
            composite: mean(&scaled),
            substituted,
        }
    }

    fn label_for(&self, composite: f64) -> RatingLabel {
        if composite > self.config.buy_threshold {
            RatingLabel::Buy
        } else if composite < self.config.sell_threshold {
            RatingLabel::Sell
        } else {
            RatingLabel::Hold
        }
    }
}

fn sector_medians(records: &[(&str, &str, Option<&FundamentalRecord>)]) -> SectorMedians {
    let mut samples: BTreeMap<(String, Metric), Vec<f64>> = BTreeMap::new();
    for (_, sector, record) in records {
        let Some(record) = record else { continue };
        for metric in Metric::ALL {
            if let Some(v) = metric.value(record) {
                samples
                    .entry((sector.to_string(), metric))
                    .or_default()
                    .push(v);
            }
        }
    }
    samples
        .into_iter()
        .filter_map(|(key, values)| median(&values).map(|m| (key, m)))
        .collect()
}

impl ScoringAgent for FundamentalAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Fundamental
    }

    fn name(&self) -> &str {
        "fundamental_agent"
    }

    fn score(&self, snapshot: &MarketSnapshot, as_of: NaiveDate) -> AgentOutput {
        let mut output = AgentOutput::default();

        // (instrument, sector, latest record reported on or before as_of)
        let records: Vec<(&str, &str, Option<&FundamentalRecord>)> = snapshot
            .universe
            .iter()
            .map(|instrument| {
                let record = snapshot.fundamentals_through(&instrument.id, as_of);
                let sector = record
                    .map(|r| r.sector.as_str())
                    .unwrap_or(instrument.sector.as_str());
                (instrument.id.as_str(), sector, record)
            })
            .collect();
        let medians = sector_medians(&records);

        for &(instrument_id, sector, record) in &records {
            let quality = self.quality_score(sector, record, &medians);
            let label = self.label_for(quality.composite);
            let [growth, margin, leverage, capex] = quality.scaled;
            let mut rationale = format!(
                "growth {growth:.2}, margin {margin:.2}, leverage {leverage:.2}, capex {capex:.2} -> composite {:.3} ({sector})",
                quality.composite
            );

            let degraded = !quality.substituted.is_empty();
            if degraded {
                let names: Vec<&str> = quality.substituted.iter().map(|m| m.as_str()).collect();
                let detail = match record {
                    Some(_) => format!("substituted {}", names.join(", ")),
                    None => "no fundamentals reported, all metrics substituted".to_string(),
                };
                warn!(instrument = %instrument_id, detail = %detail, "Fundamental metrics substituted");
                rationale.push_str(&format!("; {DEGRADED_NOTE} ({detail})"));
                output.diagnostics.push(
                    Diagnostic::new(Stage::Agents, DiagnosticKind::MissingFundamentalMetric, detail)
                        .for_instrument(instrument_id)
                        .for_agent(AgentKind::Fundamental),
                );
            }

            debug!(
                instrument = %instrument_id,
                composite = quality.composite,
                label = %label,
                "Fundamental scored"
            );
            output.ratings.push(Rating {
                instrument_id: instrument_id.to_string(),
                agent: AgentKind::Fundamental,
                label,
                score: quality.composite,
                rationale,
                as_of_date: as_of,
                degraded,
            });
        }

        output
    }
}
