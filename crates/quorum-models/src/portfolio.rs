use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{CoordinatorDecision, DebateRecord};
use crate::diagnostics::Diagnostic;
use crate::rating::{AgentKind, Rating, RatingLabel};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Forward performance of the BUY portfolio against the equal-weight universe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioResult {
    pub as_of_date: NaiveDate,
    pub forward_window_days: u32,
    pub portfolio_return: f64,
    pub benchmark_return: f64,
    pub active_return: f64,
    pub sharpe_proxy: f64,
    pub position_count: usize,
    pub missing_instruments: BTreeSet<String>,
    pub diagnostics: Vec<String>,
}

impl PortfolioResult {
    pub fn outperformed(&self) -> bool {
        self.active_return > 0.0
    }
}

/// Contribution of one position to the portfolio return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributionRecord {
    pub instrument_id: String,
    pub weight_in_portfolio: f64,
    pub forward_return: f64,
    pub contribution: f64,
}

/// Everything one pipeline run produced, in stage order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub schema_version: u32,
    pub as_of_date: NaiveDate,
    /// Agent output before the debate pass.
    pub ratings: Vec<Rating>,
    /// Agent output after the debate pass (identical when debate is off).
    pub adjusted_ratings: Vec<Rating>,
    pub debate_records: Vec<DebateRecord>,
    pub decisions: Vec<CoordinatorDecision>,
    pub portfolio: PortfolioResult,
    pub attribution: Vec<AttributionRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub processing_time_ms: u64,
}

impl RunReport {
    pub fn decision_for(&self, instrument_id: &str) -> Option<&CoordinatorDecision> {
        self.decisions
            .iter()
            .find(|d| d.instrument_id == instrument_id)
    }

    /// One row per instrument: each agent's label/score plus the final vote.
    pub fn pick_rows(&self) -> Vec<PickRow> {
        self.decisions
            .iter()
            .map(|decision| {
                let component = |agent: AgentKind| {
                    decision
                        .rating_for(agent)
                        .map(|r| (Some(r.label), Some(r.score)))
                        .unwrap_or((None, None))
                };
                let (valuation_label, valuation_score) = component(AgentKind::Valuation);
                let (sentiment_label, sentiment_score) = component(AgentKind::Sentiment);
                let (fundamental_label, fundamental_score) = component(AgentKind::Fundamental);
                PickRow {
                    instrument_id: decision.instrument_id.clone(),
                    valuation_label,
                    valuation_score,
                    sentiment_label,
                    sentiment_score,
                    fundamental_label,
                    fundamental_score,
                    numeric_coordinate: decision.numeric_coordinate,
                    final_label: decision.final_label,
                }
            })
            .collect()
    }

    pub fn performance_rows(&self) -> Vec<PerformanceRow> {
        let p = &self.portfolio;
        vec![
            PerformanceRow::new("portfolio_return", p.portfolio_return),
            PerformanceRow::new("benchmark_return", p.benchmark_return),
            PerformanceRow::new("active_return", p.active_return),
            PerformanceRow::new("sharpe_proxy", p.sharpe_proxy),
            PerformanceRow::new("position_count", p.position_count as f64),
        ]
    }
}

/// Tabular projection of a decision, field order is the column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickRow {
    pub instrument_id: String,
    pub valuation_label: Option<RatingLabel>,
    pub valuation_score: Option<f64>,
    pub sentiment_label: Option<RatingLabel>,
    pub sentiment_score: Option<f64>,
    pub fundamental_label: Option<RatingLabel>,
    pub fundamental_score: Option<f64>,
    pub numeric_coordinate: f64,
    pub final_label: RatingLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRow {
    pub metric: String,
    pub value: f64,
}

impl PerformanceRow {
    fn new(metric: &str, value: f64) -> Self {
        Self {
            metric: metric.to_string(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn sample_report() -> RunReport {
        let rating = Rating {
            instrument_id: "AAPL".to_string(),
            agent: AgentKind::Valuation,
            label: RatingLabel::Buy,
            score: 0.91,
            rationale: "top decile momentum".to_string(),
            as_of_date: as_of(),
            degraded: false,
        };
        let mut weights = BTreeMap::new();
        weights.insert(AgentKind::Valuation, 0.4);
        weights.insert(AgentKind::Sentiment, 0.3);
        weights.insert(AgentKind::Fundamental, 0.3);

        RunReport {
            run_id: Uuid::new_v4(),
            schema_version: REPORT_SCHEMA_VERSION,
            as_of_date: as_of(),
            ratings: vec![rating.clone()],
            adjusted_ratings: vec![rating.clone()],
            debate_records: vec![],
            decisions: vec![CoordinatorDecision {
                instrument_id: "AAPL".to_string(),
                component_ratings: vec![rating],
                weights_used: weights,
                numeric_coordinate: 1.4,
                final_label: RatingLabel::Hold,
                debate_applied: false,
                missing_agents: vec![AgentKind::Sentiment, AgentKind::Fundamental],
                degraded: true,
                rationale: "two agents missing".to_string(),
            }],
            portfolio: PortfolioResult {
                as_of_date: as_of(),
                forward_window_days: 90,
                portfolio_return: 0.0,
                benchmark_return: 0.05,
                active_return: -0.05,
                sharpe_proxy: 0.0,
                position_count: 0,
                missing_instruments: BTreeSet::new(),
                diagnostics: vec!["no BUY positions; portfolio held in cash".to_string()],
            },
            attribution: vec![],
            diagnostics: vec![],
            processing_time_ms: 3,
        }
    }

    #[test]
    fn roundtrip_run_report() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, parsed);
    }

    #[test]
    fn pick_rows_fill_missing_agents_with_none() {
        let rows = sample_report().pick_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].valuation_label, Some(RatingLabel::Buy));
        assert_eq!(rows[0].valuation_score, Some(0.91));
        assert_eq!(rows[0].sentiment_label, None);
        assert_eq!(rows[0].fundamental_score, None);
        assert_eq!(rows[0].final_label, RatingLabel::Hold);
    }

    #[test]
    fn performance_rows_order() {
        let rows = sample_report().performance_rows();
        let metrics: Vec<&str> = rows.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(
            metrics,
            vec![
                "portfolio_return",
                "benchmark_return",
                "active_return",
                "sharpe_proxy",
                "position_count"
            ]
        );
        assert!(!sample_report().portfolio.outperformed());
    }
}
