//! Stability and sensitivity checks over repeated pipeline runs.
//!
//! Every run gets its own configuration value and shares the immutable
//! snapshot. Runs execute concurrently in a `JoinSet` and are reassembled in
//! submission order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use quorum_models::{AgentWeights, MarketSnapshot, QuorumConfig, RatingLabel, RunReport};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::info;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::stats::mean;

/// A named weight set for sensitivity runs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeightScenario {
    pub name: String,
    pub weights: AgentWeights,
}

impl WeightScenario {
    pub fn new(name: &str, weights: AgentWeights) -> Self {
        Self {
            name: name.to_string(),
            weights,
        }
    }

    pub fn defaults() -> Vec<WeightScenario> {
        vec![
            WeightScenario::new("Current", AgentWeights::new(0.4, 0.3, 0.3)),
            WeightScenario::new("Equal Weight", AgentWeights::new(0.33, 0.33, 0.34)),
            WeightScenario::new("Valuation Heavy", AgentWeights::new(0.6, 0.2, 0.2)),
            WeightScenario::new("Fundamental Heavy", AgentWeights::new(0.2, 0.2, 0.6)),
        ]
    }
}

/// Labels one instrument received across runs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InstrumentStability {
    pub instrument_id: String,
    /// Run name to final label, in run order.
    pub labels: Vec<(String, RatingLabel)>,
    pub stability: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StabilityReport {
    pub runs: Vec<String>,
    pub instruments: Vec<InstrumentStability>,
}

impl StabilityReport {
    pub fn for_instrument(&self, instrument_id: &str) -> Option<&InstrumentStability> {
        self.instruments
            .iter()
            .find(|i| i.instrument_id == instrument_id)
    }
}

/// `1 − unique / total`. Zero for no observations.
pub fn stability_score(labels: &[RatingLabel]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let unique: BTreeSet<RatingLabel> = labels.iter().copied().collect();
    1.0 - unique.len() as f64 / labels.len() as f64
}

/// A named configuration for A/B comparison.
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub config: QuorumConfig,
}

impl Variant {
    pub fn new(name: &str, config: QuorumConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }
}

/// Performance of one variant on one date.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VariantRow {
    pub variant: String,
    pub as_of_date: NaiveDate,
    pub portfolio_return: f64,
    pub benchmark_return: f64,
    pub active_return: f64,
    pub sharpe_proxy: f64,
}

impl VariantRow {
    fn from_report(variant: &str, report: &RunReport) -> Self {
        let p = &report.portfolio;
        Self {
            variant: variant.to_string(),
            as_of_date: report.as_of_date,
            portfolio_return: p.portfolio_return,
            benchmark_return: p.benchmark_return,
            active_return: p.active_return,
            sharpe_proxy: p.sharpe_proxy,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComparisonReport {
    pub variant_a: String,
    pub variant_b: String,
    pub rows_a: Vec<VariantRow>,
    pub rows_b: Vec<VariantRow>,
    /// Mean active return of B minus mean active return of A.
    pub mean_active_difference: f64,
}

pub struct StabilityHarness {
    pipeline: Pipeline,
    snapshot: Arc<MarketSnapshot>,
}

impl StabilityHarness {
    /// `pipeline` supplies the agents and the base configuration.
    pub fn new(pipeline: Pipeline, snapshot: Arc<MarketSnapshot>) -> Self {
        Self { pipeline, snapshot }
    }

    pub async fn stability_across_dates(
        &self,
        dates: &[NaiveDate],
    ) -> Result<StabilityReport, PipelineError> {
        let runs: Vec<(String, QuorumConfig, NaiveDate)> = dates
            .iter()
            .map(|d| (d.to_string(), self.pipeline.config().clone(), *d))
            .collect();
        let reports = self.run_all(&runs).await?;
        info!(dates = dates.len(), "Date stability complete");
        Ok(stability_report(&runs, &reports))
    }

    /// Re-run one date under each weight scenario, other settings fixed.
    pub async fn stability_across_weights(
        &self,
        as_of: NaiveDate,
        scenarios: &[WeightScenario],
    ) -> Result<StabilityReport, PipelineError> {
        let runs: Vec<(String, QuorumConfig, NaiveDate)> = scenarios
            .iter()
            .map(|scenario| {
                let mut config = self.pipeline.config().clone();
                config.pipeline.weights = scenario.weights;
                (scenario.name.clone(), config, as_of)
            })
            .collect();
        let reports = self.run_all(&runs).await?;
        info!(scenarios = scenarios.len(), as_of = %as_of, "Weight sensitivity complete");
        Ok(stability_report(&runs, &reports))
    }

    pub async fn compare_variants(
        &self,
        dates: &[NaiveDate],
        a: &Variant,
        b: &Variant,
    ) -> Result<ComparisonReport, PipelineError> {
        let runs: Vec<(String, QuorumConfig, NaiveDate)> = [a, b]
            .iter()
            .flat_map(|variant| {
                dates
                    .iter()
                    .map(move |d| (variant.name.clone(), variant.config.clone(), *d))
            })
            .collect();
        let reports = self.run_all(&runs).await?;

        let (reports_a, reports_b) = reports.split_at(dates.len());
        let rows_a: Vec<VariantRow> = reports_a
            .iter()
            .map(|r| VariantRow::from_report(&a.name, r))
            .collect();
        let rows_b: Vec<VariantRow> = reports_b
            .iter()
            .map(|r| VariantRow::from_report(&b.name, r))
            .collect();

        let active = |rows: &[VariantRow]| {
            mean(&rows.iter().map(|r| r.active_return).collect::<Vec<_>>())
        };
        let mean_active_difference = active(&rows_b[..]) - active(&rows_a[..]);
        info!(
            variant_a = %a.name,
            variant_b = %b.name,
            dates = dates.len(),
            mean_active_difference,
            "Variant comparison complete"
        );

        Ok(ComparisonReport {
            variant_a: a.name.clone(),
            variant_b: b.name.clone(),
            rows_a,
            rows_b,
            mean_active_difference,
        })
    }

    async fn run_all(
        &self,
        runs: &[(String, QuorumConfig, NaiveDate)],
    ) -> Result<Vec<RunReport>, PipelineError> {
        let mut set = JoinSet::new();
        for (index, (_, config, as_of)) in runs.iter().enumerate() {
            let pipeline = self.pipeline.reconfigured(config.clone());
            let snapshot = Arc::clone(&self.snapshot);
            let as_of = *as_of;
            set.spawn(async move { (index, pipeline.run(snapshot, as_of).await) });
        }

        let mut slots: Vec<Option<RunReport>> = vec![None; runs.len()];
        while let Some(joined) = set.join_next().await {
            let (index, result) = joined.map_err(|e| PipelineError::Task(e.to_string()))?;
            slots[index] = Some(result?);
        }
        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| PipelineError::Task("run did not report".to_string())))
            .collect()
    }
}

fn stability_report(
    runs: &[(String, QuorumConfig, NaiveDate)],
    reports: &[RunReport],
) -> StabilityReport {
    let mut per_instrument: BTreeMap<String, Vec<(String, RatingLabel)>> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    for ((name, _, _), report) in runs.iter().zip(reports) {
        for decision in &report.decisions {
            let labels = per_instrument
                .entry(decision.instrument_id.clone())
                .or_insert_with(|| {
                    order.push(decision.instrument_id.clone());
                    Vec::new()
                });
            labels.push((name.clone(), decision.final_label));
        }
    }

    let instruments = order
        .into_iter()
        .filter_map(|id| {
            let labels = per_instrument.remove(&id)?;
            let only: Vec<RatingLabel> = labels.iter().map(|(_, l)| *l).collect();
            Some(InstrumentStability {
                instrument_id: id,
                stability: stability_score(&only),
                labels,
            })
        })
        .collect();

    StabilityReport {
        runs: runs.iter().map(|(name, _, _)| name.clone()).collect(),
        instruments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScoringAgent;
    use crate::test_support::{as_of, FixedAgent, SnapshotBuilder};
    use chrono::Duration;
    use quorum_models::AgentKind;
    use RatingLabel::*;

    #[test]
    fn score_formula() {
        assert_eq!(stability_score(&[Buy, Buy, Buy, Buy]), 0.75);
        assert_eq!(stability_score(&[Buy, Hold, Buy, Buy]), 0.5);
        assert_eq!(stability_score(&[Buy, Hold, Sell]), 0.0);
        assert_eq!(stability_score(&[]), 0.0);
    }

    #[test]
    fn report_serializes_labels_in_run_order() {
        let report = StabilityReport {
            runs: vec!["a".to_string(), "b".to_string()],
            instruments: vec![InstrumentStability {
                instrument_id: "X".to_string(),
                labels: vec![("a".to_string(), Buy), ("b".to_string(), Hold)],
                stability: 0.0,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["instruments"][0]["labels"][1], serde_json::json!(["b", "HOLD"]));
        assert_eq!(json["runs"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn default_scenarios_are_valid() {
        let scenarios = WeightScenario::defaults();
        assert_eq!(scenarios.len(), 4);
        assert_eq!(scenarios[0].name, "Current");
        for scenario in &scenarios {
            scenario.weights.validate().unwrap();
        }
    }

    // V=SELL, S=BUY, F=BUY for "X": 1.2 under Current, BUY once fundamentals dominate.
    fn harness() -> StabilityHarness {
        let agents: Vec<Arc<dyn ScoringAgent>> = vec![
            Arc::new(FixedAgent::new(AgentKind::Valuation).with("X", Sell, 0.2)),
            Arc::new(FixedAgent::new(AgentKind::Sentiment).with("X", Buy, 0.4)),
            Arc::new(FixedAgent::new(AgentKind::Fundamental).with("X", Buy, 0.9)),
        ];
        let mut config = QuorumConfig::default();
        config.pipeline.debate_enabled = false;
        let snapshot = SnapshotBuilder::new(as_of())
            .path("X", "technology", &[(-30, 90.0), (0, 100.0), (60, 104.0), (90, 110.0), (120, 115.0)])
            .build();
        StabilityHarness::new(Pipeline::with_agents(config, agents), Arc::new(snapshot))
    }

    #[tokio::test]
    async fn weight_scenarios_move_the_label() {
        let report = harness()
            .stability_across_weights(as_of(), &WeightScenario::defaults())
            .await
            .unwrap();
        assert_eq!(report.runs.len(), 4);
        let x = report.for_instrument("X").unwrap();
        let labels: Vec<RatingLabel> = x.labels.iter().map(|(_, l)| *l).collect();
        // 1.2, 1.34, 0.8, 1.6
        assert_eq!(labels, vec![Hold, Hold, Hold, Buy]);
        assert_eq!(x.stability, 0.5);
    }

    #[tokio::test]
    async fn fixed_labels_are_stable_across_dates() {
        let dates = [as_of(), as_of() + Duration::days(30)];
        let report = harness().stability_across_dates(&dates).await.unwrap();
        assert_eq!(report.runs, vec!["2024-06-28", "2024-07-28"]);
        assert_eq!(report.for_instrument("X").unwrap().stability, 0.5);
    }

    #[tokio::test]
    async fn variant_comparison_rows() {
        let current = Variant::new("current", QuorumConfig::default());
        let mut heavy = QuorumConfig::default();
        heavy.pipeline.weights = AgentWeights::new(0.2, 0.2, 0.6);
        let heavy = Variant::new("fundamental_heavy", heavy);

        let report = harness()
            .compare_variants(&[as_of()], &current, &heavy)
            .await
            .unwrap();
        assert_eq!(report.rows_a.len(), 1);
        assert_eq!(report.rows_b.len(), 1);
        // Only the single instrument, so active return is zero either way.
        assert_eq!(report.rows_a[0].portfolio_return, 0.0);
        assert!((report.rows_b[0].portfolio_return - 0.10).abs() < 1e-12);
        assert!(report.rows_b[0].active_return.abs() < 1e-12);
        assert!(report.mean_active_difference.abs() < 1e-12);
    }

    #[tokio::test]
    async fn invalid_variant_fails_the_comparison() {
        let mut bad = QuorumConfig::default();
        bad.pipeline.weights = AgentWeights::new(0.5, 0.5, 0.5);
        let result = harness()
            .compare_variants(
                &[as_of()],
                &Variant::new("ok", QuorumConfig::default()),
                &Variant::new("bad", bad),
            )
            .await;
        assert!(matches!(result, Err(PipelineError::ConfigurationInvalid(_))));
    }
}
