use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use quorum_models::{
    AgentKind, Diagnostic, DiagnosticKind, MarketSnapshot, QuorumConfig, Rating, RunReport,
    Stage, REPORT_SCHEMA_VERSION,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::{Agent, AgentOutput, ScoringAgent};
use crate::backtest::BacktestEngine;
use crate::coordinator::Coordinator;
use crate::debate::{DebateModerator, DebateOutcome};
use crate::error::PipelineError;

/// Runs agents, debate, coordinator and backtest for one as-of date.
#[derive(Clone)]
pub struct Pipeline {
    agents: Vec<Arc<dyn ScoringAgent>>,
    config: QuorumConfig,
}

impl Pipeline {
    /// Pipeline over the production agent set.
    pub fn new(config: QuorumConfig) -> Self {
        let agents = Agent::all(&config.agents)
            .into_iter()
            .map(|agent| Arc::new(agent) as Arc<dyn ScoringAgent>)
            .collect();
        Self { agents, config }
    }

    pub fn with_agents(config: QuorumConfig, agents: Vec<Arc<dyn ScoringAgent>>) -> Self {
        Self { agents, config }
    }

    /// Same agents, different configuration.
    pub fn reconfigured(&self, config: QuorumConfig) -> Self {
        Self {
            agents: self.agents.clone(),
            config,
        }
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    pub async fn run(
        &self,
        snapshot: Arc<MarketSnapshot>,
        as_of: NaiveDate,
    ) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        self.config.validate()?;
        info!(as_of = %as_of, instruments = snapshot.universe.len(), "Starting run");

        // 1. Fan out to agents
        let mut handles = Vec::new();
        for agent in &self.agents {
            let agent = Arc::clone(agent);
            let snapshot = Arc::clone(&snapshot);
            let kind = agent.kind();
            let name = agent.name().to_string();
            let handle = tokio::task::spawn_blocking(move || {
                let agent_start = Instant::now();
                let output = agent.score(&snapshot, as_of);
                (output, agent_start.elapsed())
            });
            handles.push((kind, name, handle));
        }

        // 2. Collect in canonical order; a panicked agent counts as missing
        let mut outputs: BTreeMap<AgentKind, AgentOutput> = BTreeMap::new();
        let mut failures = Vec::new();
        for (kind, name, handle) in handles {
            match handle.await {
                Ok((output, elapsed)) => {
                    info!(
                        agent = %name,
                        ratings = output.ratings.len(),
                        elapsed_ms = elapsed.as_millis(),
                        "Agent finished"
                    );
                    let slot = outputs.entry(kind).or_default();
                    slot.ratings.extend(output.ratings);
                    slot.diagnostics.extend(output.diagnostics);
                }
                Err(e) => {
                    error!(agent = %name, error = %e, "Agent task failed");
                    failures.push(
                        Diagnostic::new(
                            Stage::Agents,
                            DiagnosticKind::AgentFailed,
                            format!("{name} agent failed: {e}"),
                        )
                        .for_agent(kind),
                    );
                }
            }
        }

        let mut ratings: Vec<Rating> = Vec::new();
        let mut diagnostics = failures;
        for output in outputs.into_values() {
            ratings.extend(output.ratings);
            diagnostics.extend(output.diagnostics);
        }

        // 3. Debate
        let pipeline = &self.config.pipeline;
        let debate = if pipeline.debate_enabled {
            DebateModerator::new(pipeline.debate_dampening)
                .moderate(snapshot.instrument_ids(), &ratings)
        } else {
            DebateOutcome {
                adjusted: ratings.clone(),
                ..DebateOutcome::default()
            }
        };
        diagnostics.extend(debate.diagnostics);
        let debated: BTreeSet<String> = debate
            .records
            .iter()
            .map(|r| r.instrument_id.clone())
            .collect();

        // 4. Coordinate
        let (decisions, coordinator_diagnostics) = Coordinator::from_config(pipeline).coordinate_all(
            snapshot.instrument_ids(),
            &debate.adjusted,
            &debated,
        );
        diagnostics.extend(coordinator_diagnostics);
        let buys = decisions.iter().filter(|d| d.is_buy()).count();
        info!(as_of = %as_of, decisions = decisions.len(), buys, "Coordination complete");

        // 5. Backtest
        let backtest = BacktestEngine::from_config(pipeline, &self.config.backtest)
            .run(&snapshot, &decisions, as_of);
        diagnostics.extend(backtest.diagnostics);

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            as_of = %as_of,
            active_return = backtest.portfolio.active_return,
            diagnostics = diagnostics.len(),
            elapsed_ms = processing_time_ms,
            "Run complete"
        );

        Ok(RunReport {
            run_id: Uuid::new_v4(),
            schema_version: REPORT_SCHEMA_VERSION,
            as_of_date: as_of,
            ratings,
            adjusted_ratings: debate.adjusted,
            debate_records: debate.records,
            decisions,
            portfolio: backtest.portfolio,
            attribution: backtest.attribution,
            diagnostics,
            processing_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{as_of, FixedAgent, SnapshotBuilder};
    use quorum_models::{DiagnosticKind, RatingLabel::*};

    fn fixed_pipeline(config: QuorumConfig) -> Pipeline {
        let agents: Vec<Arc<dyn ScoringAgent>> = vec![
            Arc::new(FixedAgent::new(AgentKind::Fundamental).with("A", Buy, 0.9)),
            Arc::new(FixedAgent::new(AgentKind::Valuation).with("A", Sell, 0.2)),
            Arc::new(FixedAgent::new(AgentKind::Sentiment).with("A", Buy, 0.4)),
        ];
        Pipeline::with_agents(config, agents)
    }

    fn snapshot() -> Arc<MarketSnapshot> {
        Arc::new(
            SnapshotBuilder::new(as_of())
                .path("A", "technology", &[(0, 100.0), (90, 105.0)])
                .build(),
        )
    }

    #[tokio::test]
    async fn ratings_come_back_in_canonical_order() {
        let report = fixed_pipeline(QuorumConfig::default())
            .run(snapshot(), as_of())
            .await
            .unwrap();
        let agents: Vec<AgentKind> = report.ratings.iter().map(|r| r.agent).collect();
        assert_eq!(agents, AgentKind::ALL.to_vec());
        assert_eq!(report.schema_version, REPORT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn debate_toggle() {
        let report = fixed_pipeline(QuorumConfig::default())
            .run(snapshot(), as_of())
            .await
            .unwrap();
        assert_eq!(report.debate_records.len(), 1);
        assert!(report.decisions[0].debate_applied);
        assert!((report.adjusted_ratings[0].score - 0.16).abs() < 1e-12);

        let mut config = QuorumConfig::default();
        config.pipeline.debate_enabled = false;
        let report = fixed_pipeline(config).run(snapshot(), as_of()).await.unwrap();
        assert!(report.debate_records.is_empty());
        assert_eq!(report.adjusted_ratings, report.ratings);
        assert!(!report.decisions[0].debate_applied);
    }

    #[tokio::test]
    async fn backtest_diagnostics_reach_the_report() {
        let report = fixed_pipeline(QuorumConfig::default())
            .run(snapshot(), as_of())
            .await
            .unwrap();
        // SELL/BUY/BUY holds, so nothing is bought.
        assert_eq!(report.decisions[0].final_label, Hold);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::NoBuyPositions));
        assert_eq!(report.portfolio.diagnostics.len(), 1);
    }
}
