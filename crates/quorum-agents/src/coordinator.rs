use std::collections::{BTreeMap, BTreeSet};

use quorum_models::{
    AgentKind, AgentWeights, CoordinatorDecision, Diagnostic, DiagnosticKind, PipelineConfig,
    Rating, RatingLabel, Stage,
};
use tracing::{debug, warn};

/// Values this close to a cut point count as a tie and resolve to HOLD.
pub const TIE_EPSILON: f64 = 1e-9;

/// Weighted vote over the three agent labels.
#[derive(Debug, Clone)]
pub struct Coordinator {
    weights: AgentWeights,
    buy_cut: f64,
    sell_cut: f64,
}

impl Coordinator {
    pub fn new(weights: AgentWeights, buy_cut: f64, sell_cut: f64) -> Self {
        Self {
            weights,
            buy_cut,
            sell_cut,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.weights, config.buy_cut(), config.sell_cut())
    }

    /// Σ weight × coordinate. Absent agents contribute the neutral coordinate.
    pub fn numeric_coordinate(&self, labels: &BTreeMap<AgentKind, RatingLabel>) -> f64 {
        AgentKind::ALL
            .iter()
            .map(|&agent| {
                let coordinate = labels
                    .get(&agent)
                    .map_or(RatingLabel::Hold.coordinate(), |l| l.coordinate());
                self.weights.weight(agent) * coordinate
            })
            .sum()
    }

    pub fn label_for(&self, coordinate: f64) -> RatingLabel {
        if (coordinate - self.buy_cut).abs() <= TIE_EPSILON
            || (coordinate - self.sell_cut).abs() <= TIE_EPSILON
        {
            RatingLabel::Hold
        } else if coordinate > self.buy_cut {
            RatingLabel::Buy
        } else if coordinate < self.sell_cut {
            RatingLabel::Sell
        } else {
            RatingLabel::Hold
        }
    }

    /// Decide one instrument from its post-debate ratings.
    pub fn decide(
        &self,
        instrument_id: &str,
        ratings: &[&Rating],
        debate_applied: bool,
    ) -> (CoordinatorDecision, Vec<Diagnostic>) {
        let mut component_ratings: Vec<Rating> = ratings.iter().map(|&r| r.clone()).collect();
        component_ratings.sort_by_key(|r| r.agent);

        let labels: BTreeMap<AgentKind, RatingLabel> =
            component_ratings.iter().map(|r| (r.agent, r.label)).collect();
        let missing_agents: Vec<AgentKind> = AgentKind::ALL
            .iter()
            .copied()
            .filter(|a| !labels.contains_key(a))
            .collect();

        let numeric_coordinate = self.numeric_coordinate(&labels);
        let final_label = self.label_for(numeric_coordinate);

        let terms: Vec<String> = AgentKind::ALL
            .iter()
            .map(|&agent| match labels.get(&agent) {
                Some(label) => format!(
                    "{agent} {label} {:.2}x{}",
                    self.weights.weight(agent),
                    label.coordinate()
                ),
                None => format!("{agent} missing {:.2}x1", self.weights.weight(agent)),
            })
            .collect();
        let rationale = format!(
            "{} = {numeric_coordinate:.3} -> {final_label} (BUY > {:.2}, SELL < {:.2})",
            terms.join(" + "),
            self.buy_cut,
            self.sell_cut
        );

        let diagnostics: Vec<Diagnostic> = missing_agents
            .iter()
            .map(|&agent| {
                warn!(instrument = %instrument_id, agent = %agent, "Missing rating, neutral substituted");
                Diagnostic::new(
                    Stage::Coordinator,
                    DiagnosticKind::MissingAgentRating,
                    format!("{agent} rating missing, neutral coordinate substituted"),
                )
                .for_instrument(instrument_id)
                .for_agent(agent)
            })
            .collect();

        debug!(instrument = %instrument_id, numeric_coordinate, label = %final_label, "Coordinated");

        let decision = CoordinatorDecision {
            instrument_id: instrument_id.to_string(),
            component_ratings,
            weights_used: self.weights.as_map(),
            numeric_coordinate,
            final_label,
            debate_applied,
            degraded: !missing_agents.is_empty(),
            missing_agents,
            rationale,
        };
        (decision, diagnostics)
    }

    /// One decision per instrument, in the order given.
    pub fn coordinate_all<'a>(
        &self,
        instrument_ids: impl IntoIterator<Item = &'a str>,
        ratings: &[Rating],
        debated: &BTreeSet<String>,
    ) -> (Vec<CoordinatorDecision>, Vec<Diagnostic>) {
        let mut decisions = Vec::new();
        let mut diagnostics = Vec::new();
        for instrument_id in instrument_ids {
            let own: Vec<&Rating> = ratings
                .iter()
                .filter(|r| r.instrument_id == instrument_id)
                .collect();
            let (decision, diags) = self.decide(instrument_id, &own, debated.contains(instrument_id));
            decisions.push(decision);
            diagnostics.extend(diags);
        }
        (decisions, diagnostics)
    }
}
