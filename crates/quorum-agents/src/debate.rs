use std::collections::BTreeMap;

use quorum_models::{
    AgentKind, DebateRecord, Diagnostic, DiagnosticKind, Rating, RatingLabel, Stage,
};
use tracing::{info, warn};

/// Result of the debate pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebateOutcome {
    /// Every input rating, with isolated ones replaced by dampened copies.
    pub adjusted: Vec<Rating>,
    pub records: Vec<DebateRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The agent whose non-HOLD label stands alone against the other two, if any.
///
/// The other two must agree with each other and differ from it, so at most
/// one agent can be isolated.
pub fn isolated_agent(labels: [(AgentKind, RatingLabel); 3]) -> Option<AgentKind> {
    (0..3).find_map(|i| {
        let (agent, label) = labels[i];
        let (_, a) = labels[(i + 1) % 3];
        let (_, b) = labels[(i + 2) % 3];
        (label != RatingLabel::Hold && a == b && a != label).then_some(agent)
    })
}

/// Dampens isolated votes before they reach the coordinator.
pub struct DebateModerator {
    dampening: f64,
}

impl DebateModerator {
    pub fn new(dampening: f64) -> Self {
        Self { dampening }
    }

    pub fn moderate<'a>(
        &self,
        instrument_ids: impl IntoIterator<Item = &'a str>,
        ratings: &[Rating],
    ) -> DebateOutcome {
        let mut by_instrument: BTreeMap<&str, BTreeMap<AgentKind, &Rating>> = BTreeMap::new();
        for rating in ratings {
            by_instrument
                .entry(rating.instrument_id.as_str())
                .or_default()
                .insert(rating.agent, rating);
        }

        let mut dampened: BTreeMap<(&str, AgentKind), Rating> = BTreeMap::new();
        let mut outcome = DebateOutcome::default();

        for instrument_id in instrument_ids {
            let votes = by_instrument.get(instrument_id);
            let complete = votes.map(|v| {
                [
                    v.get(&AgentKind::Valuation),
                    v.get(&AgentKind::Sentiment),
                    v.get(&AgentKind::Fundamental),
                ]
            });
            let Some([Some(valuation), Some(sentiment), Some(fundamental)]) = complete else {
                let missing: Vec<&str> = AgentKind::ALL
                    .iter()
                    .filter(|&&k| votes.map_or(true, |v| !v.contains_key(&k)))
                    .map(|k| k.as_str())
                    .collect();
                warn!(instrument = %instrument_id, missing = ?missing, "Debate skipped");
                outcome.diagnostics.push(
                    Diagnostic::new(
                        Stage::Debate,
                        DiagnosticKind::DebateSkipped,
                        format!("debate skipped, missing {}", missing.join(", ")),
                    )
                    .for_instrument(instrument_id),
                );
                continue;
            };

            let labels = [
                (AgentKind::Valuation, valuation.label),
                (AgentKind::Sentiment, sentiment.label),
                (AgentKind::Fundamental, fundamental.label),
            ];
            let Some(agent) = isolated_agent(labels) else {
                continue;
            };

            let original = match agent {
                AgentKind::Valuation => *valuation,
                AgentKind::Sentiment => *sentiment,
                AgentKind::Fundamental => *fundamental,
            };

            let dampened_score = original.score * self.dampening;
            info!(
                instrument = %instrument_id,
                agent = %agent,
                label = %original.label,
                original = original.score,
                dampened = dampened_score,
                "Isolated vote dampened"
            );
            let note = format!(
                "debate: isolated {} vote dampened {:.3} -> {:.3}",
                original.label, original.score, dampened_score
            );
            outcome.records.push(DebateRecord {
                instrument_id: instrument_id.to_string(),
                agent,
                label: original.label,
                original_score: original.score,
                dampened_score,
            });
            dampened.insert(
                (instrument_id, agent),
                original.with_adjusted_score(dampened_score, &note),
            );
        }

        outcome.adjusted = ratings
            .iter()
            .map(|r| {
                dampened
                    .get(&(r.instrument_id.as_str(), r.agent))
                    .cloned()
                    .unwrap_or_else(|| r.clone())
            })
            .collect();
        outcome
    }
}
