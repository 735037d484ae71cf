use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rating::{AgentKind, Rating, RatingLabel};

/// Audit entry for a score the debate pass dampened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateRecord {
    pub instrument_id: String,
    pub agent: AgentKind,
    pub label: RatingLabel,
    pub original_score: f64,
    pub dampened_score: f64,
}

/// Final weighted-vote outcome for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinatorDecision {
    pub instrument_id: String,
    /// Post-debate ratings in canonical agent order. Absent agents are skipped.
    pub component_ratings: Vec<Rating>,
    pub weights_used: BTreeMap<AgentKind, f64>,
    /// Convex combination of component coordinates, in [0, 2].
    pub numeric_coordinate: f64,
    pub final_label: RatingLabel,
    pub debate_applied: bool,
    pub missing_agents: Vec<AgentKind>,
    pub degraded: bool,
    pub rationale: String,
}

impl CoordinatorDecision {
    pub fn rating_for(&self, agent: AgentKind) -> Option<&Rating> {
        self.component_ratings.iter().find(|r| r.agent == agent)
    }

    pub fn is_buy(&self) -> bool {
        self.final_label == RatingLabel::Buy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rating(agent: AgentKind, label: RatingLabel) -> Rating {
        Rating {
            instrument_id: "TSLA".to_string(),
            agent,
            label,
            score: 0.5,
            rationale: "test".to_string(),
            as_of_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            degraded: false,
        }
    }

    #[test]
    fn roundtrip_decision() {
        let mut weights = BTreeMap::new();
        weights.insert(AgentKind::Valuation, 0.4);
        weights.insert(AgentKind::Sentiment, 0.3);
        weights.insert(AgentKind::Fundamental, 0.3);

        let decision = CoordinatorDecision {
            instrument_id: "TSLA".to_string(),
            component_ratings: vec![
                rating(AgentKind::Valuation, RatingLabel::Buy),
                rating(AgentKind::Sentiment, RatingLabel::Hold),
            ],
            weights_used: weights,
            numeric_coordinate: 1.4,
            final_label: RatingLabel::Hold,
            debate_applied: false,
            missing_agents: vec![AgentKind::Fundamental],
            degraded: true,
            rationale: "fundamental rating missing, neutral substituted".to_string(),
        };

        let json = serde_json::to_string(&decision).unwrap();
        let parsed: CoordinatorDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, parsed);
        assert!(parsed.rating_for(AgentKind::Fundamental).is_none());
        assert_eq!(
            parsed.rating_for(AgentKind::Sentiment).unwrap().label,
            RatingLabel::Hold
        );
        assert!(!parsed.is_buy());
    }

    #[test]
    fn weights_serialize_in_canonical_order() {
        let mut weights = BTreeMap::new();
        weights.insert(AgentKind::Fundamental, 0.3);
        weights.insert(AgentKind::Valuation, 0.4);
        weights.insert(AgentKind::Sentiment, 0.3);
        let json = serde_json::to_string(&weights).unwrap();
        assert_eq!(json, r#"{"valuation":0.4,"sentiment":0.3,"fundamental":0.3}"#);
    }
}
