use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Categorical rating shared by agents and the coordinator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum RatingLabel {
    Sell,
    Hold,
    Buy,
}

impl RatingLabel {
    /// Position on the 0–2 voting scale (SELL=0, HOLD=1, BUY=2).
    pub fn coordinate(self) -> f64 {
        match self {
            RatingLabel::Sell => 0.0,
            RatingLabel::Hold => 1.0,
            RatingLabel::Buy => 2.0,
        }
    }

    /// Signed direction: SELL=-1, HOLD=0, BUY=+1.
    pub fn direction(self) -> i8 {
        match self {
            RatingLabel::Sell => -1,
            RatingLabel::Hold => 0,
            RatingLabel::Buy => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RatingLabel::Sell => "SELL",
            RatingLabel::Hold => "HOLD",
            RatingLabel::Buy => "BUY",
        }
    }
}

impl fmt::Display for RatingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of scoring agents, in canonical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Valuation,
    Sentiment,
    Fundamental,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [
        AgentKind::Valuation,
        AgentKind::Sentiment,
        AgentKind::Fundamental,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Valuation => "valuation",
            AgentKind::Sentiment => "sentiment",
            AgentKind::Fundamental => "fundamental",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One agent's rating of one instrument for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub instrument_id: String,
    pub agent: AgentKind,
    pub label: RatingLabel,
    pub score: f64,
    pub rationale: String,
    pub as_of_date: NaiveDate,
    /// Set when the rating was built from substituted inputs.
    #[serde(default)]
    pub degraded: bool,
}

impl Rating {
    /// Copy of this rating with a new score and an appended rationale note.
    /// The label is preserved.
    pub fn with_adjusted_score(&self, score: f64, note: &str) -> Rating {
        Rating {
            score,
            rationale: format!("{}; {note}", self.rationale),
            ..self.clone()
        }
    }
}
