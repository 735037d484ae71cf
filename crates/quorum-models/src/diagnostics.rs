use serde::{Deserialize, Serialize};

use crate::rating::AgentKind;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Agents,
    Debate,
    Coordinator,
    Backtest,
}

/// Non-fatal conditions surfaced alongside partial results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Not enough price history to score; instrument excluded by the agent.
    InsufficientHistory,
    /// No news on or before the as-of date; neutral default used.
    MissingNewsCoverage,
    /// A fundamental metric was substituted with the sector median.
    MissingFundamentalMetric,
    /// Coordinator substituted a neutral coordinate for an absent rating.
    MissingAgentRating,
    /// Instrument has no usable forward price; excluded from weighting.
    MissingForwardPrice,
    /// No instrument rated BUY; portfolio is all cash.
    NoBuyPositions,
    /// Not enough overlapping daily returns to estimate period volatility.
    InsufficientVolatilityHistory,
    /// Debate pass skipped because an agent rating was missing.
    DebateSkipped,
    /// An agent task failed outright; none of its ratings are available.
    AgentFailed,
}

/// One entry in the non-fatal error list of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: DiagnosticKind,
    pub instrument_id: Option<String>,
    pub agent: Option<AgentKind>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            instrument_id: None,
            agent: None,
            message: message.into(),
        }
    }

    pub fn for_instrument(mut self, instrument_id: &str) -> Self {
        self.instrument_id = Some(instrument_id.to_string());
        self
    }

    pub fn for_agent(mut self, agent: AgentKind) -> Self {
        self.agent = Some(agent);
        self
    }
}
