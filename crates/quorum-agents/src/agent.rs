use chrono::NaiveDate;
use quorum_models::{AgentKind, AgentsConfig, Diagnostic, MarketSnapshot, Rating};

use crate::fundamental::FundamentalAgent;
use crate::sentiment::SentimentAgent;
use crate::valuation::ValuationAgent;

/// What one agent produced for the universe: a rating per scorable
/// instrument plus the non-fatal conditions it hit along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutput {
    pub ratings: Vec<Rating>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A scoring agent. Implementations must only read the snapshot through the
/// as-of-bounded accessors.
pub trait ScoringAgent: Send + Sync {
    fn kind(&self) -> AgentKind;
    fn name(&self) -> &str;

    fn score(&self, snapshot: &MarketSnapshot, as_of: NaiveDate) -> AgentOutput;
}

/// The production agent set.
pub enum Agent {
    Valuation(ValuationAgent),
    Sentiment(SentimentAgent),
    Fundamental(FundamentalAgent),
}

impl Agent {
    pub fn from_config(kind: AgentKind, config: &AgentsConfig) -> Self {
        match kind {
            AgentKind::Valuation => Agent::Valuation(ValuationAgent::new(config.valuation.clone())),
            AgentKind::Sentiment => Agent::Sentiment(SentimentAgent::new(config.sentiment.clone())),
            AgentKind::Fundamental => {
                Agent::Fundamental(FundamentalAgent::new(config.fundamental.clone()))
            }
        }
    }

    /// One agent per kind, in canonical order.
    pub fn all(config: &AgentsConfig) -> Vec<Agent> {
        AgentKind::ALL
            .iter()
            .map(|&kind| Agent::from_config(kind, config))
            .collect()
    }
}

impl ScoringAgent for Agent {
    fn kind(&self) -> AgentKind {
        match self {
            Agent::Valuation(_) => AgentKind::Valuation,
            Agent::Sentiment(_) => AgentKind::Sentiment,
            Agent::Fundamental(_) => AgentKind::Fundamental,
        }
    }

    fn name(&self) -> &str {
        match self {
            Agent::Valuation(agent) => agent.name(),
            Agent::Sentiment(agent) => agent.name(),
            Agent::Fundamental(agent) => agent.name(),
        }
    }

    fn score(&self, snapshot: &MarketSnapshot, as_of: NaiveDate) -> AgentOutput {
        match self {
            Agent::Valuation(agent) => agent.score(snapshot, as_of),
            Agent::Sentiment(agent) => agent.score(snapshot, as_of),
            Agent::Fundamental(agent) => agent.score(snapshot, as_of),
        }
    }
}
