use chrono::NaiveDate;
use quorum_models::{
    AgentKind, Diagnostic, DiagnosticKind, MarketSnapshot, Rating, RatingLabel, Stage,
    ValuationConfig,
};
use tracing::{debug, warn};

use crate::agent::{AgentOutput, ScoringAgent};
use crate::error::AgentError;
use crate::stats::{logistic, percentile_rank, period_returns, sample_std, simple_return};

/// Trailing return, trailing volatility and their ratio for one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAdjustedMomentum {
    pub trailing_return: f64,
    pub volatility: f64,
    pub score: f64,
}

/// Ranks the universe on risk-adjusted momentum.
pub struct ValuationAgent {
    config: ValuationConfig,
}

impl ValuationAgent {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    /// `closes` must be in date order and end at the as-of date.
    pub fn risk_adjusted_momentum(
        &self,
        instrument_id: &str,
        closes: &[f64],
    ) -> Result<RiskAdjustedMomentum, AgentError> {
        let required = self.config.required_history();
        if closes.len() < required {
            return Err(AgentError::InsufficientHistory {
                instrument_id: instrument_id.to_string(),
                available: closes.len(),
                required,
            });
        }

        let n = closes.len();
        let trailing_return = simple_return(closes[n - self.config.return_window], closes[n - 1]);
        let volatility = sample_std(&period_returns(&closes[n - self.config.volatility_window..]));
        let score = if volatility > 0.0 {
            trailing_return / volatility
        } else {
            0.0
        };

        Ok(RiskAdjustedMomentum {
            trailing_return,
            volatility,
            score,
        })
    }

    fn label_for(&self, percentile: f64) -> RatingLabel {
        if percentile > self.config.buy_percentile {
            RatingLabel::Buy
        } else if percentile < self.config.sell_percentile {
            RatingLabel::Sell
        } else {
            RatingLabel::Hold
        }
    }
}

impl ScoringAgent for ValuationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Valuation
    }

    fn name(&self) -> &str {
        "valuation_agent"
    }

    fn score(&self, snapshot: &MarketSnapshot, as_of: NaiveDate) -> AgentOutput {
        let mut output = AgentOutput::default();
        let mut scored: Vec<(&str, RiskAdjustedMomentum)> = Vec::new();

        for instrument_id in snapshot.instrument_ids() {
            let closes = snapshot.closes_through(instrument_id, as_of);
            match self.risk_adjusted_momentum(instrument_id, &closes) {
                Ok(momentum) => scored.push((instrument_id, momentum)),
                Err(e) => {
                    warn!(instrument = %instrument_id, error = %e, "Valuation excluded instrument");
                    output.diagnostics.push(
                        Diagnostic::new(Stage::Agents, DiagnosticKind::InsufficientHistory, e.to_string())
                            .for_instrument(instrument_id)
                            .for_agent(AgentKind::Valuation),
                    );
                }
            }
        }

        let population: Vec<f64> = scored.iter().map(|(_, m)| m.score).collect();
        for (instrument_id, momentum) in scored {
            let percentile = percentile_rank(momentum.score, &population);
            let label = self.label_for(percentile);
            debug!(
                instrument = %instrument_id,
                score = momentum.score,
                percentile,
                label = %label,
                "Valuation scored"
            );
            output.ratings.push(Rating {
                instrument_id: instrument_id.to_string(),
                agent: AgentKind::Valuation,
                label,
                score: logistic(momentum.score, self.config.steepness),
                rationale: format!(
                    "{}-period return {:+.2}%, {}-period volatility {:.2}%, risk-adjusted {:+.3}, percentile {:.0}%",
                    self.config.return_window,
                    momentum.trailing_return * 100.0,
                    self.config.volatility_window,
                    momentum.volatility * 100.0,
                    momentum.score,
                    percentile * 100.0,
                ),
                as_of_date: as_of,
                degraded: false,
            });
        }

        output
    }
}
