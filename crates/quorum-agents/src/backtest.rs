use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use quorum_models::{
    bar_on_or_before, AttributionRecord, BacktestConfig, CoordinatorDecision, Diagnostic,
    DiagnosticKind, MarketSnapshot, PipelineConfig, PortfolioResult, PriceBar, Stage,
};
use tracing::{info, warn};

use crate::stats::{sample_std, simple_return};

/// Portfolio evaluation for one as-of date.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestOutcome {
    pub portfolio: PortfolioResult,
    pub attribution: Vec<AttributionRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Equal-weight BUY portfolio against the equal-weight universe.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    forward_window_days: u32,
    max_forward_gap_days: Option<u32>,
    volatility_lookback: usize,
}

impl BacktestEngine {
    pub fn new(forward_window_days: u32, volatility_lookback: usize) -> Self {
        Self {
            forward_window_days,
            max_forward_gap_days: None,
            volatility_lookback,
        }
    }

    /// Treat a forward bar more than `days` before the target date as missing.
    pub fn with_max_forward_gap(mut self, days: Option<u32>) -> Self {
        self.max_forward_gap_days = days;
        self
    }

    pub fn from_config(pipeline: &PipelineConfig, backtest: &BacktestConfig) -> Self {
        Self::new(pipeline.forward_window_days, backtest.volatility_lookback)
            .with_max_forward_gap(backtest.max_forward_gap_days)
    }

    /// Return from the close on or before `as_of` to the close on or before
    /// `as_of + window`. `None` when either price is unusable.
    pub fn forward_return(&self, series: &[PriceBar], as_of: NaiveDate) -> Option<f64> {
        let base = bar_on_or_before(series, as_of)?.close_f64();
        if base <= 0.0 {
            return None;
        }
        let target = as_of + Duration::days(i64::from(self.forward_window_days));
        let forward = bar_on_or_before(series, target)?;
        if forward.date <= as_of {
            return None;
        }
        if let Some(max_gap) = self.max_forward_gap_days {
            if (target - forward.date).num_days() > i64::from(max_gap) {
                return None;
            }
        }
        Some(simple_return(base, forward.close_f64()))
    }

    pub fn run(
        &self,
        snapshot: &MarketSnapshot,
        decisions: &[CoordinatorDecision],
        as_of: NaiveDate,
    ) -> BacktestOutcome {
        let mut diagnostics = Vec::new();
        let mut missing_instruments = BTreeSet::new();

        let buys: BTreeSet<&str> = decisions
            .iter()
            .filter(|d| d.is_buy())
            .map(|d| d.instrument_id.as_str())
            .collect();

        let mut forward: BTreeMap<&str, f64> = BTreeMap::new();
        for instrument_id in snapshot.instrument_ids() {
            match self.forward_return(snapshot.price_series(instrument_id), as_of) {
                Some(r) => {
                    forward.insert(instrument_id, r);
                }
                None => {
                    let scope = if buys.contains(instrument_id) {
                        "excluded from portfolio, counted as 0 in benchmark"
                    } else {
                        "counted as 0 in benchmark"
                    };
                    warn!(instrument = %instrument_id, "No usable forward price");
                    missing_instruments.insert(instrument_id.to_string());
                    diagnostics.push(
                        Diagnostic::new(
                            Stage::Backtest,
                            DiagnosticKind::MissingForwardPrice,
                            format!(
                                "no usable price {} days after {as_of}, {scope}",
                                self.forward_window_days
                            ),
                        )
                        .for_instrument(instrument_id),
                    );
                }
            }
        }

        let universe_size = snapshot.instrument_ids().count();
        let benchmark_return = if universe_size == 0 {
            0.0
        } else {
            forward.values().sum::<f64>() / universe_size as f64
        };

        let held: Vec<(&str, f64)> = buys
            .iter()
            .filter_map(|id| forward.get(id).map(|&r| (*id, r)))
            .collect();

        let mut attribution = Vec::with_capacity(held.len());
        if held.is_empty() {
            let message = if buys.is_empty() {
                "no BUY positions, portfolio held in cash"
            } else {
                "no BUY position has a forward price, portfolio held in cash"
            };
            warn!(as_of = %as_of, "{message}");
            diagnostics.push(Diagnostic::new(
                Stage::Backtest,
                DiagnosticKind::NoBuyPositions,
                message,
            ));
        } else {
            let weight = 1.0 / held.len() as f64;
            for &(instrument_id, forward_return) in &held {
                attribution.push(AttributionRecord {
                    instrument_id: instrument_id.to_string(),
                    weight_in_portfolio: weight,
                    forward_return,
                    contribution: weight * forward_return,
                });
            }
        }

        let portfolio_return: f64 = attribution.iter().map(|a| a.contribution).sum();

        let sharpe_proxy = if attribution.is_empty() {
            0.0
        } else {
            let weights: Vec<(&str, f64)> = attribution
                .iter()
                .map(|a| (a.instrument_id.as_str(), a.weight_in_portfolio))
                .collect();
            match self.period_volatility(snapshot, &weights, as_of) {
                Some(vol) if vol > 0.0 => portfolio_return / vol,
                _ => {
                    warn!(as_of = %as_of, "Not enough return history for the Sharpe proxy");
                    diagnostics.push(Diagnostic::new(
                        Stage::Backtest,
                        DiagnosticKind::InsufficientVolatilityHistory,
                        "insufficient daily return history for volatility, Sharpe proxy set to 0",
                    ));
                    0.0
                }
            }
        };

        info!(
            as_of = %as_of,
            positions = attribution.len(),
            portfolio_return,
            benchmark_return,
            sharpe_proxy,
            "Backtest complete"
        );

        let portfolio = PortfolioResult {
            as_of_date: as_of,
            forward_window_days: self.forward_window_days,
            portfolio_return,
            benchmark_return,
            active_return: portfolio_return - benchmark_return,
            sharpe_proxy,
            position_count: attribution.len(),
            missing_instruments,
            diagnostics: diagnostics.iter().map(|d| d.message.clone()).collect(),
        };

        BacktestOutcome {
            portfolio,
            attribution,
            diagnostics,
        }
    }

    /// Daily returns of the weighted portfolio over the trailing lookback,
    /// on dates every constituent traded, ending at `as_of`.
    pub fn daily_returns(
        &self,
        snapshot: &MarketSnapshot,
        weights: &[(&str, f64)],
        as_of: NaiveDate,
    ) -> Vec<f64> {
        let closes: Vec<BTreeMap<NaiveDate, f64>> = weights
            .iter()
            .map(|(id, _)| {
                snapshot
                    .prices_through(id, as_of)
                    .iter()
                    .map(|b| (b.date, b.close_f64()))
                    .collect()
            })
            .collect();

        let Some((first, rest)) = closes.split_first() else {
            return Vec::new();
        };
        let common: Vec<NaiveDate> = first
            .keys()
            .filter(|d| rest.iter().all(|c| c.contains_key(d)))
            .copied()
            .collect();
        let start = common.len().saturating_sub(self.volatility_lookback + 1);

        common[start..]
            .windows(2)
            .map(|pair| {
                weights
                    .iter()
                    .zip(&closes)
                    .map(|((_, w), series)| w * simple_return(series[&pair[0]], series[&pair[1]]))
                    .sum::<f64>()
            })
            .collect()
    }

    /// Sample std of daily portfolio returns scaled to the forward window by
    /// `sqrt(window / observations)`.
    fn period_volatility(
        &self,
        snapshot: &MarketSnapshot,
        weights: &[(&str, f64)],
        as_of: NaiveDate,
    ) -> Option<f64> {
        let returns = self.daily_returns(snapshot, weights, as_of);
        if returns.len() < 2 {
            return None;
        }
        let scale = f64::from(self.forward_window_days) / returns.len() as f64;
        Some(sample_std(&returns) * scale.sqrt())
    }
}
