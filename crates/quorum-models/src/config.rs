use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rating::AgentKind;
use crate::snapshot::Instrument;

/// Tolerance for the weights-sum-to-one invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("agent weights sum to {0}, expected 1.0")]
    WeightSum(f64),

    #[error("negative weight for {agent}: {weight}")]
    NegativeWeight { agent: AgentKind, weight: f64 },

    #[error("sell threshold {sell} must be below buy threshold {buy}")]
    ThresholdOrder { sell: f64, buy: f64 },

    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("forward window must be at least one day")]
    EmptyForwardWindow,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuorumConfig {
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub agents: AgentsConfig,
    pub backtest: BacktestConfig,
    pub universe: Vec<Instrument>,
}

impl QuorumConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.agents.validate()?;
        self.backtest.validate()
    }
}

/// Configuration for the snapshot store layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite snapshot database (written by data acquisition, read here).
    pub sqlite_path: String,
    /// Maximum number of series kept in the in-memory moka cache.
    pub memory_max_capacity: u64,
    /// How long a series read stays in memory, in seconds.
    pub memory_ttl_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/quorum_snapshot.db".to_string(),
            memory_max_capacity: 10_000,
            memory_ttl_seconds: 300,
        }
    }
}

/// Coordinator weights, one per agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentWeights {
    pub valuation: f64,
    pub sentiment: f64,
    pub fundamental: f64,
}

impl Default for AgentWeights {
    fn default() -> Self {
        Self {
            valuation: 0.4,
            sentiment: 0.3,
            fundamental: 0.3,
        }
    }
}

impl AgentWeights {
    pub fn new(valuation: f64, sentiment: f64, fundamental: f64) -> Self {
        Self {
            valuation,
            sentiment,
            fundamental,
        }
    }

    pub fn weight(&self, agent: AgentKind) -> f64 {
        match agent {
            AgentKind::Valuation => self.valuation,
            AgentKind::Sentiment => self.sentiment,
            AgentKind::Fundamental => self.fundamental,
        }
    }

    pub fn as_map(&self) -> BTreeMap<AgentKind, f64> {
        AgentKind::ALL
            .iter()
            .map(|&agent| (agent, self.weight(agent)))
            .collect()
    }

    pub fn sum(&self) -> f64 {
        self.valuation + self.sentiment + self.fundamental
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for agent in AgentKind::ALL {
            let weight = self.weight(agent);
            if weight < 0.0 || !weight.is_finite() {
                return Err(ConfigError::NegativeWeight { agent, weight });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Stage-level switches and coordinator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub weights: AgentWeights,
    /// BUY cut point on the unit scale; the coordinator uses twice this value.
    pub buy_threshold: f64,
    /// SELL cut point on the unit scale.
    pub sell_threshold: f64,
    pub forward_window_days: u32,
    pub debate_enabled: bool,
    /// Multiplier applied to an isolated agent's score.
    pub debate_dampening: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights: AgentWeights::default(),
            buy_threshold: 0.7,
            sell_threshold: 0.3,
            forward_window_days: 90,
            debate_enabled: true,
            debate_dampening: 0.8,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        check_range("pipeline.buy_threshold", self.buy_threshold, 0.0, 1.0)?;
        check_range("pipeline.sell_threshold", self.sell_threshold, 0.0, 1.0)?;
        if self.sell_threshold >= self.buy_threshold {
            return Err(ConfigError::ThresholdOrder {
                sell: self.sell_threshold,
                buy: self.buy_threshold,
            });
        }
        if self.forward_window_days == 0 {
            return Err(ConfigError::EmptyForwardWindow);
        }
        check_range("pipeline.debate_dampening", self.debate_dampening, 0.0, 1.0)?;
        if self.debate_dampening == 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "pipeline.debate_dampening",
                value: self.debate_dampening,
                min: f64::EPSILON,
                max: 1.0,
            });
        }
        Ok(())
    }

    /// BUY cut point on the 0–2 coordinate scale.
    pub fn buy_cut(&self) -> f64 {
        self.buy_threshold * 2.0
    }

    /// SELL cut point on the 0–2 coordinate scale.
    pub fn sell_cut(&self) -> f64 {
        self.sell_threshold * 2.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    pub valuation: ValuationConfig,
    pub sentiment: SentimentConfig,
    pub fundamental: FundamentalConfig,
}

impl AgentsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.valuation.validate()?;
        self.sentiment.validate()?;
        self.fundamental.validate()
    }
}

/// Risk-adjusted momentum settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValuationConfig {
    pub return_window: usize,
    pub volatility_window: usize,
    /// Steepness of the logistic squash applied to the risk-adjusted score.
    pub steepness: f64,
    pub buy_percentile: f64,
    pub sell_percentile: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            return_window: 20,
            volatility_window: 60,
            steepness: 5.0,
            buy_percentile: 0.70,
            sell_percentile: 0.30,
        }
    }
}

impl ValuationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("valuation.return_window", self.return_window as f64, 2.0, f64::MAX)?;
        check_range(
            "valuation.volatility_window",
            self.volatility_window as f64,
            3.0,
            f64::MAX,
        )?;
        check_range("valuation.buy_percentile", self.buy_percentile, 0.0, 1.0)?;
        check_range("valuation.sell_percentile", self.sell_percentile, 0.0, 1.0)?;
        if self.sell_percentile >= self.buy_percentile {
            return Err(ConfigError::ThresholdOrder {
                sell: self.sell_percentile,
                buy: self.buy_percentile,
            });
        }
        Ok(())
    }

    /// Bars required before the agent will score an instrument.
    pub fn required_history(&self) -> usize {
        self.return_window.max(self.volatility_window)
    }
}

/// News sentiment settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SentimentConfig {
    /// Per-day recency decay factor.
    pub decay: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            decay: 0.9,
            buy_threshold: 0.10,
            sell_threshold: -0.10,
        }
    }
}

impl SentimentConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("sentiment.decay", self.decay, 0.0, 1.0)?;
        check_range("sentiment.buy_threshold", self.buy_threshold, -1.0, 1.0)?;
        check_range("sentiment.sell_threshold", self.sell_threshold, -1.0, 1.0)?;
        if self.sell_threshold >= self.buy_threshold {
            return Err(ConfigError::ThresholdOrder {
                sell: self.sell_threshold,
                buy: self.buy_threshold,
            });
        }
        Ok(())
    }
}

/// Linear scaling range for a metric: `low` maps to 0, `high` to 1.
/// Set `low > high` to invert (lower raw values score higher).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricBounds {
    pub low: f64,
    pub high: f64,
}

impl MetricBounds {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Scale `value` into [0, 1].
    pub fn scale(&self, value: f64) -> f64 {
        let span = self.high - self.low;
        if span == 0.0 {
            return 0.5;
        }
        ((value - self.low) / span).clamp(0.0, 1.0)
    }

    /// Raw value that scales to 0.5.
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SectorBounds {
    pub revenue_growth: MetricBounds,
    pub operating_margin: MetricBounds,
    pub debt_to_equity: MetricBounds,
    pub capex_intensity: MetricBounds,
}

impl Default for SectorBounds {
    fn default() -> Self {
        Self {
            revenue_growth: MetricBounds::new(0.0, 0.20),
            operating_margin: MetricBounds::new(0.10, 0.40),
            debt_to_equity: MetricBounds::new(0.5, 0.1),
            capex_intensity: MetricBounds::new(0.15, 0.04),
        }
    }
}

/// Quality composite settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FundamentalConfig {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    /// Bounds per sector name. `default` is used for unlisted sectors.
    pub sectors: BTreeMap<String, SectorBounds>,
}

impl Default for FundamentalConfig {
    fn default() -> Self {
        let mut sectors = BTreeMap::new();
        sectors.insert("default".to_string(), SectorBounds::default());
        sectors.insert(
            "utilities".to_string(),
            SectorBounds {
                revenue_growth: MetricBounds::new(0.0, 0.08),
                operating_margin: MetricBounds::new(0.10, 0.30),
                debt_to_equity: MetricBounds::new(2.0, 0.8),
                capex_intensity: MetricBounds::new(0.40, 0.15),
            },
        );
        Self {
            buy_threshold: 0.70,
            sell_threshold: 0.40,
            sectors,
        }
    }
}

impl FundamentalConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("fundamental.buy_threshold", self.buy_threshold, 0.0, 1.0)?;
        check_range("fundamental.sell_threshold", self.sell_threshold, 0.0, 1.0)?;
        if self.sell_threshold >= self.buy_threshold {
            return Err(ConfigError::ThresholdOrder {
                sell: self.sell_threshold,
                buy: self.buy_threshold,
            });
        }
        Ok(())
    }

    pub fn bounds_for(&self, sector: &str) -> SectorBounds {
        self.sectors
            .get(sector)
            .or_else(|| self.sectors.get("default"))
            .copied()
            .unwrap_or_default()
    }
}

/// Forward-return evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    /// Largest gap allowed between the forward target date and the bar used
    /// for it. Unset means any bar after the as-of date is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_forward_gap_days: Option<u32>,
    /// Daily observations ending at the as-of date used for the volatility estimate.
    pub volatility_lookback: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            max_forward_gap_days: None,
            volatility_lookback: 60,
        }
    }
}

impl BacktestConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "backtest.volatility_lookback",
            self.volatility_lookback as f64,
            2.0,
            f64::MAX,
        )
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}
