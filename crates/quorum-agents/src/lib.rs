pub mod agent;
pub mod backtest;
pub mod coordinator;
pub mod debate;
pub mod error;
pub mod fundamental;
pub mod harness;
pub mod lexicon;
pub mod pipeline;
pub mod sentiment;
pub mod stats;
pub mod valuation;

pub mod test_support;

pub use agent::{Agent, AgentOutput, ScoringAgent};
pub use backtest::{BacktestEngine, BacktestOutcome};
pub use coordinator::Coordinator;
pub use debate::{DebateModerator, DebateOutcome};
pub use error::{AgentError, PipelineError};
pub use fundamental::FundamentalAgent;
pub use harness::{
    ComparisonReport, InstrumentStability, StabilityHarness, StabilityReport, Variant,
    VariantRow, WeightScenario,
};
pub use lexicon::FinancialLexicon;
pub use pipeline::Pipeline;
pub use sentiment::SentimentAgent;
pub use valuation::ValuationAgent;
