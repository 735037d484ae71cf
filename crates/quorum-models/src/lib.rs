pub mod config;
pub mod decision;
pub mod diagnostics;
pub mod portfolio;
pub mod rating;
pub mod snapshot;
pub mod store_schema;

pub use config::{
    AgentWeights, AgentsConfig, BacktestConfig, ConfigError, FundamentalConfig, MetricBounds,
    PipelineConfig, QuorumConfig, SectorBounds, SentimentConfig, StoreConfig, ValuationConfig,
};
pub use decision::{CoordinatorDecision, DebateRecord};
pub use diagnostics::{Diagnostic, DiagnosticKind, Stage};
pub use portfolio::{
    AttributionRecord, PerformanceRow, PickRow, PortfolioResult, RunReport, REPORT_SCHEMA_VERSION,
};
pub use rating::{AgentKind, Rating, RatingLabel};
pub use snapshot::{
    bar_on_or_before, FundamentalRecord, Instrument, MarketSnapshot, NewsItem, PriceBar,
};
pub use store_schema::SeriesKind;
