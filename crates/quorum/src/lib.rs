//! Quorum - multi-agent equity rating with forward-return attribution
//!
//! Three scoring agents rate every instrument in a universe, a debate pass
//! dampens isolated votes, a weighted coordinator picks BUY/HOLD/SELL, and a
//! backtest measures the equal-weight BUY portfolio against the universe.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use quorum::models::{QuorumConfig, RunReport};
//! use quorum::agents::{Pipeline, StabilityHarness, WeightScenario};
//! use quorum::store::{SnapshotReader, SqliteStore};
//! ```

pub use quorum_agents as agents;
pub use quorum_models as models;
pub use quorum_store as store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use quorum_agents::{Pipeline, PipelineError};
use quorum_models::{QuorumConfig, RunReport};
use quorum_store::{SnapshotReader, SqliteStore};

/// Read and validate a TOML configuration file.
pub fn load_config(path: &str) -> Result<QuorumConfig, anyhow::Error> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    let config: QuorumConfig =
        toml::from_str(&raw).with_context(|| format!("Failed to parse config: {path}"))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Open the snapshot store named in the configuration, read-only.
pub fn build_reader(config: &QuorumConfig) -> Result<SnapshotReader, anyhow::Error> {
    let sqlite = SqliteStore::open(&config.store.sqlite_path)
        .with_context(|| format!("Failed to open snapshot store: {}", config.store.sqlite_path))?;
    Ok(SnapshotReader::new(
        sqlite,
        config.store.memory_max_capacity,
        Duration::from_secs(config.store.memory_ttl_seconds),
    ))
}

/// Build a pipeline over the production agents.
pub fn build_pipeline(config: &QuorumConfig) -> Result<Pipeline, anyhow::Error> {
    config.validate().context("Invalid configuration")?;
    Ok(Pipeline::new(config.clone()))
}

/// Load the configured universe from the store and run one as-of date.
pub async fn evaluate(
    pipeline: &Pipeline,
    reader: &SnapshotReader,
    as_of: NaiveDate,
) -> Result<RunReport, PipelineError> {
    let snapshot = reader.load_snapshot(&pipeline.config().universe).await?;
    pipeline.run(Arc::new(snapshot), as_of).await
}
