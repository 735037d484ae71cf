use quorum_models::ConfigError;
use thiserror::Error;

/// Per-instrument agent failures. These never abort a run; the agent turns
/// them into diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("insufficient data: {instrument_id} has {available} bars, {required} required")]
    InsufficientHistory {
        instrument_id: String,
        available: usize,
        required: usize,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] quorum_store::StoreError),

    #[error("Run task failed: {0}")]
    Task(String),
}
