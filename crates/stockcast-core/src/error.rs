//! Error types for the stockcast pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, StockcastError>;

/// Error types for pipeline operations.
///
/// Only configuration and input validation errors cross the pipeline
/// boundary. Per-SKU failures (short series, models that do not converge)
/// are recorded in the output data instead.
#[derive(Error, Debug)]
pub enum StockcastError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Model {model} failed to fit: {reason}")]
    ModelFit { model: String, reason: String },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl StockcastError {
    /// Build an `InvalidParameter` error from any displayable value.
    pub fn invalid_parameter(
        param: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        StockcastError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error describes a series that is too short, as opposed to
    /// a numerical failure.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, StockcastError::InsufficientData { .. })
    }
}
