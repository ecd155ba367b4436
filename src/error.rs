//! Error types for the rating pipeline
//!
//! Fatal conditions carry the pipeline stage that raised them so the caller
//! can tell which input to correct before re-running.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Main error type for shop-rater operations
#[derive(Error, Debug)]
pub enum RaterError {
    /// Required columns missing, mistyped, out of order or holding nulls
    #[error("Schema mismatch during {stage}: {detail}")]
    SchemaMismatch { stage: &'static str, detail: String },

    /// Too few rows to form non-empty train and test sets
    #[error("Insufficient data during {stage}: {rows} row(s) available")]
    InsufficientData { stage: &'static str, rows: usize },

    /// A prediction form value that is missing, non-numeric or out of range
    #[error("Invalid value for '{field}': {reason}")]
    MalformedQueryInput { field: String, reason: String },

    /// Configuration values outside their valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Data frame operation failed
    #[error("Data frame error: {0}")]
    Polars(#[from] PolarsError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RaterError {
    pub(crate) fn schema(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            stage,
            detail: detail.into(),
        }
    }

    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedQueryInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for shop-rater operations
pub type Result<T> = std::result::Result<T, RaterError>;
