//! Error types for the forecast_accuracy crate

use thiserror::Error;

/// Custom error types for the forecast_accuracy crate
#[derive(Debug, Error)]
pub enum AccuracyError {
    /// Error related to input validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error related to observation or forecast data
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from the backing store
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Error related to tolerance configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Lookup of a forecast id the store does not know
    #[error("Forecast not found: {0}")]
    ForecastNotFound(i64),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Error from JSON serialization
    #[error("JSON error: {0}")]
    JsonError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, AccuracyError>;

impl From<rusqlite::Error> for AccuracyError {
    fn from(err: rusqlite::Error) -> Self {
        AccuracyError::StorageError(err.to_string())
    }
}

impl From<csv::Error> for AccuracyError {
    fn from(err: csv::Error) -> Self {
        AccuracyError::CsvError(err.to_string())
    }
}

impl From<serde_json::Error> for AccuracyError {
    fn from(err: serde_json::Error) -> Self {
        AccuracyError::JsonError(err.to_string())
    }
}
