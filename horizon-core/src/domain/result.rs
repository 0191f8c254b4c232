//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Aggregator unavailable: {0}")]
    AggregatorUnavailable(String),

    #[error("Exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("An active link already exists for institution {institution_id}")]
    DuplicateLink { institution_id: String },

    #[error("Invalid page request: {0}")]
    InvalidPageRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an unauthenticated error
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    /// Create an aggregator unavailable error
    pub fn aggregator_unavailable(msg: impl Into<String>) -> Self {
        Self::AggregatorUnavailable(msg.into())
    }

    /// Create an exchange failed error
    pub fn exchange_failed(msg: impl Into<String>) -> Self {
        Self::ExchangeFailed(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether retrying the same call can succeed without restarting the flow.
    ///
    /// Holds for transport failures and for stale sessions (the caller signs
    /// in again and repeats the call). A failed exchange is not retryable:
    /// recovery starts over from a fresh link token.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_) | Self::AggregatorUnavailable(_)
        )
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
