// src/error.rs

//! Unified error handling for the relay.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fetching the notice list failed; the cycle is skipped
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// A single send to the downstream channel failed
    #[error("Delivery to {destination} failed: {message}")]
    Delivery {
        destination: String,
        message: String,
    },

    /// An operation exceeded its time bound
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// The persisted ledger could not be decoded
    #[error("Corrupt ledger at {path}: {message}")]
    CorruptLedger { path: String, message: String },

    /// A background task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The scheduler is no longer accepting commands
    #[error("Scheduler unavailable")]
    SchedulerClosed,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a delivery error for a destination.
    pub fn delivery(destination: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delivery {
            destination: destination.into(),
            message: message.to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Create a corrupt ledger error.
    pub fn corrupt_ledger(path: &Path, message: impl fmt::Display) -> Self {
        Self::CorruptLedger {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the error is a network failure on the source or the gateway;
    /// it costs one cycle or one send and the next attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Fetch { .. } | Self::Timeout { .. } | Self::Delivery { .. }
        )
    }
}
