// src/error.rs

//! Unified error handling for the digest engine.
//!
//! Only I/O, configuration and label parsing are fallible. Anomalies inside
//! the engine itself (bad rule tokens, oversize units, empty rank lists)
//! degrade to defaults and are logged instead of raised.

use std::fmt;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Snapshot time label is not a zero-padded `HH-MM`
    #[error("Invalid time label '{label}': {message}")]
    Label { label: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Snapshot storage error
    #[error("Storage error for {context}: {message}")]
    Storage { context: String, message: String },
}

impl AppError {
    /// Create a time label error.
    pub fn label(label: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Label {
            label: label.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error with context.
    pub fn storage(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
