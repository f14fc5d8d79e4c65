//! Error types shared across the library.

use thiserror::Error;

/// A single invalid configuration value, with the dotted path of the field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_kwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    /// Creates a configuration error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by series construction, ingestion, and simulation.
///
/// Invariant violations inside the dispatch engine are not represented here:
/// those are programming defects and abort through assertions.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid battery spec, mismatched interval duration, or bad series values.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Input data is missing a required column.
    #[error("schema error: missing required column `{column}`")]
    Schema { column: String },

    /// A field of an input record could not be interpreted.
    #[error("row {row}: invalid `{column}` value \"{value}\"")]
    InvalidRecord {
        row: usize,
        column: String,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimError {
    /// Shorthand for a [`SimError::Configuration`] built from a field path and message.
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration(ConfigError::new(field, message))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
