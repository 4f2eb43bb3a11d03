//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input file or record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (bad template, bad instance, bad input).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fiscal calendar could not produce the requested window.
    #[error("Period resolution error: {0}")]
    PeriodResolution(String),

    /// Ledger gateway failure.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 66,
            Self::Validation(_) | Self::PeriodResolution(_) => 65,
            Self::Configuration(_) => 78,
            Self::Ledger(_) => 74,
            Self::Internal(_) => 70,
        }
    }

    /// Returns the stable error code used in machine-readable output.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::PeriodResolution(_) => "PERIOD_RESOLUTION_ERROR",
            Self::Ledger(_) => "LEDGER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
