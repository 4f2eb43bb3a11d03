//! Expression engine errors.

use thiserror::Error;

use crate::domain::DomainParseError;
use crate::gateway::GatewayError;

/// Errors raised by the accounting expression engine.
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// A variable carries a malformed filter clause.
    #[error("Invalid filter in {token}: {source}")]
    Domain {
        /// The whole variable text.
        token: String,
        /// Parse failure.
        #[source]
        source: DomainParseError,
    },

    /// An operation was called out of lifecycle order.
    #[error("Cannot {operation} while the engine is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The engine state at the time.
        state: &'static str,
    },

    /// A variable was not registered before the engine was finalized.
    #[error("Accounting variable was not parsed before finalize: {0}")]
    UnknownVariable(String),

    /// Gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
