//! Domain parsing errors.

use thiserror::Error;

/// Errors raised while parsing a serialized domain literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainParseError {
    /// The literal is not well formed.
    #[error("Malformed domain at position {position}: {message}")]
    Syntax {
        /// Character offset of the failure.
        position: usize,
        /// What was expected.
        message: String,
    },

    /// The operator of a condition is not supported.
    #[error("Unsupported domain operator: {operator}")]
    UnknownOperator {
        /// The operator text.
        operator: String,
    },

    /// A bare value that is neither a number nor a known constant.
    #[error("Unsupported domain value: {value}")]
    UnsupportedValue {
        /// The value text.
        value: String,
    },
}
