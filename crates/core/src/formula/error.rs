//! Formula errors.

use thiserror::Error;

/// Coarse classification of an [`EvalError`], driving KPI retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Division or modulo by zero.
    DivisionByZero,
    /// A name that is not (yet) bound in the context.
    UnresolvedName,
    /// Anything else.
    Other,
}

/// Errors raised while parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Malformed formula text.
    #[error("Syntax error at {position}: {message}")]
    Syntax {
        /// Byte offset in the formula.
        position: usize,
        /// What went wrong.
        message: String,
    },

    /// Division or modulo by zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// Name not bound in the context.
    #[error("Name '{0}' is not defined")]
    UnresolvedName(String),

    /// Call to a function outside the whitelist.
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Operand of the wrong type.
    #[error("Type error: {0}")]
    Type(String),

    /// Missing field on a record.
    #[error("No attribute '{attribute}' on {target}")]
    Attribute {
        /// Type of the accessed value.
        target: &'static str,
        /// Requested attribute.
        attribute: String,
    },

    /// Bad argument value (empty sequence, index out of range).
    #[error("Value error: {0}")]
    Value(String),

    /// Decimal overflow.
    #[error("Arithmetic overflow")]
    Overflow,
}

impl EvalError {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> EvalErrorKind {
        match self {
            Self::DivisionByZero => EvalErrorKind::DivisionByZero,
            Self::UnresolvedName(_) => EvalErrorKind::UnresolvedName,
            _ => EvalErrorKind::Other,
        }
    }

    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}
