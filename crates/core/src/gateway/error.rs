//! Gateway error types.

use thiserror::Error;

use misbuilder_shared::types::AccountId;

/// Errors raised by a ledger gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backing store rejected or failed a query.
    #[error("ledger query failed: {0}")]
    Query(String),

    /// An account referenced by a lookup does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// An auxiliary query targets a model the gateway does not know.
    #[error("unknown model: {0}")]
    UnknownModel(String),
}
