//! Accounting expression processing.
//!
//! KPI formulas embed accounting variables such as `bal[70]`, `bali[70,60]`
//! or `bale[1%]`. This module parses them, resolves their account codes,
//! batches the ledger queries they need and substitutes the results back
//! into the formulas.

pub mod accounts;
pub mod error;
pub mod processor;
pub mod token;

pub use accounts::AccountResolver;
pub use error::ExpressionError;
pub use processor::{EngineState, ExpressionEngine, ModeFilters};
pub use token::{AccountingVariable, Field, Mode, QueryKey};

#[cfg(test)]
mod tests;
#[cfg(test)]
mod props;
