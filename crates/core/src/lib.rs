//! Core logic of the MIS builder.
//!
//! This crate has no storage or transport dependencies. Ledger data is read
//! through the gateway traits, so every report runs the same against the
//! in-memory ledger and a real backend.
//!
//! # Modules
//!
//! - `domain` - Record filters, their text syntax and in-memory matching
//! - `gateway` - Ledger read traits, model records and the in-memory ledger
//! - `fiscal` - Fiscal periods and resolution of relative period windows
//! - `expression` - Accounting expressions (`bal[70%]`) and their queries
//! - `formula` - Sandboxed KPI formula language
//! - `mis` - KPI templates, instances, evaluation and rendering
//! - `reports` - Account prefix lines and the journal report

pub mod domain;
pub mod expression;
pub mod fiscal;
pub mod formula;
pub mod gateway;
pub mod mis;
pub mod reports;

#[cfg(test)]
mod test_support;
