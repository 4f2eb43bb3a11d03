//! Financial report generation.
//!
//! Reports computed directly from the ledger, next to the KPI reports of
//! [`crate::mis`]:
//! - Account prefix lines
//! - Journal report
//! - Open invoices of receivable and payable accounts

pub mod service;
pub mod types;


pub use service::{prefix_filter, validate_prefix_line, FinancialReportService};
pub use types::*;
