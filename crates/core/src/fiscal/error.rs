//! Period resolution errors.

use chrono::NaiveDate;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors raised while turning a period specification into a window.
#[derive(Debug, Error)]
pub enum PeriodError {
    /// No normal fiscal period contains the pivot date.
    #[error("No current fiscal period for {date}")]
    NoCurrentPeriod {
        /// The pivot date.
        date: NaiveDate,
    },

    /// The offset moves outside the fiscal calendar.
    #[error("No such fiscal period for {date} with offset {offset}")]
    OutOfRange {
        /// The pivot date.
        date: NaiveDate,
        /// The requested offset.
        offset: i32,
    },

    /// Calendar arithmetic left the representable date range.
    #[error("Date out of range: {date} shifted by {days} days")]
    DateOverflow {
        /// The starting date.
        date: NaiveDate,
        /// The shift in days.
        days: i64,
    },

    /// The period bounds are not a valid window.
    #[error("Invalid period window: {0}")]
    InvalidWindow(String),

    /// Gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
