//! Report errors.

use chrono::NaiveDate;
use misbuilder_shared::AppError;
use thiserror::Error;

use crate::domain::DomainParseError;
use crate::expression::ExpressionError;
use crate::fiscal::PeriodError;
use crate::gateway::GatewayError;

/// Errors raised while validating or computing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A KPI or query name is not an identifier.
    #[error("Invalid name '{0}': must be a valid identifier")]
    InvalidName(String),

    /// Two KPIs or queries share a name.
    #[error("Duplicate name '{0}' in report template")]
    DuplicateName(String),

    /// An instance period is misconfigured.
    #[error("Invalid period '{name}': {reason}")]
    InvalidPeriod {
        /// Period name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A comparison link targets a period that does not exist.
    #[error("Period '{period}' compares with unknown period '{target}'")]
    UnknownComparison {
        /// Period holding the link.
        period: String,
        /// Missing target.
        target: String,
    },

    /// A period name passed by the caller does not exist.
    #[error("Report instance has no period named '{0}'")]
    UnknownPeriod(String),

    /// An auxiliary query or report line carries a malformed filter.
    #[error("Invalid filter in '{owner}': {source}")]
    Domain {
        /// Query or line name.
        owner: String,
        /// Parse failure.
        #[source]
        source: DomainParseError,
    },

    /// An account prefix line is misconfigured.
    #[error("Invalid prefix line '{name}': {reason}")]
    InvalidPrefixLine {
        /// Line name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Invalid date range.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date.
        start: NaiveDate,
        /// End date.
        end: NaiveDate,
    },

    /// Unknown IANA timezone name.
    #[error("Unknown timezone '{0}'")]
    Timezone(String),

    /// Period window resolution failed.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// Expression engine failure.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::UnknownPeriod(_) => Self::NotFound(err.to_string()),
            ReportError::Period(_) => Self::PeriodResolution(err.to_string()),
            ReportError::Gateway(_) | ReportError::Expression(ExpressionError::Gateway(_)) => {
                Self::Ledger(err.to_string())
            }
            ReportError::Timezone(_) => Self::Configuration(err.to_string()),
            ReportError::Expression(ExpressionError::InvalidState { .. }) => Self::Internal(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}
