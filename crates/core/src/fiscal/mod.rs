//! Fiscal calendar and period windows.

pub mod error;
pub mod period;
pub mod resolver;

pub use error::PeriodError;
pub use period::FiscalPeriod;
pub use resolver::{PeriodResolver, PeriodSpec, PeriodType, ResolvedWindow};
