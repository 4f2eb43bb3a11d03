//! Management reports.
//!
//! A [`ReportTemplate`] lists KPIs and auxiliary queries; a [`ReportInstance`]
//! applies it to a company over period columns. [`ReportService`] computes
//! the resulting [`ReportMatrix`] and the drill-down of any cell.

pub mod error;
pub mod evaluator;
pub mod instance;
pub mod kpi;
pub mod render;
pub mod service;
pub mod template;
pub mod types;

pub use error::ReportError;
pub use evaluator::{ColumnValues, KpiCell, KpiEvaluator, Markers};
pub use instance::{InstancePeriod, ReportInstance, TargetMove};
pub use kpi::{CompareMethod, Divider, Kpi, KpiType};
pub use render::{format_number, render_comparison, render_value};
pub use service::{company_restriction, mode_filters, query_filter, ReportService, MOVE_LINE_MODEL};
pub use template::{is_identifier, python_var, DateType, Query, ReportTemplate};
pub use types::{ColumnCell, DrilldownAction, HeaderCell, ReportMatrix, ReportRow, ReportSettings};
