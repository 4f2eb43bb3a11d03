//! Report computation settings and results.

use chrono_tz::Tz;
use misbuilder_shared::ReportConfig;
use serde::Serialize;

use super::error::ReportError;
use super::evaluator::{KpiCell, Markers};
use super::kpi::Kpi;
use crate::domain::Domain;
use crate::gateway::{GatewayError, LedgerGateway, MoveLine};

/// Settings of a report computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    /// Timezone turning date windows into timestamp windows.
    pub timezone: Tz,
    /// chrono format of dates in column headers.
    pub date_format: String,
    /// Texts of failed cells.
    pub markers: Markers,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            date_format: "%Y-%m-%d".to_string(),
            markers: Markers::default(),
        }
    }
}

impl ReportSettings {
    /// Builds settings from the `report` configuration section.
    ///
    /// # Errors
    ///
    /// Returns `Timezone` for an unknown timezone name.
    pub fn from_config(config: &ReportConfig) -> Result<Self, ReportError> {
        let timezone = config
            .timezone
            .parse::<Tz>()
            .map_err(|_| ReportError::Timezone(config.timezone.clone()))?;
        Ok(Self {
            timezone,
            date_format: config.date_format.clone(),
            markers: Markers {
                div_by_zero: config.div_by_zero_marker.clone(),
                error: config.error_marker.clone(),
            },
        })
    }
}

/// Header of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCell {
    /// Column name.
    pub name: String,
    /// Date label; empty for comparison columns.
    pub date: String,
}

/// One cell of a report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnCell {
    /// Value of a period column.
    Value(KpiCell),
    /// Rendered comparison of two period columns.
    Comparison {
        /// Display text; empty when there is nothing to compare.
        rendered: String,
    },
}

impl ColumnCell {
    /// Display text of the cell.
    #[must_use]
    pub fn rendered(&self) -> &str {
        match self {
            Self::Value(cell) => &cell.rendered,
            Self::Comparison { rendered } => rendered,
        }
    }
}

/// One KPI across all columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// KPI name.
    pub name: String,
    /// KPI description.
    pub label: String,
    /// Style of the row.
    pub default_style: Option<String>,
    /// Period columns first, then comparison columns.
    pub cells: Vec<ColumnCell>,
}

impl ReportRow {
    pub(crate) fn new(kpi: &Kpi) -> Self {
        Self {
            name: kpi.name.clone(),
            label: kpi.description.clone(),
            default_style: kpi.default_style.clone(),
            cells: Vec::new(),
        }
    }
}

/// The computed report: one header row and one row per KPI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMatrix {
    /// Column headers.
    pub header: Vec<HeaderCell>,
    /// KPI rows in sequence order.
    pub rows: Vec<ReportRow>,
}

impl ReportMatrix {
    /// Looks up the row of a KPI.
    #[must_use]
    pub fn row(&self, name: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Looks up the cell of a KPI in the column named `column`.
    #[must_use]
    pub fn cell(&self, name: &str, column: &str) -> Option<&ColumnCell> {
        let index = self.header.iter().position(|h| h.name == column)?;
        self.row(name)?.cells.get(index)
    }
}

/// Listing of the ledger rows behind a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrilldownAction {
    /// Title, `"<formula> - <column>"`.
    pub name: String,
    /// Model listed.
    pub model: String,
    /// Move line filter.
    pub domain: Domain,
}

impl DrilldownAction {
    /// Fetches the listed move lines.
    ///
    /// # Errors
    ///
    /// Returns gateway errors.
    pub fn lines<G: LedgerGateway + ?Sized>(&self, gateway: &G) -> Result<Vec<MoveLine>, GatewayError> {
        gateway.search_move_lines(&self.domain)
    }
}
