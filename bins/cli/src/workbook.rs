//! Workbook files: a ledger fixture together with the report definitions run
//! against it.

use std::fs;
use std::path::Path;

use anyhow::Context;
use misbuilder_core::gateway::InMemoryLedger;
use misbuilder_core::mis::{ReportInstance, ReportTemplate};
use misbuilder_core::reports::PrefixLine;
use serde::Deserialize;

/// Contents of a workbook file.
#[derive(Debug, Deserialize)]
pub struct Workbook {
    /// Ledger the reports read.
    pub ledger: InMemoryLedger,
    /// KPI template.
    pub template: ReportTemplate,
    /// Instance of the template.
    pub instance: ReportInstance,
    /// Account prefix report lines.
    #[serde(default)]
    pub prefix_lines: Vec<PrefixLine>,
}

impl Workbook {
    /// Reads and parses a workbook, deriving missing KPI names.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
        let mut workbook: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse '{}'", path.display()))?;
        workbook.template.normalize();
        Ok(workbook)
    }
}
