//! Report instances: a template computed over a set of period columns.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use misbuilder_shared::types::CompanyId;
use misbuilder_shared::TargetMoveSetting;
use serde::{Deserialize, Serialize};

use super::error::ReportError;
use crate::domain::Domain;
use crate::fiscal::{PeriodSpec, PeriodType};

/// Which journal entries feed a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMove {
    /// Posted entries only.
    #[default]
    Posted,
    /// Every entry.
    All,
}

impl TargetMove {
    /// Move line filter for this target; `True` for [`TargetMove::All`].
    #[must_use]
    pub fn filter(self) -> Domain {
        match self {
            Self::Posted => Domain::eq("move_state", "posted"),
            Self::All => Domain::True,
        }
    }
}

impl From<TargetMoveSetting> for TargetMove {
    fn from(setting: TargetMoveSetting) -> Self {
        match setting {
            TargetMoveSetting::Posted => Self::Posted,
            TargetMoveSetting::All => Self::All,
        }
    }
}

/// One column of a report instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePeriod {
    /// Column name, unique within the instance.
    pub name: String,
    /// Unit of the window.
    #[serde(rename = "type", default)]
    pub kind: PeriodType,
    /// Units between the pivot's unit and the first unit of the window.
    #[serde(default = "default_offset")]
    pub offset: i32,
    /// Number of units.
    #[serde(default = "default_duration")]
    pub duration: u32,
    /// Display order.
    #[serde(default = "default_sequence")]
    pub sequence: i32,
    /// Divides values before comparing them, e.g. the number of months.
    #[serde(default = "default_normalize_factor")]
    pub normalize_factor: u32,
    /// Names of the columns this one is compared with.
    #[serde(default)]
    pub compare_with: Vec<String>,
}

const fn default_offset() -> i32 {
    -1
}

const fn default_duration() -> u32 {
    1
}

const fn default_sequence() -> i32 {
    100
}

const fn default_normalize_factor() -> u32 {
    1
}

impl InstancePeriod {
    /// Creates a column of one fiscal period before the pivot.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PeriodType::FiscalPeriod,
            offset: default_offset(),
            duration: default_duration(),
            sequence: default_sequence(),
            normalize_factor: default_normalize_factor(),
            compare_with: Vec::new(),
        }
    }

    /// Sets the unit, offset and duration.
    #[must_use]
    pub const fn with_window(mut self, kind: PeriodType, offset: i32, duration: u32) -> Self {
        self.kind = kind;
        self.offset = offset;
        self.duration = duration;
        self
    }

    /// Adds a comparison with the column named `other`.
    #[must_use]
    pub fn compared_with(mut self, other: impl Into<String>) -> Self {
        self.compare_with.push(other.into());
        self
    }

    /// Sets the normalize factor.
    #[must_use]
    pub const fn with_normalize_factor(mut self, factor: u32) -> Self {
        self.normalize_factor = factor;
        self
    }

    /// The window specification of this column.
    #[must_use]
    pub const fn spec(&self) -> PeriodSpec {
        PeriodSpec {
            kind: self.kind,
            offset: self.offset,
            duration: self.duration,
        }
    }
}

/// A template computed for a company over a set of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportInstance {
    /// Instance name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Base date of every column; today when absent.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Company whose ledger is read.
    pub company_id: CompanyId,
    /// Which entries are included.
    #[serde(default)]
    pub target_move: TargetMove,
    /// Columns.
    pub periods: Vec<InstancePeriod>,
}

impl ReportInstance {
    /// Returns the base date, falling back to `today`.
    #[must_use]
    pub fn pivot_date(&self, today: NaiveDate) -> NaiveDate {
        self.date.unwrap_or(today)
    }

    /// Columns in sequence order; ties keep declaration order.
    #[must_use]
    pub fn sorted_periods(&self) -> Vec<&InstancePeriod> {
        let mut periods: Vec<&InstancePeriod> = self.periods.iter().collect();
        periods.sort_by_key(|p| p.sequence);
        periods
    }

    /// Looks up a column by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPeriod` if there is none.
    pub fn period(&self, name: &str) -> Result<&InstancePeriod, ReportError> {
        self.periods
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ReportError::UnknownPeriod(name.to_string()))
    }

    /// Checks durations, factors, name uniqueness and comparison links.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` or `UnknownComparison`.
    pub fn validate(&self) -> Result<(), ReportError> {
        let mut names = BTreeSet::new();
        for period in &self.periods {
            let invalid = |reason: &str| ReportError::InvalidPeriod {
                name: period.name.clone(),
                reason: reason.to_string(),
            };
            if period.duration == 0 {
                return Err(invalid("duration must be positive"));
            }
            if period.normalize_factor == 0 {
                return Err(invalid("normalize factor must be positive"));
            }
            if !names.insert(period.name.as_str()) {
                return Err(invalid("name must be unique within the report"));
            }
        }
        for period in &self.periods {
            if let Some(target) = period.compare_with.iter().find(|t| !names.contains(t.as_str())) {
                return Err(ReportError::UnknownComparison {
                    period: period.name.clone(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(periods: Vec<InstancePeriod>) -> ReportInstance {
        ReportInstance {
            name: "Monthly".into(),
            description: None,
            date: None,
            company_id: CompanyId::new(),
            target_move: TargetMove::Posted,
            periods,
        }
    }

    #[test]
    fn test_period_defaults() {
        let period: InstancePeriod = serde_json::from_str(r#"{"name": "Last month"}"#).unwrap();
        assert_eq!(period, InstancePeriod::new("Last month"));
        assert_eq!(period.spec().offset, -1);
        assert_eq!(period.spec().duration, 1);
        assert_eq!(period.normalize_factor, 1);
    }

    #[test]
    fn test_validate_accepts_linked_columns() {
        let report = instance(vec![
            InstancePeriod::new("current").compared_with("previous"),
            InstancePeriod::new("previous").with_window(PeriodType::FiscalPeriod, -2, 1),
        ]);
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_columns() {
        let zero = instance(vec![InstancePeriod::new("p").with_window(PeriodType::Day, 0, 0)]);
        assert!(matches!(zero.validate(), Err(ReportError::InvalidPeriod { .. })));

        let factor = instance(vec![InstancePeriod::new("p").with_normalize_factor(0)]);
        assert!(matches!(factor.validate(), Err(ReportError::InvalidPeriod { .. })));

        let twice = instance(vec![InstancePeriod::new("p"), InstancePeriod::new("p")]);
        assert!(matches!(twice.validate(), Err(ReportError::InvalidPeriod { .. })));

        let dangling = instance(vec![InstancePeriod::new("p").compared_with("q")]);
        assert!(matches!(
            dangling.validate(),
            Err(ReportError::UnknownComparison { target, .. }) if target == "q"
        ));
    }

    #[test]
    fn test_pivot_date_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let mut report = instance(Vec::new());
        assert_eq!(report.pivot_date(today), today);
        report.date = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert_eq!(report.pivot_date(today), report.date.unwrap());
    }

    #[test]
    fn test_posted_target_filters_move_state() {
        assert_eq!(TargetMove::Posted.filter(), Domain::eq("move_state", "posted"));
        assert!(TargetMove::All.filter().is_true());
        assert_eq!(TargetMove::from(TargetMoveSetting::All), TargetMove::All);
    }
}
