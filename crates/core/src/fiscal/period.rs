//! Fiscal period records.

use chrono::NaiveDate;
use misbuilder_shared::types::{CompanyId, FiscalPeriodId};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainValue, FieldSource};

/// A fiscal period of a company's calendar.
///
/// Special periods hold opening entries and carry forward the balances of
/// the previous fiscal year. They usually share their start date with the
/// first normal period of the year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    /// Unique identifier.
    pub id: FiscalPeriodId,
    /// Company owning the calendar.
    pub company_id: Option<CompanyId>,
    /// Period name (e.g., "03/2024").
    pub name: String,
    /// Start date of the period.
    pub start_date: NaiveDate,
    /// End date of the period, inclusive.
    pub end_date: NaiveDate,
    /// Opening/closing period.
    #[serde(default)]
    pub special: bool,
}

impl FiscalPeriod {
    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

impl FieldSource for FiscalPeriod {
    fn field(&self, name: &str) -> Option<DomainValue> {
        let value = match name {
            "id" => DomainValue::Id(self.id.into_inner()),
            "company_id" => DomainValue::opt_id(self.company_id),
            "name" => DomainValue::Str(self.name.clone()),
            "start_date" => DomainValue::Date(self.start_date),
            "end_date" => DomainValue::Date(self.end_date),
            "special" => DomainValue::Bool(self.special),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    fn march() -> FiscalPeriod {
        FiscalPeriod {
            id: FiscalPeriodId::new(),
            company_id: None,
            name: "03/2024".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            special: false,
        }
    }

    #[test]
    fn test_contains_date_is_inclusive() {
        let period = march();
        assert!(period.contains_date(period.start_date));
        assert!(period.contains_date(period.end_date));
        assert!(!period.contains_date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
    }

    #[test]
    fn test_period_is_filterable() {
        let period = march();
        assert!(Domain::eq("special", false).matches(&period));
        assert!(Domain::eq("company_id", DomainValue::Null).matches(&period));
        assert!(Domain::eq("start_date", "2024-03-01").matches(&period));
    }
}
