//! Report templates and auxiliary queries.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ReportError;
use super::kpi::Kpi;
use crate::domain::{parse_domain, Domain};

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[_A-Za-z][_A-Za-z0-9]*$").unwrap_or_else(|e| unreachable!("identifier pattern is valid: {e}"))
});

/// Returns true if `name` can be bound in a formula.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Derives an identifier from free text: non-word characters become `_`, a
/// leading digit is prefixed with `_`, and the result is lower-cased.
#[must_use]
pub fn python_var(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    if text.starts_with(|c: char| c.is_ascii_digit()) {
        out.push('_');
    }
    out.extend(
        text.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c.to_ascii_lowercase() } else { '_' }),
    );
    out
}

/// Type of the column filtered by a query's date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateType {
    /// Calendar date, compared inclusively.
    #[default]
    Date,
    /// Timestamp, compared against local midnights.
    DateTime,
}

/// An auxiliary query whose rows are exposed to formulas as a list of
/// records named after the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Identifier.
    pub name: String,
    /// Model (record set) to read.
    pub model: String,
    /// Fields to fetch.
    pub fields: Vec<String>,
    /// Field restricted to the column window.
    pub date_field: String,
    /// Type of `date_field`.
    #[serde(default)]
    pub date_type: DateType,
    /// Serialized filter, in the literal form of formula filters.
    #[serde(default)]
    pub domain: Option<String>,
    /// Whether the model carries a company.
    #[serde(default)]
    pub company_scoped: bool,
}

impl Query {
    /// Parses the query's own filter.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Domain` if it is malformed.
    pub fn filter(&self) -> Result<Domain, ReportError> {
        match &self.domain {
            Some(text) => parse_domain(text).map_err(|source| ReportError::Domain {
                owner: self.name.clone(),
                source,
            }),
            None => Ok(Domain::True),
        }
    }
}

/// A report template: KPIs and auxiliary queries, without period information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTemplate {
    /// Template name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// KPIs.
    #[serde(default)]
    pub kpis: Vec<Kpi>,
    /// Auxiliary queries.
    #[serde(default)]
    pub queries: Vec<Query>,
}

impl ReportTemplate {
    /// Fills missing KPI names from their descriptions.
    pub fn normalize(&mut self) {
        for kpi in &mut self.kpis {
            if kpi.name.is_empty() {
                kpi.name = python_var(&kpi.description);
            }
        }
    }

    /// Checks names and query filters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a name that is not an identifier,
    /// `DuplicateName` when a name is used twice across KPIs and queries, and
    /// `Domain` for a malformed query filter.
    pub fn validate(&self) -> Result<(), ReportError> {
        let mut seen = BTreeSet::new();
        let names = self
            .kpis
            .iter()
            .map(|k| &k.name)
            .chain(self.queries.iter().map(|q| &q.name));
        for name in names {
            if !is_identifier(name) {
                return Err(ReportError::InvalidName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ReportError::DuplicateName(name.clone()));
            }
        }
        for query in &self.queries {
            query.filter()?;
        }
        Ok(())
    }

    /// KPIs in sequence order; ties keep declaration order.
    #[must_use]
    pub fn sorted_kpis(&self) -> Vec<&Kpi> {
        let mut kpis: Vec<&Kpi> = self.kpis.iter().collect();
        kpis.sort_by_key(|k| k.sequence);
        kpis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Gross Margin", "gross_margin")]
    #[case("2024 sales", "_2024_sales")]
    #[case("EBITDA (%)", "ebitda____")]
    #[case("net", "net")]
    fn test_python_var(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(python_var(text), expected);
        assert!(is_identifier(&python_var(text)));
    }

    #[rstest]
    #[case("sales", true)]
    #[case("_x1", true)]
    #[case("1x", false)]
    #[case("gross margin", false)]
    #[case("", false)]
    fn test_is_identifier(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(is_identifier(name), valid);
    }

    fn template(kpis: &[&str], queries: &[&str]) -> ReportTemplate {
        ReportTemplate {
            name: "t".into(),
            description: None,
            kpis: kpis.iter().map(|n| Kpi::new(*n, *n, "1")).collect(),
            queries: queries
                .iter()
                .map(|n| Query {
                    name: (*n).into(),
                    model: "invoice".into(),
                    fields: vec!["amount".into()],
                    date_field: "date".into(),
                    date_type: DateType::Date,
                    domain: None,
                    company_scoped: false,
                })
                .collect(),
        }
    }

    #[test]
    fn test_validate_accepts_distinct_identifiers() {
        assert!(template(&["a", "b"], &["q"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_kpi_shadowing_query() {
        assert!(matches!(
            template(&["a", "q"], &["q"]).validate(),
            Err(ReportError::DuplicateName(name)) if name == "q"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_names_and_filters() {
        assert!(matches!(
            template(&["bad name"], &[]).validate(),
            Err(ReportError::InvalidName(_))
        ));

        let mut t = template(&[], &["q"]);
        t.queries[0].domain = Some("[('state', '=']".into());
        assert!(matches!(t.validate(), Err(ReportError::Domain { .. })));
    }

    #[test]
    fn test_normalize_derives_missing_names() {
        let mut t = template(&[], &[]);
        t.kpis.push(Kpi::new("", "Operating Result", "1"));
        t.normalize();
        assert_eq!(t.kpis[0].name, "operating_result");
    }

    #[test]
    fn test_sorted_kpis_is_stable() {
        let mut t = template(&["a", "b", "c"], &[]);
        t.kpis[2].sequence = 1;
        let names: Vec<&str> = t.sorted_kpis().iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
