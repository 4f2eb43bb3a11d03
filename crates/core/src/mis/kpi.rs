//! KPI definitions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a KPI value is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiType {
    /// Number scaled by the divider.
    #[default]
    Num,
    /// Ratio displayed as a percentage.
    Pct,
    /// Free text.
    Str,
}

/// Scale applied to numeric KPIs before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Divider {
    /// Millionths, label `µ`.
    #[serde(rename = "1e-6")]
    Micro,
    /// Thousandths, label `m`.
    #[serde(rename = "1e-3")]
    Milli,
    /// Units, no label.
    #[default]
    #[serde(rename = "1")]
    One,
    /// Thousands, label `k`.
    #[serde(rename = "1e3")]
    Kilo,
    /// Millions, label `M`.
    #[serde(rename = "1e6")]
    Mega,
}

impl Divider {
    /// The value is divided by this factor.
    #[must_use]
    pub fn factor(self) -> Decimal {
        match self {
            Self::Micro => Decimal::new(1, 6),
            Self::Milli => Decimal::new(1, 3),
            Self::One => Decimal::ONE,
            Self::Kilo => Decimal::from(1_000),
            Self::Mega => Decimal::from(1_000_000),
        }
    }

    /// Unit label shown after the number.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Micro => "µ",
            Self::Milli => "m",
            Self::One => "",
            Self::Kilo => "k",
            Self::Mega => "M",
        }
    }
}

/// How two values of a KPI are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMethod {
    /// Plain difference.
    Diff,
    /// Relative change.
    #[default]
    Pct,
    /// No comparison.
    None,
}

/// A named, formula-defined metric displayed as one report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpi {
    /// Identifier, visible to later formulas.
    #[serde(default)]
    pub name: String,
    /// Row label.
    pub description: String,
    /// Formula.
    pub expression: String,
    /// Display type.
    #[serde(rename = "type", default)]
    pub kind: KpiType,
    /// Scale for numeric values.
    #[serde(default)]
    pub divider: Divider,
    /// Decimal places.
    #[serde(default)]
    pub dp: u32,
    /// Text appended to the rendered number.
    #[serde(default)]
    pub suffix: Option<String>,
    /// Comparison rendering.
    #[serde(default)]
    pub compare_method: CompareMethod,
    /// Evaluation and display order.
    #[serde(default = "default_sequence")]
    pub sequence: i32,
    /// Formula computing a style for the cell.
    #[serde(default)]
    pub style_expression: Option<String>,
    /// Style of the row.
    #[serde(default)]
    pub default_style: Option<String>,
}

const fn default_sequence() -> i32 {
    100
}

impl Kpi {
    /// Creates a numeric KPI with default display settings.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expression: expression.into(),
            kind: KpiType::Num,
            divider: Divider::One,
            dp: 0,
            suffix: None,
            compare_method: CompareMethod::Pct,
            sequence: default_sequence(),
            style_expression: None,
            default_style: None,
        }
    }

    /// Changes the display type, resetting the settings that depend on it.
    ///
    /// Percentages compare by difference; strings have no comparison, no
    /// divider and no decimals.
    #[must_use]
    pub fn with_type(mut self, kind: KpiType) -> Self {
        self.kind = kind;
        match kind {
            KpiType::Pct => self.compare_method = CompareMethod::Diff,
            KpiType::Str => {
                self.compare_method = CompareMethod::None;
                self.divider = Divider::One;
                self.dp = 0;
            }
            KpiType::Num => {}
        }
        self
    }

    /// Sets the divider.
    #[must_use]
    pub const fn with_divider(mut self, divider: Divider) -> Self {
        self.divider = divider;
        self
    }

    /// Sets the decimal places.
    #[must_use]
    pub const fn with_dp(mut self, dp: u32) -> Self {
        self.dp = dp;
        self
    }

    /// Sets the suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sets the comparison method.
    #[must_use]
    pub const fn with_compare_method(mut self, method: CompareMethod) -> Self {
        self.compare_method = method;
        self
    }

    /// Sets the sequence.
    #[must_use]
    pub const fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sets the style formula.
    #[must_use]
    pub fn with_style(mut self, expression: impl Into<String>) -> Self {
        self.style_expression = Some(expression.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let kpi = Kpi::new("sales", "Sales", "-bal[70]");
        assert_eq!(kpi.kind, KpiType::Num);
        assert_eq!(kpi.divider, Divider::One);
        assert_eq!(kpi.dp, 0);
        assert_eq!(kpi.compare_method, CompareMethod::Pct);
        assert_eq!(kpi.sequence, 100);
    }

    #[test]
    fn test_type_change_resets_dependent_settings() {
        let pct = Kpi::new("margin", "Margin", "a / b").with_type(KpiType::Pct);
        assert_eq!(pct.compare_method, CompareMethod::Diff);

        let text = Kpi::new("note", "Note", "'ok'")
            .with_divider(Divider::Kilo)
            .with_dp(2)
            .with_type(KpiType::Str);
        assert_eq!(text.compare_method, CompareMethod::None);
        assert_eq!(text.divider, Divider::One);
        assert_eq!(text.dp, 0);
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let kpi: Kpi = serde_json::from_str(
            r#"{"name": "k", "description": "K", "expression": "1", "type": "pct", "divider": "1e3"}"#,
        )
        .unwrap();
        assert_eq!(kpi.kind, KpiType::Pct);
        assert_eq!(kpi.divider, Divider::Kilo);
        assert_eq!(kpi.sequence, 100);
        assert_eq!(kpi.compare_method, CompareMethod::Pct);
    }

    #[test]
    fn test_divider_factors() {
        assert_eq!(Divider::Micro.factor(), dec!(0.000001));
        assert_eq!(Divider::Mega.factor(), dec!(1000000));
        assert_eq!(Divider::One.label(), "");
    }
}
