//! KPI value and comparison rendering.

use num_format::{Locale, ToFormattedString};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::kpi::{CompareMethod, Kpi, KpiType};
use crate::formula::Value;

/// No-break space between a number and its unit.
const NBSP: char = '\u{A0}';

fn percent() -> Decimal {
    Decimal::new(1, 2)
}

/// Formats `value / divider` with `dp` decimals (halves away from zero) and
/// thousands separators.
/// With `signed`, non-negative results get a leading `+`.
#[must_use]
pub fn format_number(value: Decimal, divider: Decimal, dp: u32, signed: bool) -> String {
    let Some(scaled) = value.checked_div(divider) else {
        return String::new();
    };
    let rounded = scaled.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    let magnitude = rounded.abs();

    let sign = if rounded.is_zero() || !rounded.is_sign_negative() {
        if signed { "+" } else { "" }
    } else {
        "-"
    };
    let integer = magnitude
        .trunc()
        .to_u128()
        .map(|n| n.to_formatted_string(&Locale::en))
        .unwrap_or_default();
    if dp == 0 {
        return format!("{sign}{integer}");
    }
    let digits = dp as usize;
    let fraction = format!("{:.digits$}", magnitude.fract());
    let fraction = fraction.split_once('.').map_or("", |(_, f)| f);
    format!("{sign}{integer}.{fraction:0<digits$}")
}

fn render_number(value: Decimal, divider: Decimal, label: &str, dp: u32, suffix: &str, signed: bool) -> String {
    format!("{}{NBSP}{label}{suffix}", format_number(value, divider, dp, signed))
}

/// Renders a computed KPI value for display.
#[must_use]
pub fn render_value(kpi: &Kpi, value: &Value) -> String {
    let number = value.as_number().filter(|_| !matches!(value, Value::Bool(_)));
    match (kpi.kind, number) {
        (KpiType::Num, Some(n)) => render_number(
            n,
            kpi.divider.factor(),
            kpi.divider.label(),
            kpi.dp,
            kpi.suffix.as_deref().unwrap_or_default(),
            false,
        ),
        (KpiType::Pct, Some(n)) => render_number(n, percent(), "", kpi.dp, "%", false),
        _ => value.to_string(),
    }
}

/// Renders the comparison of `value` against `base`, each first divided by
/// its column's normalize factor. Empty when either side is missing or the
/// KPI has no comparison.
#[must_use]
pub fn render_comparison(kpi: &Kpi, value: &Value, base: &Value, factor: u32, base_factor: u32) -> String {
    let (Value::Number(value), Value::Number(base)) = (value, base) else {
        return String::new();
    };
    match kpi.kind {
        KpiType::Pct => render_number(*value - *base, percent(), "", kpi.dp, "pp", true),
        KpiType::Num => {
            let (Some(value), Some(base)) = (normalize(*value, factor), normalize(*base, base_factor)) else {
                return String::new();
            };
            match kpi.compare_method {
                CompareMethod::Diff => render_number(
                    value - base,
                    kpi.divider.factor(),
                    kpi.divider.label(),
                    kpi.dp,
                    kpi.suffix.as_deref().unwrap_or_default(),
                    true,
                ),
                CompareMethod::Pct if !base.is_zero() => value
                    .checked_div(base)
                    .map(|ratio| render_number(ratio - Decimal::ONE, percent(), "", kpi.dp, "%", true))
                    .unwrap_or_default(),
                CompareMethod::Pct | CompareMethod::None => String::new(),
            }
        }
        KpiType::Str => String::new(),
    }
}

fn normalize(value: Decimal, factor: u32) -> Option<Decimal> {
    if factor == 0 {
        Some(value)
    } else {
        value.checked_div(Decimal::from(factor))
    }
}
