//! KPI Evaluator.
//!
//! Evaluates the KPIs of one column in sequence order. A KPI referring to a
//! KPI that comes later is deferred and retried once the pass is over; the
//! loop stops when nothing is left to retry or when a pass makes no
//! progress, so cycles terminate with error cells.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::kpi::{Kpi, KpiType};
use super::render::render_value;
use crate::expression::ExpressionEngine;
use crate::formula::{evaluate, Context, EvalError, EvalErrorKind, Value};
use crate::gateway::LedgerGateway;

/// Texts shown in place of values that could not be computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// Shown when a formula divides by zero.
    pub div_by_zero: String,
    /// Shown when a formula fails otherwise.
    pub error: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            div_by_zero: "#DIV/0".to_string(),
            error: "#ERR".to_string(),
        }
    }
}

/// One computed KPI value of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiCell {
    /// Computed value; `Null` when the formula failed.
    pub value: Value,
    /// Display text, or a marker.
    pub rendered: String,
    /// Formula and, on failure, the error.
    pub comment: String,
    /// Style computed by the style formula.
    pub style: Option<String>,
    /// Style of the row.
    pub default_style: Option<String>,
    /// Suffix of the KPI.
    pub suffix: Option<String>,
    /// Decimal places of the KPI.
    pub dp: u32,
    /// Whether the KPI is a percentage.
    pub is_percentage: bool,
    /// Column name.
    pub period: String,
    /// Formula of the KPI.
    pub expression: String,
    /// Whether the ledger rows behind the value can be listed.
    pub drilldown: bool,
}

/// Result of evaluating one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValues {
    /// Cells by KPI name.
    pub cells: BTreeMap<String, KpiCell>,
    /// Number of passes run.
    pub passes: usize,
}

enum Failure {
    DivisionByZero(String),
    Unresolved(String),
    Other(String),
}

impl From<EvalError> for Failure {
    fn from(err: EvalError) -> Self {
        match err.kind() {
            EvalErrorKind::DivisionByZero => Self::DivisionByZero(err.to_string()),
            EvalErrorKind::UnresolvedName => Self::Unresolved(err.to_string()),
            EvalErrorKind::Other => Self::Other(err.to_string()),
        }
    }
}

/// Evaluates KPI formulas against an executed expression engine.
pub struct KpiEvaluator<'m> {
    markers: &'m Markers,
}

impl<'m> KpiEvaluator<'m> {
    /// Creates an evaluator rendering failures with `markers`.
    #[must_use]
    pub const fn new(markers: &'m Markers) -> Self {
        Self { markers }
    }

    /// Evaluates `kpis` for the column `period`.
    ///
    /// `engine` must hold the column's aggregates. Computed values are bound
    /// in `context` under the KPI name and failed KPIs are bound to `Null`.
    /// KPIs still deferred when the loop stops are left unbound; their cells
    /// carry the error marker.
    pub fn evaluate<G: LedgerGateway + ?Sized>(
        &self,
        kpis: &[&Kpi],
        engine: &ExpressionEngine<'_, G>,
        context: &mut Context,
        period: &str,
    ) -> ColumnValues {
        let mut cells = BTreeMap::new();
        let mut queue: Vec<&Kpi> = kpis.to_vec();
        let mut passes = 0;

        loop {
            passes += 1;
            let mut retry = Vec::new();

            for kpi in &queue {
                let mut comment = format!("{} = {}", kpi.name, kpi.expression);
                let (value, rendered) = match Self::compute(kpi, engine, context) {
                    Ok(value) => {
                        let rendered = render_value(kpi, &value);
                        (value, rendered)
                    }
                    Err(Failure::DivisionByZero(message)) => {
                        comment.push_str(&format!("\n\n{message}"));
                        (Value::Null, self.markers.div_by_zero.clone())
                    }
                    Err(Failure::Unresolved(message)) => {
                        debug!(kpi = %kpi.name, period, pass = passes, "deferring KPI: {message}");
                        comment.push_str(&format!("\n\n{message}"));
                        retry.push(*kpi);
                        let cell = Self::cell(kpi, Value::Null, self.markers.error.clone(), comment, None, false, period);
                        cells.insert(kpi.name.clone(), cell);
                        continue;
                    }
                    Err(Failure::Other(message)) => {
                        warn!(kpi = %kpi.name, period, error = %message, "KPI evaluation failed");
                        comment.push_str(&format!("\n\n{message}"));
                        (Value::Null, self.markers.error.clone())
                    }
                };

                context.set(kpi.name.clone(), value.clone());
                let style = Self::style(kpi, context);
                let drilldown = !value.is_null()
                    && matches!(engine.domain_for(&kpi.expression), Ok(Some(_)));
                cells.insert(
                    kpi.name.clone(),
                    Self::cell(kpi, value, rendered, comment, style, drilldown, period),
                );
            }

            if retry.is_empty() {
                break;
            }
            if retry.len() == queue.len() {
                for kpi in &retry {
                    warn!(kpi = %kpi.name, period, "KPI left unresolved: forward reference or cycle");
                }
                break;
            }
            queue = retry;
        }

        ColumnValues { cells, passes }
    }

    fn compute<G: LedgerGateway + ?Sized>(
        kpi: &Kpi,
        engine: &ExpressionEngine<'_, G>,
        context: &Context,
    ) -> Result<Value, Failure> {
        let formula = engine
            .substitute(&kpi.expression)
            .map_err(|e| Failure::Other(e.to_string()))?;
        Ok(evaluate(&formula, context)?)
    }

    fn style(kpi: &Kpi, context: &Context) -> Option<String> {
        let expression = kpi.style_expression.as_deref()?;
        match evaluate(expression, context) {
            Ok(Value::Null) | Err(_) => None,
            Ok(value) => Some(value.to_string()),
        }
    }

    fn cell(
        kpi: &Kpi,
        value: Value,
        rendered: String,
        comment: String,
        style: Option<String>,
        drilldown: bool,
        period: &str,
    ) -> KpiCell {
        KpiCell {
            value,
            rendered,
            comment,
            style,
            default_style: kpi.default_style.clone(),
            suffix: kpi.suffix.clone(),
            dp: kpi.dp,
            is_percentage: kpi.kind == KpiType::Pct,
            period: period.to_string(),
            expression: kpi.expression.clone(),
            drilldown,
        }
    }
}
