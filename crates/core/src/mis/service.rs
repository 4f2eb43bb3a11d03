//! Report orchestration.
//!
//! [`ReportService::compute`] drives one computation: it resolves the window
//! of every column, loads the aggregates of the KPI formulas through a single
//! expression engine, runs the auxiliary queries and evaluates the KPIs, then
//! appends the comparison columns.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use misbuilder_shared::types::CompanyId;
use tracing::{debug, info, warn};

use super::error::ReportError;
use super::evaluator::{KpiCell, KpiEvaluator};
use super::instance::{InstancePeriod, ReportInstance, TargetMove};
use super::render::render_comparison;
use super::template::{DateType, Query, ReportTemplate};
use super::types::{ColumnCell, DrilldownAction, HeaderCell, ReportMatrix, ReportRow, ReportSettings};
use crate::domain::{Domain, DomainValue, Operator};
use crate::expression::{ExpressionEngine, Mode, ModeFilters};
use crate::fiscal::{PeriodResolver, PeriodType, ResolvedWindow};
use crate::formula::{Context, Value};
use crate::gateway::LedgerGateway;

/// Model listed by drill-down actions.
pub const MOVE_LINE_MODEL: &str = "move_line";

/// Computes reports against a ledger gateway.
pub struct ReportService<'g, G: LedgerGateway + ?Sized> {
    gateway: &'g G,
    settings: ReportSettings,
}

impl<'g, G: LedgerGateway + ?Sized> ReportService<'g, G> {
    /// Creates a service reading from `gateway`.
    #[must_use]
    pub fn new(gateway: &'g G, settings: ReportSettings) -> Self {
        Self { gateway, settings }
    }

    /// Settings of this service.
    #[must_use]
    pub const fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Computes `template` over the columns of `instance`.
    ///
    /// Formula failures are reported in their cells; this only fails when
    /// the report itself cannot be computed.
    ///
    /// # Errors
    ///
    /// Returns validation errors of the template or instance, period
    /// resolution errors, and gateway errors.
    pub fn compute(
        &self,
        template: &ReportTemplate,
        instance: &ReportInstance,
        today: NaiveDate,
    ) -> Result<ReportMatrix, ReportError> {
        template.validate()?;
        instance.validate()?;
        info!(template = %template.name, instance = %instance.name, "computing report");

        let kpis = template.sorted_kpis();
        let mut engine = ExpressionEngine::new(self.gateway);
        for kpi in &kpis {
            if let Err(err) = engine.parse(&kpi.expression) {
                warn!(kpi = %kpi.name, error = %err, "KPI formula has an invalid accounting variable");
            }
        }
        engine.finalize(&company_restriction(instance.company_id))?;

        let resolver = PeriodResolver::new(self.gateway);
        let evaluator = KpiEvaluator::new(&self.settings.markers);
        let pivot = instance.pivot_date(today);

        let mut header = Vec::new();
        let mut rows: Vec<ReportRow> = kpis.iter().map(|k| ReportRow::new(k)).collect();
        let mut columns: BTreeMap<&str, BTreeMap<String, KpiCell>> = BTreeMap::new();

        for period in instance.sorted_periods() {
            let window = resolver.resolve(&period.spec(), pivot, Some(instance.company_id))?;
            header.push(HeaderCell {
                name: period.name.clone(),
                date: self.date_label(period, &window),
            });

            engine.execute(&mode_filters(&resolver, &window, instance.target_move)?)?;
            let mut context = self.fetch_queries(template, &window, instance.company_id)?;
            let column = evaluator.evaluate(&kpis, &engine, &mut context, &period.name);
            info!(
                period = %period.name,
                date_from = %window.date_from,
                date_to = %window.date_to,
                passes = column.passes,
                "period column computed"
            );

            for row in &mut rows {
                if let Some(cell) = column.cells.get(&row.name) {
                    row.cells.push(ColumnCell::Value(cell.clone()));
                }
            }
            columns.insert(period.name.as_str(), column.cells);
        }

        for period in instance.sorted_periods() {
            for target in &period.compare_with {
                let base_period = instance.period(target)?;
                let current = columns.get(period.name.as_str());
                let base = columns.get(target.as_str());
                header.push(HeaderCell {
                    name: format!("{} - {}", period.name, target),
                    date: String::new(),
                });
                for (row, kpi) in rows.iter_mut().zip(&kpis) {
                    let value = cell_value(current, &kpi.name);
                    let base_value = cell_value(base, &kpi.name);
                    let rendered = render_comparison(
                        kpi,
                        value,
                        base_value,
                        period.normalize_factor,
                        base_period.normalize_factor,
                    );
                    row.cells.push(ColumnCell::Comparison { rendered });
                }
            }
        }

        Ok(ReportMatrix { header, rows })
    }

    /// Builds the listing of the move lines behind `expr` in the column
    /// `period_name`. Returns `None` when `expr` has no variable that can be
    /// listed.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPeriod`, errors in `expr`, period resolution errors
    /// and gateway errors.
    pub fn drilldown(
        &self,
        instance: &ReportInstance,
        period_name: &str,
        expr: &str,
        today: NaiveDate,
    ) -> Result<Option<DrilldownAction>, ReportError> {
        let period = instance.period(period_name)?;
        let mut engine = ExpressionEngine::new(self.gateway);
        engine.parse(expr)?;
        engine.finalize(&company_restriction(instance.company_id))?;
        let Some(domain) = engine.domain_for(expr)? else {
            return Ok(None);
        };

        let resolver = PeriodResolver::new(self.gateway);
        let window = resolver.resolve(&period.spec(), instance.pivot_date(today), Some(instance.company_id))?;
        let scope = resolver.mode_filter(&window, Mode::Variation)?;
        debug!(period = %period.name, expr, "drill-down built");
        Ok(Some(DrilldownAction {
            name: format!("{expr} - {}", period.name),
            model: MOVE_LINE_MODEL.to_string(),
            domain: Domain::and([domain, instance.target_move.filter(), scope]),
        }))
    }

    fn date_label(&self, period: &InstancePeriod, window: &ResolvedWindow) -> String {
        let format = self.settings.date_format.as_str();
        let from = window
            .period_from
            .as_ref()
            .map_or_else(|| window.date_from.format(format).to_string(), |p| p.name.clone());
        if period.duration > 1 || period.kind == PeriodType::Week {
            let to = window
                .period_to
                .as_ref()
                .map_or_else(|| window.date_to.format(format).to_string(), |p| p.name.clone());
            format!("from {from} to {to}")
        } else {
            from
        }
    }

    fn fetch_queries(
        &self,
        template: &ReportTemplate,
        window: &ResolvedWindow,
        company_id: CompanyId,
    ) -> Result<Context, ReportError> {
        let mut context = Context::new();
        for query in &template.queries {
            let filter = query_filter(query, window.date_from, window.date_to, company_id, self.settings.timezone)?;
            let rows = self.gateway.fetch_records(&query.model, &filter, &query.fields)?;
            debug!(query = %query.name, rows = rows.len(), "auxiliary query fetched");
            context.set(
                query.name.clone(),
                Value::List(rows.into_iter().map(Value::from).collect()),
            );
        }
        Ok(context)
    }
}

fn cell_value<'a>(column: Option<&'a BTreeMap<String, KpiCell>>, name: &str) -> &'a Value {
    column.and_then(|c| c.get(name)).map_or(&Value::Null, |cell| &cell.value)
}

/// Account restriction of a company's reports.
#[must_use]
pub fn company_restriction(company_id: CompanyId) -> Domain {
    Domain::eq("company_id", company_id.into_inner())
}

/// Ledger filters of one column: the window of each mode, narrowed to the
/// target entries.
///
/// # Errors
///
/// Returns period resolution errors.
pub fn mode_filters<G: LedgerGateway + ?Sized>(
    resolver: &PeriodResolver<'_, G>,
    window: &ResolvedWindow,
    target_move: TargetMove,
) -> Result<ModeFilters, ReportError> {
    let target = target_move.filter();
    let filter = |mode| -> Result<Domain, ReportError> {
        Ok(Domain::and([resolver.mode_filter(window, mode)?, target.clone()]))
    };
    Ok(ModeFilters {
        variation: filter(Mode::Variation)?,
        initial: filter(Mode::Initial)?,
        end: filter(Mode::End)?,
    })
}

/// Filter of an auxiliary query for the window `date_from..=date_to`.
///
/// Dates are compared inclusively. Timestamps run from local midnight of
/// `date_from` to local midnight after `date_to`, converted to UTC.
/// Company-scoped models keep the records of the company and the shared ones.
///
/// # Errors
///
/// Returns `Domain` for a malformed query filter, and `Timezone` when a
/// local midnight cannot be mapped to UTC.
pub fn query_filter(
    query: &Query,
    date_from: NaiveDate,
    date_to: NaiveDate,
    company_id: CompanyId,
    timezone: Tz,
) -> Result<Domain, ReportError> {
    let mut parts = vec![query.filter()?];
    match query.date_type {
        DateType::Date => {
            parts.push(Domain::cond(query.date_field.as_str(), Operator::Ge, date_from));
            parts.push(Domain::cond(query.date_field.as_str(), Operator::Le, date_to));
        }
        DateType::DateTime => {
            let day_after = date_to
                .checked_add_days(Days::new(1))
                .ok_or_else(|| ReportError::Timezone(timezone.name().to_string()))?;
            parts.push(Domain::cond(
                query.date_field.as_str(),
                Operator::Ge,
                DomainValue::DateTime(utc_midnight(date_from, timezone)?),
            ));
            parts.push(Domain::cond(
                query.date_field.as_str(),
                Operator::Lt,
                DomainValue::DateTime(utc_midnight(day_after, timezone)?),
            ));
        }
    }
    if query.company_scoped {
        parts.push(Domain::or([
            Domain::eq("company_id", DomainValue::Null),
            Domain::eq("company_id", company_id.into_inner()),
        ]));
    }
    Ok(Domain::and(parts))
}

/// UTC instant of local midnight on `date`. Ambiguous midnights take the
/// standard-time instant; a midnight skipped by a clock change moves to the
/// first hour of the day.
fn utc_midnight(date: NaiveDate, timezone: Tz) -> Result<NaiveDateTime, ReportError> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    timezone
        .from_local_datetime(&midnight)
        .latest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(midnight + TimeDelta::hours(1)))
                .latest()
        })
        .map(|local| local.naive_utc())
        .ok_or_else(|| ReportError::Timezone(timezone.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::date;

    #[test]
    fn test_utc_midnight_shifts_by_offset() {
        let brussels: Tz = "Europe/Brussels".parse().unwrap();
        // winter, UTC+1
        assert_eq!(
            utc_midnight(date(2024, 1, 10), brussels).unwrap(),
            date(2024, 1, 9).and_hms_opt(23, 0, 0).unwrap()
        );
        // summer, UTC+2
        assert_eq!(
            utc_midnight(date(2024, 7, 10), brussels).unwrap(),
            date(2024, 7, 9).and_hms_opt(22, 0, 0).unwrap()
        );
        assert_eq!(
            utc_midnight(date(2024, 7, 10), Tz::UTC).unwrap(),
            date(2024, 7, 10).and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_query_filter_for_timestamps() {
        let query = Query {
            name: "orders".into(),
            model: "order".into(),
            fields: vec!["amount".into()],
            date_field: "created_at".into(),
            date_type: DateType::DateTime,
            domain: Some("[('state', '=', 'done')]".into()),
            company_scoped: true,
        };
        let company = CompanyId::new();
        let filter = query_filter(&query, date(2024, 1, 1), date(2024, 1, 31), company, Tz::UTC).unwrap();

        let conditions = filter.conditions();
        assert!(conditions.iter().any(|c| c.field == "state"));
        assert!(conditions.iter().any(|c| c.field == "created_at"
            && c.operator == Operator::Lt
            && c.value == DomainValue::DateTime(date(2024, 2, 1).and_hms_opt(0, 0, 0).unwrap())));
        assert!(conditions
            .iter()
            .any(|c| c.field == "company_id" && c.value == DomainValue::Null));
    }
}
