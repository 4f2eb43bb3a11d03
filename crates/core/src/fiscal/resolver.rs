//! Period Resolver.
//!
//! Turns a relative period specification (day, week or fiscal period, with
//! an offset and a duration) into a concrete date window, and turns a window
//! into the ledger filter of each accounting mode.
//!
//! Initial balances need care: some ledgers post the opening balance as one
//! entry in a special opening period, others simply accumulate every normal
//! period since the start of the books. Both conventions are supported.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate};
use misbuilder_shared::types::{CompanyId, FiscalPeriodId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::PeriodError;
use super::period::FiscalPeriod;
use crate::domain::{Domain, DomainValue, Operator};
use crate::expression::Mode;
use crate::gateway::{LedgerGateway, PeriodOrder};

/// Unit of a period specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// Calendar days.
    #[serde(alias = "d")]
    Day,
    /// Weeks starting on Monday.
    #[serde(alias = "w")]
    Week,
    /// Normal fiscal periods of the company calendar.
    #[default]
    #[serde(alias = "fp")]
    FiscalPeriod,
}

/// A window relative to a pivot date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSpec {
    /// Unit.
    #[serde(rename = "type", default)]
    pub kind: PeriodType,
    /// Signed number of units between the pivot's unit and the first unit.
    pub offset: i32,
    /// Number of units, at least one.
    pub duration: u32,
}

/// A concrete window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    /// First day, inclusive.
    pub date_from: NaiveDate,
    /// Last day, inclusive.
    pub date_to: NaiveDate,
    /// First fiscal period, for fiscal-period windows.
    pub period_from: Option<FiscalPeriod>,
    /// Last fiscal period, for fiscal-period windows.
    pub period_to: Option<FiscalPeriod>,
}

impl ResolvedWindow {
    /// Returns both bounding periods when the window is made of fiscal periods.
    #[must_use]
    pub fn periods(&self) -> Option<(&FiscalPeriod, &FiscalPeriod)> {
        self.period_from.as_ref().zip(self.period_to.as_ref())
    }
}

/// Resolves period windows against the fiscal calendar of a gateway.
pub struct PeriodResolver<'g, G: LedgerGateway + ?Sized> {
    gateway: &'g G,
}

impl<'g, G: LedgerGateway + ?Sized> PeriodResolver<'g, G> {
    /// Creates a resolver reading the calendar from `gateway`.
    #[must_use]
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    /// Resolves `spec` relative to `pivot`.
    ///
    /// Fiscal-period windows use the normal periods of `company_id` and the
    /// periods shared by all companies.
    ///
    /// # Errors
    ///
    /// Returns `NoCurrentPeriod` if no normal period contains `pivot`, and
    /// `OutOfRange` if the offset leaves the calendar.
    pub fn resolve(
        &self,
        spec: &PeriodSpec,
        pivot: NaiveDate,
        company_id: Option<CompanyId>,
    ) -> Result<ResolvedWindow, PeriodError> {
        let duration = i64::from(spec.duration.max(1));
        let offset = i64::from(spec.offset);
        match spec.kind {
            PeriodType::Day => {
                let date_from = shift(pivot, offset)?;
                let date_to = shift(date_from, duration - 1)?;
                Ok(ResolvedWindow {
                    date_from,
                    date_to,
                    period_from: None,
                    period_to: None,
                })
            }
            PeriodType::Week => {
                let monday = shift(pivot, -i64::from(pivot.weekday().num_days_from_monday()))?;
                let date_from = shift(monday, offset * 7)?;
                let date_to = shift(date_from, 7 * duration - 1)?;
                Ok(ResolvedWindow {
                    date_from,
                    date_to,
                    period_from: None,
                    period_to: None,
                })
            }
            PeriodType::FiscalPeriod => self.resolve_fiscal(spec, pivot, company_id),
        }
    }

    fn resolve_fiscal(
        &self,
        spec: &PeriodSpec,
        pivot: NaiveDate,
        company_id: Option<CompanyId>,
    ) -> Result<ResolvedWindow, PeriodError> {
        let mut filter = Domain::eq("special", false);
        if let Some(company_id) = company_id {
            filter = filter.with(Domain::or([
                Domain::eq("company_id", DomainValue::Null),
                Domain::eq("company_id", company_id.into_inner()),
            ]));
        }
        let all = self
            .gateway
            .list_fiscal_periods(&filter, PeriodOrder::StartAsc, None)?;

        let current = all
            .iter()
            .position(|p| p.contains_date(pivot))
            .ok_or(PeriodError::NoCurrentPeriod { date: pivot })?;

        let out_of_range = PeriodError::OutOfRange {
            date: pivot,
            offset: spec.offset,
        };
        let start = i64::try_from(current)
            .ok()
            .map(|c| c + i64::from(spec.offset))
            .and_then(|s| usize::try_from(s).ok())
            .filter(|s| *s < all.len())
            .ok_or(out_of_range)?;
        let end = start
            .saturating_add(usize::try_from(spec.duration.max(1)).unwrap_or(1))
            .min(all.len());

        let window = &all[start..end];
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return Err(PeriodError::InvalidWindow("empty fiscal window".into()));
        };
        Ok(ResolvedWindow {
            date_from: first.start_date,
            date_to: last.end_date,
            period_from: Some(first.clone()),
            period_to: Some(last.clone()),
        })
    }

    /// Returns the ledger filter selecting the lines of `window` for `mode`.
    ///
    /// Fiscal windows filter on period ids, calendar windows on dates.
    ///
    /// # Errors
    ///
    /// Returns an error if the fiscal calendar cannot be read.
    pub fn mode_filter(&self, window: &ResolvedWindow, mode: Mode) -> Result<Domain, PeriodError> {
        match window.periods() {
            Some((from, to)) => {
                let ids = self.period_ids_for_mode(from, to, mode)?;
                Ok(Domain::is_in("period_id", DomainValue::ids(ids)))
            }
            None => Ok(date_filter(window.date_from, window.date_to, mode)),
        }
    }

    /// Lists the fiscal periods whose lines make up `mode` for the window
    /// `from..=to`, across every company having normal periods in it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` if a bound is special or the bounds are
    /// reversed, and gateway errors.
    pub fn period_ids_for_mode(
        &self,
        from: &FiscalPeriod,
        to: &FiscalPeriod,
        mode: Mode,
    ) -> Result<Vec<FiscalPeriodId>, PeriodError> {
        if from.special || to.special {
            return Err(PeriodError::InvalidWindow(
                "window bounds must be normal periods".into(),
            ));
        }
        if from.start_date > to.start_date {
            return Err(PeriodError::InvalidWindow(format!(
                "{} starts after {}",
                from.name, to.name
            )));
        }

        let mut ids = Vec::new();
        for company_id in self.companies_between(from, to)? {
            match mode {
                Mode::Variation => ids.extend(self.ids_between(from, to, company_id)?),
                Mode::Initial | Mode::End => {
                    let upper = match mode {
                        Mode::Initial => self.previous_normal(from, company_id)?,
                        _ => Some(to.clone()),
                    };
                    let opening = self
                        .previous_opening(from, company_id)?
                        .map(|p| self.has_moves(&p).map(|active| active.then_some(p)))
                        .transpose()?
                        .flatten();
                    let lower = match opening {
                        Some(opening) if mode == Mode::Initial && opening.start_date == from.start_date => {
                            debug!(period = %opening.name, "initial balance from opening period");
                            ids.push(opening.id);
                            continue;
                        }
                        Some(opening) => opening,
                        None => match self.first_normal(company_id)? {
                            Some(first) => first,
                            None => continue,
                        },
                    };
                    if let Some(upper) = upper {
                        ids.extend(self.ids_between(&lower, &upper, company_id)?);
                    }
                }
            }
        }
        Ok(ids)
    }

    fn companies_between(
        &self,
        from: &FiscalPeriod,
        to: &FiscalPeriod,
    ) -> Result<BTreeSet<Option<CompanyId>>, PeriodError> {
        let filter = Domain::and([
            Domain::cond("start_date", Operator::Ge, from.start_date),
            Domain::cond("end_date", Operator::Le, to.end_date),
            Domain::eq("special", false),
        ]);
        Ok(self
            .gateway
            .list_fiscal_periods(&filter, PeriodOrder::StartAsc, None)?
            .into_iter()
            .map(|p| p.company_id)
            .collect())
    }

    fn ids_between(
        &self,
        from: &FiscalPeriod,
        to: &FiscalPeriod,
        company_id: Option<CompanyId>,
    ) -> Result<Vec<FiscalPeriodId>, PeriodError> {
        let filter = Domain::and([
            Domain::cond("start_date", Operator::Ge, from.start_date),
            Domain::cond("end_date", Operator::Le, to.end_date),
            Domain::eq("special", false),
            company_filter(company_id),
        ]);
        let mut ids: Vec<FiscalPeriodId> = self
            .gateway
            .list_fiscal_periods(&filter, PeriodOrder::StartAsc, None)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if from.special {
            ids.push(from.id);
        }
        Ok(ids)
    }

    fn previous_opening(
        &self,
        period: &FiscalPeriod,
        company_id: Option<CompanyId>,
    ) -> Result<Option<FiscalPeriod>, PeriodError> {
        let filter = Domain::and([
            Domain::cond("start_date", Operator::Le, period.start_date),
            Domain::eq("special", true),
            company_filter(company_id),
        ]);
        Ok(self
            .gateway
            .list_fiscal_periods(&filter, PeriodOrder::StartDesc, Some(1))?
            .into_iter()
            .next())
    }

    fn previous_normal(
        &self,
        period: &FiscalPeriod,
        company_id: Option<CompanyId>,
    ) -> Result<Option<FiscalPeriod>, PeriodError> {
        let filter = Domain::and([
            Domain::cond("start_date", Operator::Lt, period.start_date),
            Domain::eq("special", false),
            company_filter(company_id),
        ]);
        Ok(self
            .gateway
            .list_fiscal_periods(&filter, PeriodOrder::StartDesc, Some(1))?
            .into_iter()
            .next())
    }

    fn first_normal(&self, company_id: Option<CompanyId>) -> Result<Option<FiscalPeriod>, PeriodError> {
        let filter = Domain::and([Domain::eq("special", false), company_filter(company_id)]);
        Ok(self
            .gateway
            .list_fiscal_periods(&filter, PeriodOrder::StartAsc, Some(1))?
            .into_iter()
            .next())
    }

    fn has_moves(&self, period: &FiscalPeriod) -> Result<bool, PeriodError> {
        Ok(self
            .gateway
            .has_move_lines(&Domain::eq("period_id", period.id.into_inner()))?)
    }
}

/// Ledger filter of a calendar window for `mode`.
#[must_use]
pub fn date_filter(date_from: NaiveDate, date_to: NaiveDate, mode: Mode) -> Domain {
    match mode {
        Mode::Variation => Domain::and([
            Domain::cond("date", Operator::Ge, date_from),
            Domain::cond("date", Operator::Le, date_to),
        ]),
        Mode::End => Domain::cond("date", Operator::Le, date_to),
        Mode::Initial => Domain::cond("date", Operator::Lt, date_from),
    }
}

fn company_filter(company_id: Option<CompanyId>) -> Domain {
    Domain::eq("company_id", DomainValue::opt_id(company_id))
}

fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate, PeriodError> {
    let delta = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(delta)
    } else {
        date.checked_sub_days(delta)
    };
    shifted.ok_or(PeriodError::DateOverflow { date, days })
}
