//! Report generation service.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use misbuilder_shared::types::{AccountId, JournalId, MoveId, PartnerId, TaxId};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::types::{
    JournalLine, JournalMove, JournalReport, JournalReportRequest, JournalSection, OpenInvoiceAccount,
    OpenInvoiceLine, OpenInvoicePartner, OpenInvoiceReport, OpenInvoiceRequest, PrefixLine,
    PrefixLineBalance, TaxSummary,
};
use crate::domain::{Domain, DomainValue, Operator};
use crate::gateway::{Account, DebitCredit, GroupBy, Journal, JournalGateway, LedgerGateway, MoveLine, Tax};
use crate::mis::ReportError;

/// Service for generating financial reports.
pub struct FinancialReportService<'g, G: ?Sized> {
    gateway: &'g G,
}

impl<'g, G: LedgerGateway + ?Sized> FinancialReportService<'g, G> {
    /// Creates a service reading from `gateway`.
    #[must_use]
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    /// Computes every line of an account prefix report.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefixLine` for a misconfigured line, and gateway errors.
    pub fn prefix_lines(&self, lines: &[PrefixLine], filter: &Domain) -> Result<Vec<PrefixLineBalance>, ReportError> {
        lines.iter().map(|line| self.prefix_line(line, filter)).collect()
    }

    /// Sums the move lines matching `filter` over the non-view accounts
    /// whose code starts with one of the line's prefixes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefixLine` for a misconfigured line, and gateway errors.
    pub fn prefix_line(&self, line: &PrefixLine, filter: &Domain) -> Result<PrefixLineBalance, ReportError> {
        validate_prefix_line(line)?;
        let accounts = self.gateway.search_accounts(&prefix_filter(&line.prefixes))?;
        let totals = if accounts.is_empty() {
            DebitCredit::default()
        } else {
            let scoped = Domain::and([
                filter.clone(),
                Domain::is_in("account_id", DomainValue::ids(accounts.iter().map(|a| a.id))),
            ]);
            self.gateway
                .aggregate(&scoped, GroupBy::Nothing)?
                .get(&None)
                .copied()
                .unwrap_or_default()
        };
        debug!(line = %line.name, accounts = accounts.len(), "prefix line computed");

        Ok(PrefixLineBalance {
            name: line.name.clone(),
            account_count: accounts.len(),
            debit: totals.debit,
            credit: totals.credit,
            balance: totals.balance(),
        })
    }
}

impl<'g, G: JournalGateway + ?Sized> FinancialReportService<'g, G> {
    /// Generates a journal report.
    ///
    /// Journals of other companies are left out.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` when the window is reversed, and gateway
    /// errors.
    pub fn journal_report(&self, request: &JournalReportRequest) -> Result<JournalReport, ReportError> {
        if request.date_from > request.date_to {
            return Err(ReportError::InvalidDateRange {
                start: request.date_from,
                end: request.date_to,
            });
        }

        let filter = Domain::and([
            Domain::is_in("id", DomainValue::ids(request.journal_ids.iter().copied())),
            Domain::eq("company_id", request.company_id.into_inner()),
        ]);
        let mut journals = self.gateway.list_journals(&filter)?;
        journals.sort_by(|a, b| a.name.cmp(&b.name));

        let journals = journals
            .into_iter()
            .map(|journal| self.journal_section(journal, request))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            journals = journals.len(),
            date_from = %request.date_from,
            date_to = %request.date_to,
            "journal report generated"
        );

        Ok(JournalReport {
            date_from: request.date_from,
            date_to: request.date_to,
            journals,
        })
    }

    fn journal_section(&self, journal: Journal, request: &JournalReportRequest) -> Result<JournalSection, ReportError> {
        let filter = Domain::and([
            Domain::eq("journal_id", journal.id.into_inner()),
            Domain::cond("date", Operator::Ge, request.date_from),
            Domain::cond("date", Operator::Le, request.date_to),
            request.target_move.filter(),
        ]);
        let lines = self.gateway.search_move_lines(&filter)?;

        let accounts = self.accounts_of(&lines)?;
        let tax_ids: BTreeSet<TaxId> = lines
            .iter()
            .flat_map(|l| l.tax_line_id.into_iter().chain(l.tax_ids.iter().copied()))
            .collect();
        let taxes: BTreeMap<TaxId, Tax> = if tax_ids.is_empty() {
            BTreeMap::new()
        } else {
            let ids: Vec<TaxId> = tax_ids.iter().copied().collect();
            self.gateway
                .list_taxes(&ids)?
                .into_iter()
                .map(|t| (t.id, t))
                .collect()
        };

        let mut moves: BTreeMap<(String, MoveId), Vec<JournalLine>> = BTreeMap::new();
        for line in &lines {
            moves
                .entry((line.move_name.clone(), line.move_id))
                .or_default()
                .push(journal_line(line, accounts.get(&line.account_id), &taxes));
        }
        let moves: Vec<JournalMove> = moves
            .into_iter()
            .map(|((name, move_id), mut lines)| {
                lines.sort_by(line_order);
                JournalMove { move_id, name, lines }
            })
            .collect();

        let debit: Decimal = lines.iter().map(|l| l.debit).sum();
        let credit: Decimal = lines.iter().map(|l| l.credit).sum();
        let mut summaries: Vec<TaxSummary> = taxes.values().map(|tax| tax_summary(tax, &lines)).collect();
        summaries.sort_by(|a, b| {
            (a.tax_code.is_none(), &a.tax_code).cmp(&(b.tax_code.is_none(), &b.tax_code))
        });

        Ok(JournalSection {
            journal_id: journal.id,
            code: journal.code,
            name: journal.name,
            moves,
            taxes: summaries,
            debit,
            credit,
            balance: debit - credit,
        })
    }

    /// Lists the receivable and/or payable lines of a company still open at
    /// the clearance date, by account then partner.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` when the clearance date is before
    /// `at_date`, and gateway errors.
    pub fn open_invoice_report(&self, request: &OpenInvoiceRequest) -> Result<OpenInvoiceReport, ReportError> {
        let until_date = request.clearance_date();
        if until_date < request.at_date {
            return Err(ReportError::InvalidDateRange {
                start: request.at_date,
                end: until_date,
            });
        }

        let types = request.result_selection.account_types();
        let accounts: BTreeMap<AccountId, Account> = self
            .gateway
            .search_accounts(&Domain::is_in(
                "internal_type",
                DomainValue::List(types.iter().map(|t| DomainValue::from(t.as_str())).collect()),
            ))?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut lines = if accounts.is_empty() {
            Vec::new()
        } else {
            let partners = if request.partner_ids.is_empty() {
                Domain::True
            } else {
                Domain::is_in("partner_id", DomainValue::ids(request.partner_ids.iter().copied()))
            };
            let filter = Domain::and([
                Domain::eq("company_id", request.company_id.into_inner()),
                Domain::cond("date", Operator::Le, request.at_date),
                Domain::is_in("account_id", DomainValue::ids(accounts.keys().copied())),
                request.target_move.filter(),
                partners,
            ]);
            self.gateway.search_move_lines(&filter)?
        };
        lines.retain(|l| l.is_open_at(until_date));
        lines.sort_by(|a, b| (a.date, &a.move_name).cmp(&(b.date, &b.move_name)));

        let journals = self.journal_codes(&lines)?;
        let mut grouped: BTreeMap<(&str, AccountId), BTreeMap<PartnerKey, Vec<&MoveLine>>> = BTreeMap::new();
        for line in &lines {
            let Some(account) = accounts.get(&line.account_id) else {
                continue;
            };
            grouped
                .entry((account.code.as_str(), account.id))
                .or_default()
                .entry(PartnerKey::of(line))
                .or_default()
                .push(line);
        }

        let accounts: Vec<OpenInvoiceAccount> = grouped
            .into_iter()
            .filter_map(|((_, account_id), partners)| {
                let account = accounts.get(&account_id)?;
                let partners: Vec<OpenInvoicePartner> = partners
                    .into_iter()
                    .map(|(key, lines)| open_invoice_partner(key, &lines, &journals))
                    .collect();
                Some(OpenInvoiceAccount {
                    account_id,
                    name: format!("{} - {}", account.code, account.name),
                    debit: partners.iter().map(|p| p.debit).sum(),
                    credit: partners.iter().map(|p| p.credit).sum(),
                    partners,
                })
            })
            .collect();
        info!(
            accounts = accounts.len(),
            lines = lines.len(),
            at_date = %request.at_date,
            until_date = %until_date,
            "open invoice report generated"
        );

        Ok(OpenInvoiceReport {
            company_id: request.company_id,
            at_date: request.at_date,
            until_date,
            account_filters: request.result_selection.label().to_string(),
            target_move: request.target_move,
            accounts,
        })
    }

    fn journal_codes(&self, lines: &[MoveLine]) -> Result<BTreeMap<JournalId, String>, ReportError> {
        let ids: BTreeSet<JournalId> = lines.iter().map(|l| l.journal_id).collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .gateway
            .list_journals(&Domain::is_in("id", DomainValue::ids(ids)))?
            .into_iter()
            .map(|j| (j.id, j.code))
            .collect())
    }

    fn accounts_of(&self, lines: &[MoveLine]) -> Result<BTreeMap<AccountId, Account>, ReportError> {
        let ids: BTreeSet<AccountId> = lines.iter().map(|l| l.account_id).collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .gateway
            .search_accounts(&Domain::is_in("id", DomainValue::ids(ids)))?
            .into_iter()
            .map(|a| (a.id, a))
            .collect())
    }
}

/// Checks that a prefix line has prefixes and no duplicates.
///
/// # Errors
///
/// Returns `InvalidPrefixLine`.
pub fn validate_prefix_line(line: &PrefixLine) -> Result<(), ReportError> {
    let invalid = |reason: &str| ReportError::InvalidPrefixLine {
        name: line.name.clone(),
        reason: reason.to_string(),
    };
    if line.prefixes.is_empty() {
        return Err(invalid("at least one prefix is required"));
    }
    let mut seen = BTreeSet::new();
    for prefix in &line.prefixes {
        if prefix.is_empty() {
            return Err(invalid("prefixes must not be empty"));
        }
        if !seen.insert(prefix.as_str()) {
            return Err(invalid(&format!("prefix '{prefix}' is listed twice")));
        }
    }
    Ok(())
}

/// Account filter of a prefix set: non-view accounts whose code starts with
/// any prefix, ignoring case.
#[must_use]
pub fn prefix_filter(prefixes: &[String]) -> Domain {
    Domain::and([
        Domain::cond("kind", Operator::Ne, "view"),
        Domain::or(
            prefixes
                .iter()
                .map(|p| Domain::cond("code", Operator::ILike, format!("{p}%"))),
        ),
    ])
}

fn journal_line(line: &MoveLine, account: Option<&Account>, taxes: &BTreeMap<TaxId, Tax>) -> JournalLine {
    let label = |id: &TaxId| taxes.get(id).map(Tax::label);
    let taxes_description = match line.tax_line_id {
        Some(id) => label(&id).unwrap_or_default().to_string(),
        None => line.tax_ids.iter().filter_map(label).collect::<Vec<_>>().join(", "),
    };
    JournalLine {
        move_line_id: line.id,
        account_id: line.account_id,
        account_code: account.map(|a| a.code.clone()).unwrap_or_default(),
        account: account.map(|a| a.name.clone()).unwrap_or_default(),
        partner_id: line.partner_id,
        partner: line.partner_name.clone(),
        date: line.date,
        entry: line.move_name.clone(),
        label: line.name.clone(),
        debit: line.debit,
        credit: line.credit,
        tax_id: line.tax_line_id,
        taxes_description,
    }
}

/// Partner descending with lines without partner first, then account code
/// descending.
fn line_order(a: &JournalLine, b: &JournalLine) -> Ordering {
    let partner = match (&a.partner, &b.partner) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(x),
    };
    partner.then_with(|| b.account_code.cmp(&a.account_code))
}

/// Partner grouping of the open invoice report: named partners by name,
/// lines without partner last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PartnerKey {
    unnamed: bool,
    name: Option<String>,
    id: Option<PartnerId>,
}

impl PartnerKey {
    fn of(line: &MoveLine) -> Self {
        Self {
            unnamed: line.partner_name.is_none(),
            name: line.partner_name.clone(),
            id: line.partner_id,
        }
    }
}

fn open_invoice_partner(
    key: PartnerKey,
    lines: &[&MoveLine],
    journals: &BTreeMap<JournalId, String>,
) -> OpenInvoicePartner {
    let lines: Vec<OpenInvoiceLine> = lines
        .iter()
        .map(|line| OpenInvoiceLine {
            move_line_id: line.id,
            date: line.date,
            entry: line.move_name.clone(),
            journal: journals.get(&line.journal_id).cloned().unwrap_or_default(),
            reference: line.reference.clone(),
            label: line.name.clone(),
            reconcile: line.reconcile_name.clone(),
            due_date: line.date_maturity,
            debit: line.debit,
            credit: line.credit,
        })
        .collect();
    let debit: Decimal = lines.iter().map(|l| l.debit).sum();
    let credit: Decimal = lines.iter().map(|l| l.credit).sum();
    OpenInvoicePartner {
        partner_id: key.id,
        name: key.name,
        lines,
        debit,
        credit,
        balance: debit - credit,
    }
}

fn tax_summary(tax: &Tax, lines: &[MoveLine]) -> TaxSummary {
    let mut base = DebitCredit::default();
    let mut amount = DebitCredit::default();
    for line in lines {
        if line.tax_ids.contains(&tax.id) {
            base += DebitCredit::new(line.debit, line.credit);
        }
        if line.tax_line_id == Some(tax.id) {
            amount += DebitCredit::new(line.debit, line.credit);
        }
    }
    TaxSummary {
        tax_id: tax.id,
        tax_name: tax.name.clone(),
        tax_code: tax.description.clone(),
        base_debit: base.debit,
        base_credit: base.credit,
        base_balance: base.balance(),
        tax_debit: amount.debit,
        tax_credit: amount.credit,
        tax_balance: amount.balance(),
    }
}
