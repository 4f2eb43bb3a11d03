//! Report data types.

use chrono::NaiveDate;
use misbuilder_shared::types::{AccountId, CompanyId, JournalId, MoveId, MoveLineId, PartnerId, TaxId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::gateway::AccountType;
use crate::mis::TargetMove;

/// A financial report line summing the accounts under a set of code prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixLine {
    /// Line name.
    pub name: String,
    /// Account code prefixes.
    pub prefixes: Vec<String>,
}

impl PrefixLine {
    /// Creates a line.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Sums of a prefix line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixLineBalance {
    /// Line name.
    pub name: String,
    /// Number of accounts summed.
    pub account_count: usize,
    /// Total debit.
    pub debit: Decimal,
    /// Total credit.
    pub credit: Decimal,
    /// Debit minus credit.
    pub balance: Decimal,
}

/// Parameters of a journal report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalReportRequest {
    /// Company owning the journals.
    pub company_id: CompanyId,
    /// First day, inclusive.
    pub date_from: NaiveDate,
    /// Last day, inclusive.
    pub date_to: NaiveDate,
    /// Which entries are listed.
    #[serde(default)]
    pub target_move: TargetMove,
    /// Journals to list.
    pub journal_ids: Vec<JournalId>,
}

/// Journal report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalReport {
    /// First day, inclusive.
    pub date_from: NaiveDate,
    /// Last day, inclusive.
    pub date_to: NaiveDate,
    /// Journals, ordered by name.
    pub journals: Vec<JournalSection>,
}

/// One journal of a journal report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalSection {
    /// Journal ID.
    pub journal_id: JournalId,
    /// Journal code.
    pub code: String,
    /// Journal name.
    pub name: String,
    /// Entries, ordered by name.
    pub moves: Vec<JournalMove>,
    /// Tax summary, ordered by tax code.
    pub taxes: Vec<TaxSummary>,
    /// Total debit.
    pub debit: Decimal,
    /// Total credit.
    pub credit: Decimal,
    /// Debit minus credit.
    pub balance: Decimal,
}

/// One entry of a journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalMove {
    /// Entry ID.
    pub move_id: MoveId,
    /// Entry number.
    pub name: String,
    /// Lines.
    pub lines: Vec<JournalLine>,
}

/// One line of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLine {
    /// Move line ID.
    pub move_line_id: MoveLineId,
    /// Account ID.
    pub account_id: AccountId,
    /// Account code.
    pub account_code: String,
    /// Account name.
    pub account: String,
    /// Partner ID.
    pub partner_id: Option<PartnerId>,
    /// Partner name.
    pub partner: Option<String>,
    /// Accounting date.
    pub date: NaiveDate,
    /// Entry number.
    pub entry: String,
    /// Line label.
    pub label: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Tax this line is the amount of.
    pub tax_id: Option<TaxId>,
    /// Tax label of a tax line, or the labels of the base taxes.
    pub taxes_description: String,
}

/// Per-tax totals of a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSummary {
    /// Tax ID.
    pub tax_id: TaxId,
    /// Tax name.
    pub tax_name: String,
    /// Tax code.
    pub tax_code: Option<String>,
    /// Debit of the lines taxed by it.
    pub base_debit: Decimal,
    /// Credit of the lines taxed by it.
    pub base_credit: Decimal,
    /// Base debit minus base credit.
    pub base_balance: Decimal,
    /// Debit of its tax lines.
    pub tax_debit: Decimal,
    /// Credit of its tax lines.
    pub tax_credit: Decimal,
    /// Tax debit minus tax credit.
    pub tax_balance: Decimal,
}

/// Partner accounts listed by an open invoice report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerSelection {
    /// Receivable accounts.
    #[default]
    Customer,
    /// Payable accounts.
    Supplier,
    /// Receivable and payable accounts.
    CustomerSupplier,
}

impl PartnerSelection {
    /// Account types included by this selection.
    #[must_use]
    pub const fn account_types(self) -> &'static [AccountType] {
        match self {
            Self::Customer => &[AccountType::Receivable],
            Self::Supplier => &[AccountType::Payable],
            Self::CustomerSupplier => &[AccountType::Receivable, AccountType::Payable],
        }
    }

    /// Title shown in the report header.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Customer => "Receivable Accounts",
            Self::Supplier => "Payable Accounts",
            Self::CustomerSupplier => "Receivable and Payable Accounts",
        }
    }
}

const fn all_entries() -> TargetMove {
    TargetMove::All
}

/// Parameters of an open invoice report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInvoiceRequest {
    /// Company owning the lines.
    pub company_id: CompanyId,
    /// Lines dated on or before this day are listed.
    pub at_date: NaiveDate,
    /// Clearance date: lines reconciled after it are still listed.
    /// Defaults to `at_date`.
    #[serde(default)]
    pub until_date: Option<NaiveDate>,
    /// Receivable and/or payable accounts.
    #[serde(default)]
    pub result_selection: PartnerSelection,
    /// Which entries are listed.
    #[serde(default = "all_entries")]
    pub target_move: TargetMove,
    /// Partners to list; every partner when empty.
    #[serde(default)]
    pub partner_ids: Vec<PartnerId>,
}

impl OpenInvoiceRequest {
    /// Creates a request over every partner and entry, cleared on `at_date`.
    #[must_use]
    pub const fn new(company_id: CompanyId, at_date: NaiveDate, result_selection: PartnerSelection) -> Self {
        Self {
            company_id,
            at_date,
            until_date: None,
            result_selection,
            target_move: TargetMove::All,
            partner_ids: Vec::new(),
        }
    }

    /// The clearance date.
    #[must_use]
    pub fn clearance_date(&self) -> NaiveDate {
        self.until_date.unwrap_or(self.at_date)
    }
}

/// Open invoice report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenInvoiceReport {
    /// Company owning the lines.
    pub company_id: CompanyId,
    /// Lines dated on or before this day are listed.
    pub at_date: NaiveDate,
    /// Clearance date.
    pub until_date: NaiveDate,
    /// Title of the account selection.
    pub account_filters: String,
    /// Which entries are listed.
    pub target_move: TargetMove,
    /// Accounts with open lines, ordered by code.
    pub accounts: Vec<OpenInvoiceAccount>,
}

/// One account of an open invoice report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenInvoiceAccount {
    /// Account ID.
    pub account_id: AccountId,
    /// "code - name".
    pub name: String,
    /// Partners, ordered by name; lines without partner come last.
    pub partners: Vec<OpenInvoicePartner>,
    /// Total debit.
    pub debit: Decimal,
    /// Total credit.
    pub credit: Decimal,
}

/// Open lines of one partner on one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenInvoicePartner {
    /// Partner ID.
    pub partner_id: Option<PartnerId>,
    /// Partner name.
    pub name: Option<String>,
    /// Lines, ordered by date.
    pub lines: Vec<OpenInvoiceLine>,
    /// Total debit.
    pub debit: Decimal,
    /// Total credit.
    pub credit: Decimal,
    /// Debit minus credit.
    pub balance: Decimal,
}

/// One open line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInvoiceLine {
    /// Move line ID.
    pub move_line_id: MoveLineId,
    /// Accounting date.
    pub date: NaiveDate,
    /// Entry number.
    pub entry: String,
    /// Journal code.
    pub journal: String,
    /// Reference of the entry.
    pub reference: Option<String>,
    /// Line label.
    pub label: String,
    /// Reconciliation name, when reconciled after the clearance date.
    pub reconcile: Option<String>,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}
