//! Ledger records exchanged with the gateway.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use chrono::NaiveDate;
use misbuilder_shared::types::{
    AccountId, CompanyId, FiscalPeriodId, JournalId, MoveId, MoveLineId, PartnerId, TaxId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainValue, FieldSource};

/// Kind of a chart of accounts entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Postable account.
    #[default]
    Regular,
    /// Parent account summing its children.
    View,
    /// Account summing a set of consolidated accounts.
    Consolidation,
}

impl AccountKind {
    /// Returns true for accounts that never hold postings themselves.
    #[must_use]
    pub const fn is_hierarchical(self) -> bool {
        matches!(self, Self::View | Self::Consolidation)
    }

    /// Returns the lowercase name used in filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::View => "view",
            Self::Consolidation => "consolidation",
        }
    }
}

/// Partner balance an account keeps track of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Neither receivable nor payable.
    #[default]
    Other,
    /// Amounts owed by customers.
    Receivable,
    /// Amounts owed to suppliers.
    Payable,
}

impl AccountType {
    /// Returns the lowercase name used in filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Other => "other",
            Self::Receivable => "receivable",
            Self::Payable => "payable",
        }
    }
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Owning company.
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    /// Account code (e.g., "7010").
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account kind.
    #[serde(default)]
    pub kind: AccountKind,
    /// Receivable, payable or other.
    #[serde(default)]
    pub internal_type: AccountType,
    /// Parent in the chart hierarchy.
    #[serde(default)]
    pub parent_id: Option<AccountId>,
    /// Accounts consolidated by a consolidation account.
    #[serde(default)]
    pub consolidated_ids: Vec<AccountId>,
}

impl FieldSource for Account {
    fn field(&self, name: &str) -> Option<DomainValue> {
        let value = match name {
            "id" => DomainValue::Id(self.id.into_inner()),
            "company_id" => DomainValue::opt_id(self.company_id),
            "code" => DomainValue::Str(self.code.clone()),
            "name" => DomainValue::Str(self.name.clone()),
            "kind" | "type" => DomainValue::from(self.kind.as_str()),
            "internal_type" => DomainValue::from(self.internal_type.as_str()),
            "parent_id" => DomainValue::opt_id(self.parent_id),
            _ => return None,
        };
        Some(value)
    }
}

/// State of the journal entry a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    /// Not yet validated.
    #[default]
    Draft,
    /// Validated.
    Posted,
}

impl MoveState {
    /// Returns the lowercase name used in filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Posted => "posted",
        }
    }
}

/// A journal item, with the few fields of its entry that reports filter on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLine {
    /// Unique identifier.
    pub id: MoveLineId,
    /// Journal entry.
    pub move_id: MoveId,
    /// Journal entry number.
    #[serde(default)]
    pub move_name: String,
    /// Journal entry state.
    #[serde(default)]
    pub move_state: MoveState,
    /// Journal.
    pub journal_id: JournalId,
    /// Account.
    pub account_id: AccountId,
    /// Fiscal period of the entry.
    #[serde(default)]
    pub period_id: Option<FiscalPeriodId>,
    /// Owning company.
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    /// Partner.
    #[serde(default)]
    pub partner_id: Option<PartnerId>,
    /// Partner display name.
    #[serde(default)]
    pub partner_name: Option<String>,
    /// Accounting date.
    pub date: NaiveDate,
    /// Line label.
    #[serde(default)]
    pub name: String,
    /// Reference of the entry.
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    /// Due date.
    #[serde(default)]
    pub date_maturity: Option<NaiveDate>,
    /// Name of the full reconciliation clearing this line.
    #[serde(default)]
    pub reconcile_name: Option<String>,
    /// Date of that reconciliation.
    #[serde(default)]
    pub reconcile_date: Option<NaiveDate>,
    /// Debit amount.
    #[serde(default)]
    pub debit: Decimal,
    /// Credit amount.
    #[serde(default)]
    pub credit: Decimal,
    /// Tax this line is the tax amount of.
    #[serde(default)]
    pub tax_line_id: Option<TaxId>,
    /// Taxes applied on this line as a base.
    #[serde(default)]
    pub tax_ids: Vec<TaxId>,
}

impl MoveLine {
    /// Returns true if the line is not cleared on `date`.
    ///
    /// A reconciliation without a date clears the line whatever `date` is.
    #[must_use]
    pub fn is_open_at(&self, date: NaiveDate) -> bool {
        self.reconcile_name.is_none() || self.reconcile_date.is_some_and(|cleared| cleared > date)
    }
}

impl FieldSource for MoveLine {
    fn field(&self, name: &str) -> Option<DomainValue> {
        let value = match name {
            "id" => DomainValue::Id(self.id.into_inner()),
            "move_id" => DomainValue::Id(self.move_id.into_inner()),
            "move_name" => DomainValue::Str(self.move_name.clone()),
            "move_state" => DomainValue::from(self.move_state.as_str()),
            "journal_id" => DomainValue::Id(self.journal_id.into_inner()),
            "account_id" => DomainValue::Id(self.account_id.into_inner()),
            "period_id" => DomainValue::opt_id(self.period_id),
            "company_id" => DomainValue::opt_id(self.company_id),
            "partner_id" => DomainValue::opt_id(self.partner_id),
            "date" => DomainValue::Date(self.date),
            "name" => DomainValue::Str(self.name.clone()),
            "ref" => self.reference.clone().map_or(DomainValue::Null, DomainValue::Str),
            "date_maturity" => self.date_maturity.map_or(DomainValue::Null, DomainValue::Date),
            "reconcile_name" => self.reconcile_name.clone().map_or(DomainValue::Null, DomainValue::Str),
            "debit" => DomainValue::Number(self.debit),
            "credit" => DomainValue::Number(self.credit),
            "tax_line_id" => DomainValue::opt_id(self.tax_line_id),
            "tax_ids" => DomainValue::ids(self.tax_ids.iter().copied()),
            _ => return None,
        };
        Some(value)
    }
}

/// An accounting journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    /// Unique identifier.
    pub id: JournalId,
    /// Owning company.
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    /// Short code (e.g., "BNK").
    pub code: String,
    /// Journal name.
    pub name: String,
}

impl FieldSource for Journal {
    fn field(&self, name: &str) -> Option<DomainValue> {
        let value = match name {
            "id" => DomainValue::Id(self.id.into_inner()),
            "company_id" => DomainValue::opt_id(self.company_id),
            "code" => DomainValue::Str(self.code.clone()),
            "name" => DomainValue::Str(self.name.clone()),
            _ => return None,
        };
        Some(value)
    }
}

/// A tax definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    /// Unique identifier.
    pub id: TaxId,
    /// Tax name.
    pub name: String,
    /// Short code shown on reports.
    #[serde(default)]
    pub description: Option<String>,
}

impl Tax {
    /// Returns the code when set, the name otherwise.
    #[must_use]
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }
}

/// Debit and credit sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebitCredit {
    /// Total debit.
    pub debit: Decimal,
    /// Total credit.
    pub credit: Decimal,
}

impl DebitCredit {
    /// Creates a new pair.
    #[must_use]
    pub const fn new(debit: Decimal, credit: Decimal) -> Self {
        Self { debit, credit }
    }

    /// Debit minus credit.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.debit - self.credit
    }
}

impl AddAssign for DebitCredit {
    fn add_assign(&mut self, rhs: Self) {
        self.debit += rhs.debit;
        self.credit += rhs.credit;
    }
}

/// Grouping of aggregate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// One row per account, keyed by `Some(account_id)`.
    Account,
    /// A single row keyed by `None`.
    Nothing,
}

/// Ordering of fiscal period listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodOrder {
    /// Oldest first.
    StartAsc,
    /// Most recent first.
    StartDesc,
}

/// Result of an aggregate query.
pub type Aggregates = BTreeMap<Option<AccountId>, DebitCredit>;

/// A generic record returned by auxiliary queries, field name to value.
pub type RecordRow = BTreeMap<String, DomainValue>;

impl FieldSource for RecordRow {
    fn field(&self, name: &str) -> Option<DomainValue> {
        self.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use rust_decimal_macros::dec;

    #[test]
    fn test_debit_credit_accumulates() {
        let mut total = DebitCredit::default();
        total += DebitCredit::new(dec!(100), dec!(30));
        total += DebitCredit::new(dec!(5), dec!(80));
        assert_eq!(total, DebitCredit::new(dec!(105), dec!(110)));
        assert_eq!(total.balance(), dec!(-5));
    }

    #[test]
    fn test_hierarchical_kinds() {
        assert!(!AccountKind::Regular.is_hierarchical());
        assert!(AccountKind::View.is_hierarchical());
        assert!(AccountKind::Consolidation.is_hierarchical());
    }

    #[test]
    fn test_tax_label_prefers_description() {
        let mut tax = Tax {
            id: TaxId::new(),
            name: "VAT 21%".into(),
            description: Some("V21".into()),
        };
        assert_eq!(tax.label(), "V21");
        tax.description = None;
        assert_eq!(tax.label(), "VAT 21%");
    }

    #[test]
    fn test_move_line_tax_ids_match_membership() {
        let tax = TaxId::new();
        let line = MoveLine {
            id: MoveLineId::new(),
            move_id: MoveId::new(),
            move_name: "INV/001".into(),
            move_state: MoveState::Posted,
            journal_id: JournalId::new(),
            account_id: AccountId::new(),
            period_id: None,
            company_id: None,
            partner_id: None,
            partner_name: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            name: "Sale".into(),
            reference: None,
            date_maturity: None,
            reconcile_name: None,
            reconcile_date: None,
            debit: dec!(0),
            credit: dec!(100),
            tax_line_id: None,
            tax_ids: vec![tax],
        };
        assert!(Domain::is_in("tax_ids", DomainValue::ids([tax])).matches(&line));
        assert!(Domain::eq("move_state", "posted").matches(&line));
        assert!(!Domain::eq("tax_line_id", DomainValue::ids([tax])).matches(&line));
    }

    #[test]
    fn test_line_is_open_until_its_reconciliation() {
        let on = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let mut line = MoveLine {
            id: MoveLineId::new(),
            move_id: MoveId::new(),
            move_name: "INV/002".into(),
            move_state: MoveState::Posted,
            journal_id: JournalId::new(),
            account_id: AccountId::new(),
            period_id: None,
            company_id: None,
            partner_id: None,
            partner_name: None,
            date: on(1),
            name: "Invoice".into(),
            reference: Some("SO042".into()),
            date_maturity: Some(on(31)),
            reconcile_name: None,
            reconcile_date: None,
            debit: dec!(100),
            credit: dec!(0),
            tax_line_id: None,
            tax_ids: Vec::new(),
        };
        assert!(line.is_open_at(on(20)));

        line.reconcile_name = Some("A1".into());
        line.reconcile_date = Some(on(15));
        assert!(line.is_open_at(on(10)));
        assert!(!line.is_open_at(on(15)));

        line.reconcile_date = None;
        assert!(!line.is_open_at(on(1)));
        assert!(Domain::eq("ref", "SO042").matches(&line));
    }
}
