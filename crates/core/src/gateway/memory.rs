//! In-memory ledger gateway.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use misbuilder_shared::types::{AccountId, TaxId};
use serde::Deserialize;
use tracing::debug;

use super::error::GatewayError;
use super::types::{
    Account, Aggregates, DebitCredit, GroupBy, Journal, MoveLine, PeriodOrder, RecordRow, Tax,
};
use super::{JournalGateway, LedgerGateway};
use crate::domain::Domain;
use crate::fiscal::FiscalPeriod;

/// A ledger held in memory, loadable from a JSON fixture.
///
/// Aggregate queries are counted so callers can check how many round trips a
/// computation would cost against a real store.
#[derive(Debug, Default, Deserialize)]
pub struct InMemoryLedger {
    /// Chart of accounts.
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Fiscal calendar of every company.
    #[serde(default)]
    pub periods: Vec<FiscalPeriod>,
    /// Journal items.
    #[serde(default)]
    pub move_lines: Vec<MoveLine>,
    /// Journals.
    #[serde(default)]
    pub journals: Vec<Journal>,
    /// Taxes.
    #[serde(default)]
    pub taxes: Vec<Tax>,
    /// Records of auxiliary models, by model name.
    #[serde(default)]
    pub records: BTreeMap<String, Vec<RecordRow>>,
    #[serde(skip)]
    aggregate_count: AtomicUsize,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account.
    #[must_use]
    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// Adds a fiscal period.
    #[must_use]
    pub fn with_period(mut self, period: FiscalPeriod) -> Self {
        self.periods.push(period);
        self
    }

    /// Adds a move line.
    #[must_use]
    pub fn with_move_line(mut self, line: MoveLine) -> Self {
        self.move_lines.push(line);
        self
    }

    /// Adds a journal.
    #[must_use]
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journals.push(journal);
        self
    }

    /// Adds a tax.
    #[must_use]
    pub fn with_tax(mut self, tax: Tax) -> Self {
        self.taxes.push(tax);
        self
    }

    /// Adds a record of an auxiliary model.
    #[must_use]
    pub fn with_record(mut self, model: impl Into<String>, row: RecordRow) -> Self {
        self.records.entry(model.into()).or_default().push(row);
        self
    }

    /// Number of aggregate queries served so far.
    #[must_use]
    pub fn aggregate_count(&self) -> usize {
        self.aggregate_count.load(Ordering::Relaxed)
    }

    /// Resets the aggregate query counter.
    pub fn reset_counters(&self) {
        self.aggregate_count.store(0, Ordering::Relaxed);
    }

    fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }
}

impl LedgerGateway for InMemoryLedger {
    fn aggregate(&self, filter: &Domain, group_by: GroupBy) -> Result<Aggregates, GatewayError> {
        self.aggregate_count.fetch_add(1, Ordering::Relaxed);
        debug!(%filter, ?group_by, "aggregate query");

        let mut result = Aggregates::new();
        if group_by == GroupBy::Nothing {
            result.insert(None, DebitCredit::default());
        }
        for line in self.move_lines.iter().filter(|l| filter.matches(*l)) {
            let key = match group_by {
                GroupBy::Account => Some(line.account_id),
                GroupBy::Nothing => None,
            };
            *result.entry(key).or_default() += DebitCredit::new(line.debit, line.credit);
        }
        Ok(result)
    }

    fn search_accounts(&self, filter: &Domain) -> Result<Vec<Account>, GatewayError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .filter(|a| filter.matches(*a))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    fn expand_hierarchical_account(&self, id: AccountId) -> Result<Vec<Account>, GatewayError> {
        let root = self.account(id).ok_or(GatewayError::AccountNotFound(id))?;

        let mut seen = BTreeSet::from([root.id]);
        let mut queue = VecDeque::from([root]);
        let mut descendants = Vec::new();
        while let Some(current) = queue.pop_front() {
            let children = self
                .accounts
                .iter()
                .filter(|a| a.parent_id == Some(current.id))
                .chain(current.consolidated_ids.iter().filter_map(|c| self.account(*c)));
            for child in children {
                if seen.insert(child.id) {
                    descendants.push(child.clone());
                    queue.push_back(child);
                }
            }
        }
        descendants.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(descendants)
    }

    fn list_fiscal_periods(
        &self,
        filter: &Domain,
        order: PeriodOrder,
        limit: Option<usize>,
    ) -> Result<Vec<FiscalPeriod>, GatewayError> {
        let mut periods: Vec<FiscalPeriod> = self
            .periods
            .iter()
            .filter(|p| filter.matches(*p))
            .cloned()
            .collect();
        // Special periods sort before the normal period sharing their start date.
        periods.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then_with(|| b.special.cmp(&a.special))
                .then_with(|| a.name.cmp(&b.name))
        });
        if order == PeriodOrder::StartDesc {
            periods.reverse();
        }
        if let Some(limit) = limit {
            periods.truncate(limit);
        }
        Ok(periods)
    }

    fn has_move_lines(&self, filter: &Domain) -> Result<bool, GatewayError> {
        Ok(self.move_lines.iter().any(|l| filter.matches(l)))
    }

    fn search_move_lines(&self, filter: &Domain) -> Result<Vec<MoveLine>, GatewayError> {
        let mut lines: Vec<MoveLine> = self
            .move_lines
            .iter()
            .filter(|l| filter.matches(*l))
            .cloned()
            .collect();
        lines.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.move_name.cmp(&b.move_name)));
        Ok(lines)
    }

    fn fetch_records(
        &self,
        model: &str,
        filter: &Domain,
        fields: &[String],
    ) -> Result<Vec<RecordRow>, GatewayError> {
        let rows = self
            .records
            .get(model)
            .ok_or_else(|| GatewayError::UnknownModel(model.to_string()))?;
        Ok(rows
            .iter()
            .filter(|row| filter.matches(*row))
            .map(|row| {
                if fields.is_empty() {
                    row.clone()
                } else {
                    row.iter()
                        .filter(|(name, _)| name.as_str() == "id" || fields.contains(name))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                }
            })
            .collect())
    }
}

impl JournalGateway for InMemoryLedger {
    fn list_journals(&self, filter: &Domain) -> Result<Vec<Journal>, GatewayError> {
        Ok(self
            .journals
            .iter()
            .filter(|j| filter.matches(*j))
            .cloned()
            .collect())
    }

    fn list_taxes(&self, ids: &[TaxId]) -> Result<Vec<Tax>, GatewayError> {
        Ok(self
            .taxes
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainValue, Operator};
    use crate::gateway::types::{AccountKind, AccountType, MoveState};
    use chrono::NaiveDate;
    use misbuilder_shared::types::{JournalId, MoveId, MoveLineId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account(code: &str, kind: AccountKind, parent: Option<AccountId>) -> Account {
        Account {
            id: AccountId::new(),
            company_id: None,
            code: code.into(),
            name: format!("Account {code}"),
            kind,
            internal_type: AccountType::Other,
            parent_id: parent,
            consolidated_ids: Vec::new(),
        }
    }

    fn line(account_id: AccountId, debit: Decimal, credit: Decimal) -> MoveLine {
        MoveLine {
            id: MoveLineId::new(),
            move_id: MoveId::new(),
            move_name: "MISC/001".into(),
            move_state: MoveState::Posted,
            journal_id: JournalId::new(),
            account_id,
            period_id: None,
            company_id: None,
            partner_id: None,
            partner_name: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            name: String::new(),
            reference: None,
            date_maturity: None,
            reconcile_name: None,
            reconcile_date: None,
            debit,
            credit,
            tax_line_id: None,
            tax_ids: Vec::new(),
        }
    }

    #[test]
    fn test_aggregate_groups_by_account_and_counts_queries() {
        let a = account("600", AccountKind::Regular, None);
        let b = account("700", AccountKind::Regular, None);
        let ledger = InMemoryLedger::new()
            .with_move_line(line(a.id, dec!(10), dec!(0)))
            .with_move_line(line(a.id, dec!(5), dec!(2)))
            .with_move_line(line(b.id, dec!(0), dec!(40)))
            .with_account(a.clone())
            .with_account(b.clone());

        let grouped = ledger.aggregate(&Domain::True, GroupBy::Account).unwrap();
        assert_eq!(grouped[&Some(a.id)], DebitCredit::new(dec!(15), dec!(2)));
        assert_eq!(grouped[&Some(b.id)], DebitCredit::new(dec!(0), dec!(40)));

        let total = ledger.aggregate(&Domain::True, GroupBy::Nothing).unwrap();
        assert_eq!(total[&None], DebitCredit::new(dec!(15), dec!(42)));
        assert_eq!(ledger.aggregate_count(), 2);

        ledger.reset_counters();
        assert_eq!(ledger.aggregate_count(), 0);
    }

    #[test]
    fn test_ungrouped_aggregate_without_lines_has_one_zero_row() {
        let ledger = InMemoryLedger::new();
        let total = ledger.aggregate(&Domain::True, GroupBy::Nothing).unwrap();
        assert_eq!(total.len(), 1);
        assert_eq!(total[&None], DebitCredit::default());
    }

    #[test]
    fn test_expand_follows_parents_and_consolidation_links() {
        let root = account("1", AccountKind::View, None);
        let mid = account("10", AccountKind::View, Some(root.id));
        let leaf = account("100", AccountKind::Regular, Some(mid.id));
        let other = account("200", AccountKind::Regular, None);
        let mut consol = account("9", AccountKind::Consolidation, None);
        consol.consolidated_ids = vec![root.id, other.id];

        let ledger = InMemoryLedger::new()
            .with_account(root.clone())
            .with_account(mid.clone())
            .with_account(leaf.clone())
            .with_account(other.clone())
            .with_account(consol.clone());

        let ids: Vec<AccountId> = ledger
            .expand_hierarchical_account(root.id)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![mid.id, leaf.id]);

        let consol_ids: BTreeSet<AccountId> = ledger
            .expand_hierarchical_account(consol.id)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(
            consol_ids,
            BTreeSet::from([root.id, mid.id, leaf.id, other.id])
        );
    }

    #[test]
    fn test_expand_unknown_account_fails() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.expand_hierarchical_account(AccountId::new()),
            Err(GatewayError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_list_periods_orders_and_limits() {
        let make = |name: &str, month: u32, special: bool| FiscalPeriod {
            id: misbuilder_shared::types::FiscalPeriodId::new(),
            company_id: None,
            name: name.into(),
            start_date: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, month, 28).unwrap(),
            special,
        };
        let ledger = InMemoryLedger::new()
            .with_period(make("02/2024", 2, false))
            .with_period(make("01/2024", 1, false))
            .with_period(make("00/2024", 1, true));

        let asc = ledger
            .list_fiscal_periods(&Domain::True, PeriodOrder::StartAsc, None)
            .unwrap();
        let names: Vec<&str> = asc.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["00/2024", "01/2024", "02/2024"]);

        let latest_normal = ledger
            .list_fiscal_periods(&Domain::eq("special", false), PeriodOrder::StartDesc, Some(1))
            .unwrap();
        assert_eq!(latest_normal[0].name, "02/2024");
    }

    #[test]
    fn test_fetch_records_projects_fields() {
        let row = RecordRow::from([
            ("id".to_string(), DomainValue::Number(dec!(1))),
            ("amount".to_string(), DomainValue::Number(dec!(12))),
            ("state".to_string(), DomainValue::from("open")),
        ]);
        let ledger = InMemoryLedger::new().with_record("invoice", row);

        let rows = ledger
            .fetch_records(
                "invoice",
                &Domain::cond("amount", Operator::Gt, dec!(10)),
                &["amount".to_string()],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains_key("id"));
        assert!(!rows[0].contains_key("state"));

        assert!(matches!(
            ledger.fetch_records("unknown", &Domain::True, &[]),
            Err(GatewayError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_ledger_deserializes_from_fixture() {
        let json = r#"{
            "accounts": [{"id": "0190a5a4-0000-7000-8000-000000000001", "code": "700", "name": "Sales"}],
            "move_lines": []
        }"#;
        let ledger: InMemoryLedger = serde_json::from_str(json).unwrap();
        assert_eq!(ledger.accounts.len(), 1);
        assert_eq!(ledger.accounts[0].kind, AccountKind::Regular);
    }
}
