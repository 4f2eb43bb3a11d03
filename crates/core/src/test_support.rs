//! Fixture helpers shared by unit tests.

use chrono::NaiveDate;
use misbuilder_shared::types::{
    AccountId, CompanyId, FiscalPeriodId, JournalId, MoveId, MoveLineId,
};
use rust_decimal::Decimal;

use crate::gateway::{Account, AccountKind, AccountType, MoveLine, MoveState};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn account(code: &str, kind: AccountKind, parent_id: Option<AccountId>) -> Account {
    Account {
        id: AccountId::new(),
        company_id: None,
        code: code.into(),
        name: format!("Account {code}"),
        kind,
        internal_type: AccountType::Other,
        parent_id,
        consolidated_ids: Vec::new(),
    }
}

pub fn leaf(code: &str) -> Account {
    account(code, AccountKind::Regular, None)
}

/// A posted line on `account_id`.
pub fn line(account_id: AccountId, on: NaiveDate, debit: Decimal, credit: Decimal) -> MoveLine {
    MoveLine {
        id: MoveLineId::new(),
        move_id: MoveId::new(),
        move_name: format!("MISC/{on}"),
        move_state: MoveState::Posted,
        journal_id: JournalId::new(),
        account_id,
        period_id: None,
        company_id: None,
        partner_id: None,
        partner_name: None,
        date: on,
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

pub trait MoveLineExt {
    fn in_period(self, period_id: FiscalPeriodId) -> Self;
    fn for_company(self, company_id: CompanyId) -> Self;
    fn draft(self) -> Self;
}

impl MoveLineExt for MoveLine {
    fn in_period(mut self, period_id: FiscalPeriodId) -> Self {
        self.period_id = Some(period_id);
        self
    }

    fn for_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    fn draft(mut self) -> Self {
        self.move_state = MoveState::Draft;
        self
    }
}
