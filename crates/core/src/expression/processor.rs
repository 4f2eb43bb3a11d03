//! Accounting expression engine.
//!
//! Usage follows a fixed lifecycle:
//!
//! 1. [`ExpressionEngine::parse`] every formula of the report, so variables
//!    sharing a filter and a mode are grouped under one [`QueryKey`];
//! 2. [`ExpressionEngine::finalize`] once, resolving account codes;
//! 3. per column, [`ExpressionEngine::execute`] with that column's mode
//!    filters, then [`ExpressionEngine::substitute`] each formula.
//!
//! Each column costs one aggregate query per key, whatever the number of
//! formulas.

use std::collections::{BTreeMap, BTreeSet};

use misbuilder_shared::types::AccountId;
use rust_decimal::Decimal;
use tracing::debug;

use super::accounts::{AccountIds, AccountResolver};
use super::error::ExpressionError;
use super::token::{self, AccountingVariable, Field, Mode, QueryKey};
use crate::domain::{Domain, DomainValue, Operator};
use crate::gateway::{Aggregates, DebitCredit, GroupBy, LedgerGateway};

/// Lifecycle state of an [`ExpressionEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting formulas.
    Parsing,
    /// Account codes resolved; ready to query.
    Finalized,
    /// Aggregates loaded for a column.
    Executed,
}

impl EngineState {
    const fn name(self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Finalized => "finalized",
            Self::Executed => "executed",
        }
    }
}

/// Ledger filters of one column, one per mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeFilters {
    /// Filter for variation-mode variables.
    pub variation: Domain,
    /// Filter for initial-mode variables.
    pub initial: Domain,
    /// Filter for end-mode variables.
    pub end: Domain,
}

impl ModeFilters {
    /// Returns the filter of `mode`.
    #[must_use]
    pub fn for_mode(&self, mode: Mode) -> &Domain {
        match mode {
            Mode::Variation => &self.variation,
            Mode::Initial => &self.initial,
            Mode::End => &self.end,
        }
    }
}

/// Parses accounting variables, batches their queries and substitutes results.
pub struct ExpressionEngine<'g, G: LedgerGateway + ?Sized> {
    gateway: &'g G,
    resolver: AccountResolver<'g, G>,
    state: EngineState,
    pending_codes: BTreeMap<QueryKey, BTreeSet<String>>,
    unrestricted: BTreeSet<QueryKey>,
    account_ids: BTreeMap<QueryKey, BTreeSet<AccountId>>,
    ids_by_code: BTreeMap<String, AccountIds>,
    data: BTreeMap<QueryKey, Aggregates>,
}

impl<'g, G: LedgerGateway + ?Sized> ExpressionEngine<'g, G> {
    /// Creates an engine reading from `gateway`.
    #[must_use]
    pub fn new(gateway: &'g G) -> Self {
        Self {
            gateway,
            resolver: AccountResolver::new(gateway),
            state: EngineState::Parsing,
            pending_codes: BTreeMap::new(),
            unrestricted: BTreeSet::new(),
            account_ids: BTreeMap::new(),
            ids_by_code: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Number of distinct query keys collected so far.
    #[must_use]
    pub fn key_count(&self) -> usize {
        let mut keys: BTreeSet<&QueryKey> = self.pending_codes.keys().collect();
        keys.extend(self.account_ids.keys());
        keys.extend(self.unrestricted.iter());
        keys.len()
    }

    fn require(&self, allowed: &[EngineState], operation: &'static str) -> Result<(), ExpressionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ExpressionError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    /// Registers the variables of `expr`. May be called any number of times
    /// before [`finalize`](Self::finalize).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after finalize, and `Domain` for a malformed
    /// filter clause; in that case nothing of `expr` is registered.
    pub fn parse(&mut self, expr: &str) -> Result<(), ExpressionError> {
        self.require(&[EngineState::Parsing], "parse")?;
        for variable in token::scan(expr)? {
            let key = variable.key();
            if variable.is_unrestricted() {
                self.unrestricted.insert(key);
            } else {
                self.pending_codes
                    .entry(key)
                    .or_default()
                    .extend(variable.account_codes);
            }
        }
        Ok(())
    }

    /// Resolves every collected account code under `restriction` (typically
    /// the report company). Must be called exactly once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if already finalized, or a gateway error.
    pub fn finalize(&mut self, restriction: &Domain) -> Result<(), ExpressionError> {
        self.require(&[EngineState::Parsing], "finalize")?;
        for (key, codes) in std::mem::take(&mut self.pending_codes) {
            let mut ids = BTreeSet::new();
            for code in codes {
                let resolved = self.resolver.resolve(&code, restriction)?;
                ids.extend(resolved.iter().copied());
                self.ids_by_code.insert(code, resolved);
            }
            self.account_ids.insert(key, ids);
        }
        debug!(
            keys = self.account_ids.len() + self.unrestricted.len(),
            codes = self.ids_by_code.len(),
            "expression engine finalized"
        );
        self.state = EngineState::Finalized;
        Ok(())
    }

    /// Loads the aggregates of one column, replacing those of the previous
    /// call. Issues one grouped query per key with account codes and one
    /// ungrouped query per key with unrestricted variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` before finalize, or a gateway error.
    pub fn execute(&mut self, filters: &ModeFilters) -> Result<(), ExpressionError> {
        self.require(&[EngineState::Finalized, EngineState::Executed], "execute")?;
        let mut data: BTreeMap<QueryKey, Aggregates> = BTreeMap::new();

        for (key, ids) in &self.account_ids {
            let filter = Domain::and([
                key.domain.clone(),
                filters.for_mode(key.mode).clone(),
                Domain::is_in("account_id", DomainValue::ids(ids.iter().copied())),
            ]);
            let rows = self.gateway.aggregate(&filter, GroupBy::Account)?;
            data.entry(key.clone()).or_default().extend(rows);
        }

        for key in &self.unrestricted {
            let filter = Domain::and([key.domain.clone(), filters.for_mode(key.mode).clone()]);
            let rows = self.gateway.aggregate(&filter, GroupBy::Nothing)?;
            let total = rows.get(&None).copied().unwrap_or_default();
            data.entry(key.clone()).or_default().insert(None, total);
        }

        self.data = data;
        self.state = EngineState::Executed;
        Ok(())
    }

    /// Returns `expr` with every accounting variable replaced by its value
    /// for the last executed column, as a parenthesized decimal literal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` before execute, and `UnknownVariable` for a
    /// variable whose codes were never parsed.
    pub fn substitute(&self, expr: &str) -> Result<String, ExpressionError> {
        self.require(&[EngineState::Executed], "substitute")?;
        token::replace(expr, |variable| {
            let value = self.value_of(variable)?;
            Ok(format!("({value})"))
        })
    }

    /// Computes the value of one variable for the last executed column.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariable` if its codes were never parsed.
    pub fn value_of(&self, variable: &AccountingVariable) -> Result<Decimal, ExpressionError> {
        let key = variable.key();
        let rows = self.data.get(&key);
        let amounts = |account: Option<AccountId>| -> DebitCredit {
            rows.and_then(|r| r.get(&account)).copied().unwrap_or_default()
        };

        let mut total = DebitCredit::default();
        if variable.is_unrestricted() {
            total += amounts(None);
        } else {
            for id in self.ids_of(variable)? {
                total += amounts(Some(id));
            }
        }
        Ok(match variable.field {
            Field::Balance => total.balance(),
            Field::Debit => total.debit,
            Field::Credit => total.credit,
        })
    }

    /// Union of the account ids of a variable's codes.
    fn ids_of(&self, variable: &AccountingVariable) -> Result<BTreeSet<AccountId>, ExpressionError> {
        let mut ids = BTreeSet::new();
        for code in &variable.account_codes {
            let resolved = self
                .ids_by_code
                .get(code)
                .ok_or_else(|| ExpressionError::UnknownVariable(code.clone()))?;
            ids.extend(resolved.iter().copied());
        }
        Ok(ids)
    }

    /// Returns the move line filter listing the rows behind `expr`, or `None`
    /// if it has no variable eligible for drill-down.
    ///
    /// Initial-mode variables are left out: an opening balance has no row
    /// level equivalent within the column window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` before finalize, and parse errors.
    pub fn domain_for(&self, expr: &str) -> Result<Option<Domain>, ExpressionError> {
        self.require(&[EngineState::Finalized, EngineState::Executed], "build a drill-down domain")?;
        let mut domains = Vec::new();
        for variable in token::scan(expr)? {
            if variable.mode == Mode::Initial {
                continue;
            }
            let mut parts = vec![variable.domain.clone()];
            if !variable.is_unrestricted() {
                parts.push(Domain::is_in(
                    "account_id",
                    DomainValue::ids(self.ids_of(&variable)?),
                ));
            }
            match variable.field {
                Field::Credit => parts.push(Domain::cond("credit", Operator::Gt, Decimal::ZERO)),
                Field::Debit => parts.push(Domain::cond("debit", Operator::Gt, Decimal::ZERO)),
                Field::Balance => {}
            }
            domains.push(Domain::and(parts));
        }
        Ok(if domains.is_empty() {
            None
        } else {
            Some(Domain::or(domains))
        })
    }
}
