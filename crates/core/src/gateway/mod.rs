//! Ledger Query Gateway.
//!
//! Every ledger read performed by the report engine goes through the
//! [`LedgerGateway`] trait. One gateway instance is borrowed by all
//! components of a computation so that every aggregate reflects the same
//! snapshot of the ledger.

pub mod error;
pub mod memory;
pub mod types;

pub use error::GatewayError;
pub use memory::InMemoryLedger;
pub use types::{
    Account, AccountKind, AccountType, Aggregates, DebitCredit, GroupBy, Journal, MoveLine, MoveState,
    PeriodOrder, RecordRow, Tax,
};

use misbuilder_shared::types::{AccountId, TaxId};

use crate::domain::Domain;
use crate::fiscal::FiscalPeriod;

/// Read access to the ledger.
///
/// Implemented by the persistence layer of the host application, and by
/// [`InMemoryLedger`] for fixtures and tests.
pub trait LedgerGateway: Send + Sync {
    /// Sums debit and credit of the move lines matching `filter`.
    ///
    /// With [`GroupBy::Account`] the result has one entry per account that
    /// has matching lines. With [`GroupBy::Nothing`] it has exactly one entry
    /// keyed by `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn aggregate(&self, filter: &Domain, group_by: GroupBy) -> Result<Aggregates, GatewayError>;

    /// Lists accounts matching `filter`, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn search_accounts(&self, filter: &Domain) -> Result<Vec<Account>, GatewayError>;

    /// Lists the transitive descendants of a hierarchical account, excluding itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist or the query fails.
    fn expand_hierarchical_account(&self, id: AccountId) -> Result<Vec<Account>, GatewayError>;

    /// Lists fiscal periods matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_fiscal_periods(
        &self,
        filter: &Domain,
        order: PeriodOrder,
        limit: Option<usize>,
    ) -> Result<Vec<FiscalPeriod>, GatewayError>;

    /// Returns true if at least one move line matches `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn has_move_lines(&self, filter: &Domain) -> Result<bool, GatewayError>;

    /// Lists the move lines matching `filter`, ordered by date.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn search_move_lines(&self, filter: &Domain) -> Result<Vec<MoveLine>, GatewayError>;

    /// Reads `fields` of the records of `model` matching `filter`.
    ///
    /// An empty `fields` slice reads every field.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unknown or the query fails.
    fn fetch_records(
        &self,
        model: &str,
        filter: &Domain,
        fields: &[String],
    ) -> Result<Vec<RecordRow>, GatewayError>;
}

/// Lookups needed by the journal report.
pub trait JournalGateway: LedgerGateway {
    /// Lists journals matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_journals(&self, filter: &Domain) -> Result<Vec<Journal>, GatewayError>;

    /// Returns the taxes with the given ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_taxes(&self, ids: &[TaxId]) -> Result<Vec<Tax>, GatewayError>;
}
