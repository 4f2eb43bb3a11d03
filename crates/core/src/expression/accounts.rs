//! Account Resolver.

use std::collections::BTreeSet;
use std::sync::Arc;

use misbuilder_shared::types::AccountId;
use moka::sync::Cache;
use tracing::debug;

use super::error::ExpressionError;
use crate::domain::{Domain, Operator};
use crate::gateway::LedgerGateway;

/// Resolved account ids of one code.
pub type AccountIds = Arc<BTreeSet<AccountId>>;

/// Maps account codes to the leaf accounts they stand for.
///
/// Results are cached per code string; one resolver serves a single
/// account restriction for its whole lifetime.
pub struct AccountResolver<'g, G: LedgerGateway + ?Sized> {
    gateway: &'g G,
    cache: Cache<String, AccountIds>,
}

impl<'g, G: LedgerGateway + ?Sized> AccountResolver<'g, G> {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new(gateway: &'g G) -> Self {
        Self {
            gateway,
            cache: Cache::builder().build(),
        }
    }

    /// Resolves `code` to leaf account ids.
    ///
    /// Codes containing `%` match by pattern, other codes match exactly.
    /// View and consolidation accounts are replaced by their
    /// non-hierarchical descendants. A code matching nothing resolves to an
    /// empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway fails.
    pub fn resolve(&self, code: &str, restriction: &Domain) -> Result<AccountIds, ExpressionError> {
        if let Some(ids) = self.cache.get(code) {
            return Ok(ids);
        }

        let by_code = if code.contains('%') {
            Domain::cond("code", Operator::Like, code)
        } else {
            Domain::eq("code", code)
        };
        let accounts = self
            .gateway
            .search_accounts(&by_code.with(restriction.clone()))?;

        let mut ids = BTreeSet::new();
        for account in accounts {
            if account.kind.is_hierarchical() {
                ids.extend(
                    self.gateway
                        .expand_hierarchical_account(account.id)?
                        .into_iter()
                        .filter(|a| !a.kind.is_hierarchical())
                        .map(|a| a.id),
                );
            } else {
                ids.insert(account.id);
            }
        }
        if ids.is_empty() {
            debug!(code, "account code matches no account");
        }

        let ids = Arc::new(ids);
        self.cache.insert(code.to_string(), Arc::clone(&ids));
        Ok(ids)
    }

    /// Number of codes resolved so far.
    #[must_use]
    pub fn cached_codes(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
