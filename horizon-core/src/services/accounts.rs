//! Account service - cached account projections

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::{Account, Result, UserScope};

/// Account service over the cached projections
pub struct AccountService {
    store: Arc<DuckDbStore>,
}

impl AccountService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// All cached accounts across this identity's linked items
    pub fn list(&self, scope: &UserScope) -> Result<Vec<Account>> {
        self.store.get_accounts_for_identity(scope.identity_id())
    }

    /// Headline figures for the dashboard
    ///
    /// Current balances are summed as reported; there is no currency
    /// conversion. Accounts without a reported balance contribute zero.
    pub fn summary(&self, scope: &UserScope) -> Result<AccountsSummary> {
        let accounts = self.list(scope)?;
        let total_current_balance = accounts
            .iter()
            .filter_map(|a| a.current_balance)
            .sum::<Decimal>();

        Ok(AccountsSummary {
            total_accounts: accounts.len(),
            total_current_balance,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AccountsSummary {
    pub total_accounts: usize,
    pub total_current_balance: Decimal,
}
