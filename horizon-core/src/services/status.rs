//! Status service - one-glance summary of an identity's data

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::{Result, UserScope};

/// Status service for dashboard-style counts
pub struct StatusService {
    store: Arc<DuckDbStore>,
}

impl StatusService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Summarize what this identity has linked and cached
    pub fn status(&self, scope: &UserScope) -> Result<StatusSummary> {
        let items = self.store.get_linked_items(scope.identity_id())?;
        let accounts = self.store.get_accounts_for_identity(scope.identity_id())?;
        let transactions = self
            .store
            .count_transactions_for_identity(scope.identity_id())?;
        let range = self
            .store
            .get_transaction_date_range(scope.identity_id())?;

        Ok(StatusSummary {
            linked_items: items.len() as i64,
            institutions: items.iter().map(|i| i.institution_name.clone()).collect(),
            accounts: accounts.len() as i64,
            transactions,
            date_range: range.map(|(earliest, latest)| DateRange {
                earliest: earliest.to_string(),
                latest: latest.to_string(),
            }),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub linked_items: i64,
    pub institutions: Vec<String>,
    pub accounts: i64,
    pub transactions: i64,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: String,
    pub latest: String,
}
