//! Transaction service - paged reads over the cached ledger

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::{Result, UserScope};
use crate::services::pager::{self, TransactionPage};

/// Transaction service over the cached projections
///
/// The page size is fixed by configuration, not chosen per call.
pub struct TransactionService {
    store: Arc<DuckDbStore>,
    page_size: i64,
}

impl TransactionService {
    pub fn new(store: Arc<DuckDbStore>, page_size: i64) -> Self {
        Self { store, page_size }
    }

    /// One page of this identity's transactions, newest first
    ///
    /// Merges cached transactions across every linked item. An identity
    /// with nothing linked gets an empty first page with zero total pages.
    pub fn page(&self, scope: &UserScope, page: i64) -> Result<TransactionPage> {
        let transactions = self
            .store
            .get_transactions_for_identity(scope.identity_id())?;
        pager::paginate(transactions, page, self.page_size)
    }
}
