//! Refresh service - pull accounts and transactions from the aggregator

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::{Error, LinkedItem, Result, Transaction, UserScope};
use crate::ports::BankDataAggregator;

/// Refresh service for the cached projections
///
/// Refreshing replaces account projections wholesale and walks the
/// aggregator's incremental transaction cursor, so the cache converges on
/// whatever the aggregator reports. The aggregator stays the source of
/// truth; nothing here is user-editable.
pub struct RefreshService {
    store: Arc<DuckDbStore>,
    aggregator: Arc<dyn BankDataAggregator>,
}

impl RefreshService {
    pub fn new(store: Arc<DuckDbStore>, aggregator: Arc<dyn BankDataAggregator>) -> Self {
        Self { store, aggregator }
    }

    /// Refresh one linked item, or all of them
    ///
    /// Items refresh independently: a failure is recorded on that item's
    /// result and the remaining items still run. `NotFound` when the
    /// identity has nothing linked, or names an item that is not theirs.
    pub fn refresh(&self, scope: &UserScope, item_id: Option<Uuid>) -> Result<RefreshResult> {
        let items = self.store.get_linked_items(scope.identity_id())?;

        let to_refresh: Vec<&LinkedItem> = match item_id {
            Some(id) => {
                let item = items
                    .iter()
                    .find(|i| i.id == id)
                    .ok_or_else(|| Error::not_found(format!("no linked item {}", id)))?;
                vec![item]
            }
            None => items.iter().collect(),
        };

        if to_refresh.is_empty() {
            return Err(Error::not_found("no linked institutions to refresh"));
        }

        let mut results = Vec::new();
        for item in to_refresh {
            match self.refresh_item(item) {
                Ok(result) => results.push(result),
                Err(e) => results.push(ItemRefreshResult::failed(item, e.to_string())),
            }
        }

        Ok(RefreshResult { results })
    }

    fn refresh_item(&self, item: &LinkedItem) -> Result<ItemRefreshResult> {
        let accounts_result = self.aggregator.fetch_accounts(&item.access_credential)?;
        let mut warnings = accounts_result.warnings;

        // The adapter leaves item_id nil; attach the accounts to this item
        // before they touch the store.
        let mut accounts = accounts_result.accounts;
        for account in &mut accounts {
            account.item_id = item.id;
        }
        self.store.replace_accounts_for_item(item.id, &accounts)?;

        // Internal account ids survive the replace, so re-read to map the
        // aggregator's account ids onto ours.
        let stored = self.store.get_accounts_for_item(item.id)?;
        let external_to_internal: HashMap<String, Uuid> = stored
            .iter()
            .map(|a| (a.external_id.clone(), a.id))
            .collect();

        let mut cursor = item.sync_cursor.clone();
        let mut added = 0usize;
        let mut updated = 0usize;
        let mut removed = 0usize;
        let mut pages_walked = 0usize;

        loop {
            let page = self
                .aggregator
                .fetch_transactions(&item.access_credential, cursor.as_deref())?;
            warnings.extend(page.warnings);
            pages_walked += 1;

            let mut batch: Vec<Transaction> = Vec::new();
            for (external_account_id, mut tx) in page.transactions {
                match external_to_internal.get(&external_account_id) {
                    Some(&account_id) => {
                        tx.account_id = account_id;
                        batch.push(tx);
                    }
                    None => {
                        warnings.push(format!(
                            "Skipping transaction {} for unknown account {}",
                            tx.external_id, external_account_id
                        ));
                    }
                }
            }

            let (batch_added, batch_updated) = self.store.upsert_transactions(&batch)?;
            added += batch_added;
            updated += batch_updated;
            removed += self
                .store
                .delete_transactions_by_external_ids(&page.removed)?;

            if !page.next_cursor.is_empty() {
                // A stuck cursor would page forever.
                if page.has_more && cursor.as_deref() == Some(page.next_cursor.as_str()) {
                    warnings.push(format!(
                        "Cursor did not advance past {}; stopping early",
                        page.next_cursor
                    ));
                    break;
                }
                self.store.update_sync_cursor(item.id, &page.next_cursor)?;
                cursor = Some(page.next_cursor);
            }

            if !page.has_more {
                break;
            }
        }

        Ok(ItemRefreshResult {
            institution: item.institution_name.clone(),
            item_id: item.id,
            accounts_refreshed: stored.len(),
            transactions_added: added,
            transactions_updated: updated,
            transactions_removed: removed,
            pages_walked,
            warnings,
            error: None,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResult {
    pub results: Vec<ItemRefreshResult>,
}

#[derive(Debug, Serialize)]
pub struct ItemRefreshResult {
    pub institution: String,
    pub item_id: Uuid,
    pub accounts_refreshed: usize,
    pub transactions_added: usize,
    pub transactions_updated: usize,
    pub transactions_removed: usize,
    pub pages_walked: usize,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemRefreshResult {
    fn failed(item: &LinkedItem, error: String) -> Self {
        Self {
            institution: item.institution_name.clone(),
            item_id: item.id,
            accounts_refreshed: 0,
            transactions_added: 0,
            transactions_updated: 0,
            transactions_removed: 0,
            pages_walked: 0,
            warnings: Vec::new(),
            error: Some(error),
        }
    }
}
