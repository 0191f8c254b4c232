//! Registry service - an identity's linked institutions

use std::sync::Arc;

use uuid::Uuid;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::{Error, LinkedItem, NewLinkedItem, Result, UserScope};

/// Registry service over the linked-item rows
///
/// The exchange path in the link service creates items atomically with
/// their consumed token; this service covers everything after that point,
/// plus direct appends that carry no public token.
pub struct RegistryService {
    store: Arc<DuckDbStore>,
}

impl RegistryService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Append an item to the registry
    ///
    /// `DuplicateLink` if this identity already has an item for the same
    /// institution, unless `multi` is set.
    pub fn link_item(
        &self,
        scope: &UserScope,
        draft: NewLinkedItem,
        multi: bool,
    ) -> Result<LinkedItem> {
        if draft.identity_id != scope.identity_id() {
            return Err(Error::validation("item does not belong to this identity"));
        }

        if !multi
            && self
                .store
                .has_active_link(draft.identity_id, &draft.institution_id)?
        {
            return Err(Error::DuplicateLink {
                institution_id: draft.institution_id,
            });
        }

        let item = LinkedItem::new(draft);
        self.store.insert_linked_item(&item)?;
        Ok(item)
    }

    /// Items for this identity, in the order they were linked
    pub fn list_items(&self, scope: &UserScope) -> Result<Vec<LinkedItem>> {
        self.store.get_linked_items(scope.identity_id())
    }

    /// Remove an item along with its cached accounts and transactions
    ///
    /// Absent items and items owned by a different identity are the same
    /// silent no-op, so callers learn nothing about other identities' ids.
    pub fn unlink_item(&self, scope: &UserScope, item_id: Uuid) -> Result<()> {
        match self.store.get_linked_item_by_id(item_id)? {
            Some(item) if item.identity_id == scope.identity_id() => {
                self.store.delete_linked_item(item.id)
            }
            _ => Ok(()),
        }
    }
}
