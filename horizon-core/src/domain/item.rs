//! Linked item domain model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Long-lived aggregator credential for one linked institution
///
/// Opaque on purpose: no serde, redacted `Debug`, and the inner value is
/// readable only inside this crate. The credential must never appear in
/// logs, CLI output, or anything that crosses the process boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential(String);

impl AccessCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub(crate) fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessCredential(<redacted>)")
    }
}

/// Short-lived token that opens the aggregator's authorization flow
#[derive(Debug, Clone, Serialize)]
pub struct LinkToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One identity's connection to one institution
///
/// Created only by a completed link handshake, destroyed only by explicit
/// unlink. Deliberately not serializable: the access credential stays
/// server-side.
#[derive(Debug, Clone)]
pub struct LinkedItem {
    pub id: Uuid,
    pub identity_id: Uuid,
    /// Aggregator-side item identifier
    pub item_ref: String,
    pub institution_id: String,
    pub institution_name: String,
    pub access_credential: AccessCredential,
    /// Incremental transaction sync position, absent before the first refresh
    pub sync_cursor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a freshly exchanged item
#[derive(Debug, Clone)]
pub struct NewLinkedItem {
    pub identity_id: Uuid,
    pub item_ref: String,
    pub institution_id: String,
    pub institution_name: String,
    pub access_credential: AccessCredential,
}

impl LinkedItem {
    /// Create a new item from exchange output
    pub fn new(draft: NewLinkedItem) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identity_id: draft.identity_id,
            item_ref: draft.item_ref,
            institution_id: draft.institution_id,
            institution_name: draft.institution_name,
            access_credential: draft.access_credential,
            sync_cursor: None,
            created_at: now,
            updated_at: now,
        }
    }
}
