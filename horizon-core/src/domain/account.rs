//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bank account cached from the aggregator
///
/// Accounts belong to exactly one linked item and are read-only
/// projections: refresh replaces them wholesale, the aggregator stays the
/// source of truth.
///
/// Note: account_type/subtype are freeform strings using Plaid
/// nomenclature. Common types include "depository", "credit", "investment",
/// "loan" but any string is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Owning linked item
    pub item_id: Uuid,
    /// Aggregator-side account id (dedup key within an item)
    pub external_id: String,
    pub name: String,
    pub official_name: Option<String>,
    pub account_type: Option<String>,
    pub subtype: Option<String>,
    /// Last digits of the account number, as reported by the institution
    pub mask: Option<String>,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub current_balance: Option<Decimal>,
    pub available_balance: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account projection with required fields
    pub fn new(item_id: Uuid, external_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            item_id,
            external_id: external_id.into(),
            name: name.into(),
            official_name: None,
            account_type: None,
            subtype: None,
            mask: None,
            currency: "USD".to_string(),
            current_balance: None,
            available_balance: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.external_id.trim().is_empty() {
            return Err("account external id cannot be empty");
        }
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        Ok(())
    }
}
