//! Transaction domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transaction cached from the aggregator
///
/// Belongs to exactly one account. Positive amounts are debits (money out),
/// negative amounts are credits, matching Plaid sign conventions.
///
/// Canonical display order is date descending with insertion order breaking
/// ties, so repeated pagination over the same data is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Aggregator-side transaction id (dedup key)
    pub external_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
    pub category: Option<String>,
    pub pending: bool,
    /// ISO 4217 currency code
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction with required fields
    pub fn new(
        account_id: Uuid,
        external_id: impl Into<String>,
        date: NaiveDate,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            external_id: external_id.into(),
            date,
            amount,
            description: None,
            category: None,
            pending: false,
            currency: "USD".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True if this transaction moves money out of the account
    pub fn is_debit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Validate transaction data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.external_id.trim().is_empty() {
            return Err("transaction external id cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        Ok(())
    }
}
