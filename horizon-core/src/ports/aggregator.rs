//! Bank data aggregator port
//!
//! Defines the interface for the external account aggregator (Plaid in
//! production, an in-memory double in tests). The link and refresh services
//! use this trait without knowing which backend is wired in.

use crate::domain::result::Result;
use crate::domain::{AccessCredential, Account, Identity, LinkToken, Transaction};

/// Output of a successful public-token exchange
///
/// Carries the long-lived credential plus the institution identifiers the
/// registry needs. Not serializable; the credential stays server-side.
#[derive(Debug)]
pub struct ExchangeGrant {
    pub access_credential: AccessCredential,
    /// Aggregator-side item identifier
    pub item_ref: String,
    pub institution_id: String,
    pub institution_name: String,
}

/// Result of fetching accounts for one credential
#[derive(Debug, Default)]
pub struct FetchAccountsResult {
    /// Accounts with `item_id` left nil; the refresh service attaches them
    pub accounts: Vec<Account>,
    pub warnings: Vec<String>,
}

/// One page of the incremental transaction sync
#[derive(Debug, Default)]
pub struct TransactionsPage {
    /// Transactions keyed by aggregator account ID
    pub transactions: Vec<(String, Transaction)>,
    /// Aggregator transaction ids deleted upstream
    pub removed: Vec<String>,
    /// Cursor to persist and resume from
    pub next_cursor: String,
    /// More pages are available at `next_cursor`
    pub has_more: bool,
    pub warnings: Vec<String>,
}

/// Bank data aggregator trait
///
/// Implementations drive the two-call link protocol and serve cached-data
/// refreshes. Each call is synchronous and self-contained; no handshake
/// state lives behind this trait.
pub trait BankDataAggregator: Send + Sync {
    /// Aggregator name (e.g., "plaid")
    fn name(&self) -> &str;

    /// Request a short-lived link token bound to the identity
    ///
    /// `products` selects the aggregator product set (e.g. "auth",
    /// "transactions"). `AggregatorUnavailable` on transport failure.
    fn create_link_token(&self, identity: &Identity, products: &[String]) -> Result<LinkToken>;

    /// Exchange a public token for a long-lived credential
    ///
    /// The public token must have been issued for this identity's flow;
    /// implementations reject cross-identity tokens, and invalid, expired,
    /// or already-consumed tokens, with `ExchangeFailed`.
    fn exchange_public_token(&self, identity: &Identity, public_token: &str)
        -> Result<ExchangeGrant>;

    /// Fetch the current account projections for a credential
    fn fetch_accounts(&self, credential: &AccessCredential) -> Result<FetchAccountsResult>;

    /// Fetch one page of transactions, resuming from `cursor`
    ///
    /// `None` starts from the beginning of the item's history.
    fn fetch_transactions(
        &self,
        credential: &AccessCredential,
        cursor: Option<&str>,
    ) -> Result<TransactionsPage>;
}
