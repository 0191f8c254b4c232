//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod aggregator;
mod identity;

pub use aggregator::{BankDataAggregator, ExchangeGrant, FetchAccountsResult, TransactionsPage};
pub use identity::IdentityProvider;
