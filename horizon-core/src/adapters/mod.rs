//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the registry's persistence and cached projections
//! - Local directory (argon2id password hashes) for IdentityProvider
//! - Plaid HTTP client for BankDataAggregator

pub mod directory;
pub mod duckdb;
pub mod plaid;

#[cfg(test)]
pub mod plaid_mock;
