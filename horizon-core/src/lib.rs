//! Horizon Core - Business logic for the consumer banking dashboard
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Identity, LinkedItem, Transaction, etc.)
//! - **ports**: Trait definitions for external dependencies (IdentityProvider, BankDataAggregator)
//! - **services**: Business logic orchestration, gated by capability scopes
//! - **adapters**: Concrete implementations (DuckDB, Plaid)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::directory::DirectoryProvider;
use adapters::duckdb::DuckDbStore;
use adapters::plaid::PlaidAggregator;
use config::Config;
use ports::{BankDataAggregator, IdentityProvider};
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Account, AdminScope, Identity, LinkedItem, NewIdentity,
    Session, Tier, Transaction, UserScope,
};
pub use domain::result::Error;

/// Main context for Horizon operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct HorizonContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub session_service: SessionService,
    pub link_service: LinkService,
    pub registry_service: RegistryService,
    pub account_service: AccountService,
    pub transaction_service: TransactionService,
    pub refresh_service: RefreshService,
    pub status_service: StatusService,
}

impl HorizonContext {
    /// Create a context backed by the Plaid credentials in settings
    pub fn new(horizon_dir: &Path) -> Result<Self> {
        let config = Config::load(horizon_dir)?;

        if !config.plaid.is_configured() {
            anyhow::bail!("Plaid credentials are not configured");
        }
        let client_id = config.plaid.client_id.as_deref().unwrap_or_default();
        let secret = config.plaid.secret.as_deref().unwrap_or_default();
        let aggregator: Arc<dyn BankDataAggregator> = Arc::new(PlaidAggregator::new(
            client_id,
            secret,
            &config.plaid.environment,
        )?);

        Self::build(horizon_dir, config, aggregator)
    }

    /// Create a context with a caller-supplied aggregator backend
    ///
    /// Session and registry operations work without Plaid credentials,
    /// so this is also the path for setups that have not configured them.
    pub fn with_aggregator(
        horizon_dir: &Path,
        aggregator: Arc<dyn BankDataAggregator>,
    ) -> Result<Self> {
        let config = Config::load(horizon_dir)?;
        Self::build(horizon_dir, config, aggregator)
    }

    fn build(
        horizon_dir: &Path,
        config: Config,
        aggregator: Arc<dyn BankDataAggregator>,
    ) -> Result<Self> {
        let db_path = horizon_dir.join("horizon.duckdb");
        let store = Arc::new(DuckDbStore::new(&db_path)?);

        // Initialize schema
        store.ensure_schema()?;

        let identity_provider: Arc<dyn IdentityProvider> =
            Arc::new(DirectoryProvider::new(Arc::clone(&store)));

        // Create services
        let session_service = SessionService::new(
            identity_provider,
            config.session_ttl_days,
            config.admin_key.clone(),
        );
        let link_service = LinkService::new(
            Arc::clone(&store),
            Arc::clone(&aggregator),
            config.products.clone(),
        );
        let registry_service = RegistryService::new(Arc::clone(&store));
        let account_service = AccountService::new(Arc::clone(&store));
        let transaction_service =
            TransactionService::new(Arc::clone(&store), config.page_size as i64);
        let refresh_service = RefreshService::new(Arc::clone(&store), aggregator);
        let status_service = StatusService::new(Arc::clone(&store));

        Ok(Self {
            config,
            store,
            session_service,
            link_service,
            registry_service,
            account_service,
            transaction_service,
            refresh_service,
            status_service,
        })
    }
}
