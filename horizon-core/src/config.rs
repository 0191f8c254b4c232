//! Configuration management
//!
//! settings.json in the horizon directory:
//! ```json
//! {
//!   "app": { "pageSize": 10, "sessionTtlDays": 7, "adminKey": "...", "products": [...] },
//!   "plaid": { "environment": "sandbox", "clientId": "...", "secret": "..." }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    plaid: PlaidSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default = "default_session_ttl_days")]
    session_ttl_days: i64,
    #[serde(default)]
    admin_key: Option<String>,
    #[serde(default = "default_products")]
    products: Vec<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            session_ttl_days: default_session_ttl_days(),
            admin_key: None,
            products: default_products(),
            other: HashMap::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaidSettings {
    #[serde(default = "default_environment")]
    environment: String,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    secret: Option<String>,
}

impl Default for PlaidSettings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            client_id: None,
            secret: None,
        }
    }
}

impl fmt::Debug for PlaidSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaidSettings")
            .field("environment", &self.environment)
            .field("client_id", &self.client_id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_page_size() -> usize {
    10
}

fn default_session_ttl_days() -> i64 {
    7
}

fn default_products() -> Vec<String> {
    vec!["auth".to_string(), "transactions".to_string()]
}

fn default_environment() -> String {
    "sandbox".to_string()
}

/// Horizon configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Transactions per page when no explicit size is requested
    pub page_size: usize,
    pub session_ttl_days: i64,
    /// Privileged key checked by admin-scoped operations, set during setup
    pub admin_key: Option<String>,
    /// Aggregator product set requested for new links
    pub products: Vec<String>,
    pub plaid: PlaidConfig,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

/// Aggregator credential block
#[derive(Clone)]
pub struct PlaidConfig {
    pub environment: String,
    pub client_id: Option<String>,
    pub secret: Option<String>,
}

impl Default for PlaidConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            client_id: None,
            secret: None,
        }
    }
}

impl fmt::Debug for PlaidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaidConfig")
            .field("environment", &self.environment)
            .field("client_id", &self.client_id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PlaidConfig {
    /// True when setup has stored a usable credential pair
    pub fn is_configured(&self) -> bool {
        self.client_id.as_deref().map_or(false, |v| !v.is_empty())
            && self.secret.as_deref().map_or(false, |v| !v.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            session_ttl_days: default_session_ttl_days(),
            admin_key: None,
            products: default_products(),
            plaid: PlaidConfig::default(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the horizon directory
    ///
    /// The page size can be overridden via the HORIZON_PAGE_SIZE environment
    /// variable (for CI/testing).
    pub fn load(horizon_dir: &Path) -> Result<Self> {
        let settings_path = horizon_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        // Check env var for page size override (for CI/testing)
        let page_size = match std::env::var("HORIZON_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            Some(size) if size > 0 => size,
            _ => raw.app.page_size,
        };

        Ok(Self {
            page_size,
            session_ttl_days: raw.app.session_ttl_days,
            admin_key: raw.app.admin_key.clone(),
            products: raw.app.products.clone(),
            plaid: PlaidConfig {
                environment: raw.plaid.environment.clone(),
                client_id: raw.plaid.client_id.clone(),
                secret: raw.plaid.secret.clone(),
            },
            _raw_settings: raw,
        })
    }

    /// Save config to the horizon directory.
    /// Preserves other settings that the CLI doesn't manage.
    pub fn save(&self, horizon_dir: &Path) -> Result<()> {
        let settings_path = horizon_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        // Update only the fields we manage
        settings.app.page_size = self.page_size;
        settings.app.session_ttl_days = self.session_ttl_days;
        settings.app.admin_key = self.admin_key.clone();
        settings.app.products = self.products.clone();
        settings.plaid.environment = self.plaid.environment.clone();
        settings.plaid.client_id = self.plaid.client_id.clone();
        settings.plaid.secret = self.plaid.secret.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
