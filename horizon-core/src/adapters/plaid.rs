//! Plaid API client
//!
//! Handles communication with the Plaid API for the link handshake and for
//! account and transaction refreshes. Plaid fronts thousands of US
//! institutions behind a token-exchange flow: a short-lived link token opens
//! the hosted linking UI, the resulting public token is exchanged once for a
//! long-lived access token.
//!
//! API Documentation: https://plaid.com/docs/api/

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::domain::{AccessCredential, Account, Identity, LinkToken, Transaction};
use crate::ports::{BankDataAggregator, ExchangeGrant, FetchAccountsResult, TransactionsPage};

// =============================================================================
// API Response Models (matching Plaid API shapes)
// =============================================================================

/// Error body Plaid attaches to non-200 responses
#[derive(Debug, Clone, Default, Deserialize)]
struct PlaidApiError {
    #[allow(dead_code)]
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_message: String,
}

/// Wrapper for link token creation response
#[derive(Debug, Clone, Deserialize)]
pub struct LinkTokenCreateResponse {
    pub link_token: String,
    /// RFC 3339 expiration timestamp
    #[serde(default)]
    pub expiration: Option<String>,
}

/// Wrapper for public token exchange response
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub access_token: String,
    pub item_id: String,
}

/// Wrapper for institution lookup response
#[derive(Debug, Clone, Deserialize)]
struct InstitutionGetResponse {
    institution: PlaidInstitution,
}

/// Plaid institution metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PlaidInstitution {
    #[serde(default)]
    pub institution_id: String,
    pub name: String,
}

/// Wrapper for accounts response
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsGetResponse {
    pub accounts: Vec<PlaidAccount>,
    /// Owning item, including the institution it belongs to
    #[serde(default)]
    pub item: PlaidItem,
}

/// Plaid item envelope from the accounts response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaidItem {
    #[serde(default)]
    pub institution_id: Option<String>,
}

/// Plaid account from API
#[derive(Debug, Clone, Deserialize)]
pub struct PlaidAccount {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    /// API field is "type", reserved in Rust
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub balances: PlaidBalances,
}

/// Balance block nested in a Plaid account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaidBalances {
    /// Amount as number from API
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub available: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub current: Option<Decimal>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

/// Wrapper for the incremental transactions sync response
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsSyncResponse {
    #[serde(default)]
    pub added: Vec<PlaidTransaction>,
    #[serde(default)]
    pub modified: Vec<PlaidTransaction>,
    #[serde(default)]
    pub removed: Vec<RemovedTransaction>,
    #[serde(default)]
    pub next_cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

/// Tombstone for a transaction deleted upstream
#[derive(Debug, Clone, Deserialize)]
pub struct RemovedTransaction {
    #[serde(default)]
    pub transaction_id: String,
}

/// Plaid transaction from API
#[derive(Debug, Clone, Deserialize)]
pub struct PlaidTransaction {
    pub transaction_id: String,
    pub account_id: String,
    /// Amount as number from API; positive values are debits
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    pub date: String, // ISO date string YYYY-MM-DD
    /// Plaid calls the transaction description "name"
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub personal_finance_category: Option<PlaidCategory>,
    /// Legacy category hierarchy, broadest entry first
    #[serde(default)]
    pub category: Vec<String>,
}

/// Personal finance category block
#[derive(Debug, Clone, Deserialize)]
pub struct PlaidCategory {
    #[serde(default)]
    pub primary: Option<String>,
}

/// Deserialize amount that can be number or string
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: JsonValue = Deserialize::deserialize(deserializer)?;
    match value {
        JsonValue::Number(n) => {
            let s = n.to_string();
            s.parse::<Decimal>()
                .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e)))
        }
        JsonValue::String(s) => s
            .parse::<Decimal>()
            .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e))),
        _ => Err(D::Error::custom("expected number or string for amount")),
    }
}

/// Deserialize optional amount that can be number, string or null
fn deserialize_optional_amount<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        Some(JsonValue::Number(n)) => {
            let s = n.to_string();
            s.parse::<Decimal>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e)))
        }
        Some(JsonValue::String(s)) => s
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e))),
        Some(JsonValue::Null) | None => Ok(None),
        _ => Err(D::Error::custom("expected number or string for amount")),
    }
}

// =============================================================================
// Plaid HTTP Client
// =============================================================================

/// Production environment against live institutions
const PLAID_PRODUCTION_URL: &str = "https://production.plaid.com";

/// Development environment (real institutions, test credentials)
const PLAID_DEVELOPMENT_URL: &str = "https://development.plaid.com";

/// Sandbox environment with simulated institutions
const PLAID_SANDBOX_URL: &str = "https://sandbox.plaid.com";

/// Environment variable to override the Plaid API base URL.
/// Set this to point at a local stub server for testing.
pub const PLAID_BASE_URL_ENV: &str = "PLAID_BASE_URL";

/// Resolve the base URL for a named Plaid environment, checking the
/// environment variable override first. Unrecognized names fall back to
/// sandbox so a typo never hits production.
pub fn get_base_url(environment: &str) -> String {
    if let Ok(url) = std::env::var(PLAID_BASE_URL_ENV) {
        return url;
    }
    match environment {
        "production" => PLAID_PRODUCTION_URL.to_string(),
        "development" => PLAID_DEVELOPMENT_URL.to_string(),
        _ => PLAID_SANDBOX_URL.to_string(),
    }
}

/// Plaid API client
///
/// Every Plaid endpoint is a POST that carries `client_id` and `secret`
/// inside the JSON body.
pub struct PlaidClient {
    client: Client,
    client_id: String,
    secret: String,
    base_url: String,
}

impl fmt::Debug for PlaidClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaidClient")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl PlaidClient {
    /// Create a new Plaid client for a named environment
    /// ("sandbox", "development" or "production").
    ///
    /// Uses the `PLAID_BASE_URL` environment variable if set, otherwise
    /// the environment's standard host.
    pub fn new(client_id: &str, secret: &str, environment: &str) -> Result<Self> {
        Self::new_with_base_url(client_id, secret, &get_base_url(environment))
    }

    /// Create a new Plaid client against a custom base URL.
    ///
    /// Prefer using `new()` with the `PLAID_BASE_URL` env var for testing.
    pub fn new_with_base_url(client_id: &str, secret: &str, base_url: &str) -> Result<Self> {
        if client_id.is_empty() {
            anyhow::bail!("Plaid client_id cannot be empty");
        }
        if secret.is_empty() {
            anyhow::bail!("Plaid secret cannot be empty");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a link token that opens the hosted account-linking flow.
    ///
    /// The token is bound to `client_user_id` on the Plaid side; public
    /// tokens minted in the resulting session inherit that binding.
    pub fn create_link_token(
        &self,
        client_user_id: &str,
        client_name: &str,
        products: &[String],
    ) -> Result<LinkTokenCreateResponse> {
        let url = format!("{}/link/token/create", self.base_url);
        let body = serde_json::json!({
            "client_id": self.client_id,
            "secret": self.secret,
            "client_name": client_name,
            "language": "en",
            "country_codes": ["US"],
            "user": { "client_user_id": client_user_id },
            "products": products,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        let response = self.check_response_status(response)?;

        let api_response: LinkTokenCreateResponse = response
            .json()
            .context("Failed to parse Plaid link token response")?;

        Ok(api_response)
    }

    /// Exchange a public token for the item's long-lived access token.
    ///
    /// Each public token is single-use; Plaid rejects replays.
    pub fn exchange_public_token(&self, public_token: &str) -> Result<ExchangeResponse> {
        let url = format!("{}/item/public_token/exchange", self.base_url);
        let body = serde_json::json!({
            "client_id": self.client_id,
            "secret": self.secret,
            "public_token": public_token,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        let response = self.check_response_status(response)?;

        let api_response: ExchangeResponse = response
            .json()
            .context("Failed to parse Plaid exchange response")?;

        Ok(api_response)
    }

    /// Look up an institution's display metadata by Plaid id
    pub fn get_institution(&self, institution_id: &str) -> Result<PlaidInstitution> {
        let url = format!("{}/institutions/get_by_id", self.base_url);
        let body = serde_json::json!({
            "client_id": self.client_id,
            "secret": self.secret,
            "institution_id": institution_id,
            "country_codes": ["US"],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        let response = self.check_response_status(response)?;

        let api_response: InstitutionGetResponse = response
            .json()
            .context("Failed to parse Plaid institution response")?;

        Ok(api_response.institution)
    }

    /// Fetch the item's accounts with their current balances
    pub fn get_accounts(&self, access_token: &str) -> Result<AccountsGetResponse> {
        let url = format!("{}/accounts/get", self.base_url);
        let body = serde_json::json!({
            "client_id": self.client_id,
            "secret": self.secret,
            "access_token": access_token,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        let response = self.check_response_status(response)?;

        let api_response: AccountsGetResponse = response
            .json()
            .context("Failed to parse Plaid accounts response")?;

        Ok(api_response)
    }

    /// Pull one page of the incremental transaction feed.
    ///
    /// `None` starts from the beginning of the item's history. Plaid caps
    /// each page at 500 entries and signals continuation via `has_more`.
    pub fn sync_transactions(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionsSyncResponse> {
        let url = format!("{}/transactions/sync", self.base_url);
        let mut body = serde_json::json!({
            "client_id": self.client_id,
            "secret": self.secret,
            "access_token": access_token,
            "count": 500,
        });
        if let Some(cursor) = cursor {
            body["cursor"] = serde_json::json!(cursor);
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        let response = self.check_response_status(response)?;

        let api_response: TransactionsSyncResponse = response
            .json()
            .context("Failed to parse Plaid transactions sync response")?;

        Ok(api_response)
    }

    /// Map a Plaid account to a domain Account
    ///
    /// `item_id` stays nil; the refresh service attaches the owning item
    /// after mapping.
    fn map_account(&self, plaid_account: &PlaidAccount) -> Account {
        let currency = plaid_account
            .balances
            .iso_currency_code
            .as_deref()
            .map(Account::normalize_currency)
            .unwrap_or_else(|| "USD".to_string());

        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            item_id: Uuid::nil(),
            external_id: plaid_account.account_id.clone(),
            name: plaid_account.name.clone(),
            official_name: plaid_account.official_name.clone(),
            account_type: plaid_account.account_type.clone(),
            subtype: plaid_account.subtype.clone(),
            mask: plaid_account.mask.clone(),
            currency,
            current_balance: plaid_account.balances.current,
            available_balance: plaid_account.balances.available,
            created_at: now,
            updated_at: now,
        }
    }

    /// Map a Plaid transaction to a domain Transaction
    ///
    /// `account_id` stays nil; the refresh service resolves it from the
    /// aggregator-side account id.
    fn map_transaction(&self, plaid_tx: &PlaidTransaction) -> Transaction {
        let date = NaiveDate::parse_from_str(&plaid_tx.date, "%Y-%m-%d")
            .unwrap_or_else(|_| Utc::now().naive_utc().date());

        // Plaid's "name" is the full description; merchant_name is the
        // cleaned-up fallback when name is missing or blank.
        let description = plaid_tx
            .name
            .as_ref()
            .filter(|d| !d.trim().is_empty())
            .cloned()
            .or_else(|| {
                plaid_tx
                    .merchant_name
                    .as_ref()
                    .filter(|m| !m.trim().is_empty())
                    .cloned()
            });

        // Prefer the personal finance taxonomy; older items only carry the
        // legacy hierarchy, where the last entry is the most specific.
        let category = plaid_tx
            .personal_finance_category
            .as_ref()
            .and_then(|block| block.primary.clone())
            .or_else(|| plaid_tx.category.last().cloned());

        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            account_id: Uuid::nil(),
            external_id: plaid_tx.transaction_id.clone(),
            date,
            // Positive amounts are debits in Plaid's sign convention,
            // which the domain keeps as-is.
            amount: plaid_tx.amount,
            description,
            category,
            pending: plaid_tx.pending,
            currency: plaid_tx
                .iso_currency_code
                .as_deref()
                .map(Account::normalize_currency)
                .unwrap_or_else(|| "USD".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> anyhow::Error {
        if error.is_timeout() {
            anyhow::anyhow!("Connection timed out after 30 seconds")
        } else if error.is_connect() {
            anyhow::anyhow!("Unable to connect to Plaid")
        } else {
            anyhow::anyhow!("Plaid request failed: {}", error)
        }
    }

    /// Check response status and return appropriate errors.
    ///
    /// Plaid reports failures as a JSON body carrying `error_code`, so this
    /// consumes the response on the error path to read it.
    fn check_response_status(
        &self,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response> {
        let status = response.status().as_u16();
        if status == 200 {
            return Ok(response);
        }

        let error: PlaidApiError = response.json().unwrap_or_default();
        let code = if error.error_code.is_empty() {
            "UNKNOWN".to_string()
        } else {
            error.error_code
        };
        let detail = if error.error_message.is_empty() {
            "no details provided".to_string()
        } else {
            error.error_message
        };

        match status {
            400 if code == "INVALID_API_KEYS" => anyhow::bail!(
                "Plaid authentication failed ({}). Check your client_id and secret.",
                code
            ),
            400 => anyhow::bail!("Plaid rejected the request ({}): {}", code, detail),
            401 | 403 => anyhow::bail!(
                "Plaid authentication failed ({}). Check your client_id and secret.",
                code
            ),
            429 => anyhow::bail!("Plaid rate limit exceeded. Please wait a moment and try again."),
            status => anyhow::bail!("Plaid API error: HTTP {} ({})", status, code),
        }
    }
}

// =============================================================================
// PlaidAggregator - implements BankDataAggregator trait
// =============================================================================

/// Plaid-backed bank data aggregator
///
/// Owns a configured client and translates Plaid failures into the domain
/// error taxonomy.
pub struct PlaidAggregator {
    client: PlaidClient,
    client_name: String,
}

impl PlaidAggregator {
    /// Build an aggregator from API credentials and a named environment
    pub fn new(client_id: &str, secret: &str, environment: &str) -> DomainResult<Self> {
        let client = PlaidClient::new(client_id, secret, environment)
            .map_err(|e| DomainError::Config(e.to_string()))?;
        Ok(Self {
            client,
            client_name: "Horizon".to_string(),
        })
    }

    /// Build an aggregator against a custom base URL (mock servers in tests)
    pub fn new_with_base_url(client_id: &str, secret: &str, base_url: &str) -> DomainResult<Self> {
        let client = PlaidClient::new_with_base_url(client_id, secret, base_url)
            .map_err(|e| DomainError::Config(e.to_string()))?;
        Ok(Self {
            client,
            client_name: "Horizon".to_string(),
        })
    }

    /// Override the application name shown in the hosted linking flow
    pub fn with_client_name(mut self, client_name: &str) -> Self {
        self.client_name = client_name.to_string();
        self
    }
}

/// Sort client failures into the domain taxonomy.
///
/// Request rejections (bad token, unknown institution) terminate the current
/// attempt; everything else means the aggregator could not be reached or
/// used at all.
fn map_client_error(error: anyhow::Error) -> DomainError {
    let message = error.to_string();
    if message.starts_with("Plaid rejected") {
        DomainError::exchange_failed(message)
    } else {
        DomainError::aggregator_unavailable(message)
    }
}

impl BankDataAggregator for PlaidAggregator {
    fn name(&self) -> &str {
        "plaid"
    }

    fn create_link_token(
        &self,
        identity: &Identity,
        products: &[String],
    ) -> DomainResult<LinkToken> {
        let response = self
            .client
            .create_link_token(&identity.id.to_string(), &self.client_name, products)
            .map_err(map_client_error)?;

        // Treat an unparseable expiration as "no expiry known" rather than
        // failing the whole link.
        let expires_at = response
            .expiration
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));

        Ok(LinkToken {
            token: response.link_token,
            expires_at,
        })
    }

    fn exchange_public_token(
        &self,
        _identity: &Identity,
        public_token: &str,
    ) -> DomainResult<ExchangeGrant> {
        // Plaid binds public tokens to the link session that minted them,
        // so the identity check happens on their side of the wire.
        let exchanged = self
            .client
            .exchange_public_token(public_token)
            .map_err(map_client_error)?;

        // The exchange response carries no institution metadata; the
        // accounts payload names the owning item's institution.
        let accounts = self
            .client
            .get_accounts(&exchanged.access_token)
            .map_err(map_client_error)?;
        let institution_id = accounts.item.institution_id.unwrap_or_default();

        let institution_name = if institution_id.is_empty() {
            "Unknown institution".to_string()
        } else {
            // Display name lookup is best-effort; fall back to the raw id.
            self.client
                .get_institution(&institution_id)
                .map(|institution| institution.name)
                .unwrap_or_else(|_| institution_id.clone())
        };

        Ok(ExchangeGrant {
            access_credential: AccessCredential::new(exchanged.access_token),
            item_ref: exchanged.item_id,
            institution_id,
            institution_name,
        })
    }

    fn fetch_accounts(&self, credential: &AccessCredential) -> DomainResult<FetchAccountsResult> {
        let response = self
            .client
            .get_accounts(credential.reveal())
            .map_err(map_client_error)?;

        let mut accounts = Vec::new();
        let mut warnings = Vec::new();
        for plaid_account in &response.accounts {
            if plaid_account.account_id.is_empty() {
                warnings.push(format!(
                    "Account '{}' has no Plaid id - skipping",
                    plaid_account.name
                ));
                continue;
            }
            accounts.push(self.client.map_account(plaid_account));
        }

        Ok(FetchAccountsResult { accounts, warnings })
    }

    fn fetch_transactions(
        &self,
        credential: &AccessCredential,
        cursor: Option<&str>,
    ) -> DomainResult<TransactionsPage> {
        let response = self
            .client
            .sync_transactions(credential.reveal(), cursor)
            .map_err(map_client_error)?;

        let mut transactions = Vec::new();
        let mut warnings = Vec::new();
        // Modified entries reuse the same upsert path as additions.
        for plaid_tx in response.added.iter().chain(response.modified.iter()) {
            if plaid_tx.account_id.is_empty() {
                warnings.push(format!(
                    "Transaction '{}' has no account id - skipping",
                    plaid_tx.transaction_id
                ));
                continue;
            }
            transactions.push((
                plaid_tx.account_id.clone(),
                self.client.map_transaction(plaid_tx),
            ));
        }

        let removed = response
            .removed
            .into_iter()
            .map(|tombstone| tombstone.transaction_id)
            .filter(|id| !id.is_empty())
            .collect();

        Ok(TransactionsPage {
            transactions,
            removed,
            next_cursor: response.next_cursor,
            has_more: response.has_more,
            warnings,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
