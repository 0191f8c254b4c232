//! Mock Plaid API server for testing
//!
//! This module provides a mock HTTP server that simulates the Plaid API,
//! allowing the real client to be exercised without Plaid credentials.
//!
//! The mock server implements the same response structure as the real API:
//! - POST /link/token/create returns { link_token, expiration }
//! - POST /item/public_token/exchange returns { access_token, item_id }
//!   and enforces single use per public token
//! - POST /institutions/get_by_id returns { institution: {...} }
//! - POST /accounts/get returns { accounts: [...], item: {...} }
//! - POST /transactions/sync returns { added, modified, removed,
//!   next_cursor, has_more } and pages via opaque cursors

use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Mock Plaid server for testing
pub struct MockPlaidServer {
    port: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Configuration for mock data generation
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Number of accounts to generate
    pub num_accounts: usize,
    /// Total number of transactions in the item's history
    pub num_transactions: usize,
    /// Page size for /transactions/sync (0 returns everything in one page)
    pub transactions_per_page: usize,
    /// Whether to simulate authentication failure
    pub fail_auth: bool,
    /// Whether to simulate rate limiting
    pub rate_limit: bool,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            num_accounts: 3,
            num_transactions: 50,
            transactions_per_page: 0,
            fail_auth: false,
            rate_limit: false,
            delay_ms: 0,
        }
    }
}

/// Shared server state.
///
/// Public tokens are single-use like the real API, so consumption has to be
/// tracked across connections.
struct MockState {
    consumed_tokens: Mutex<HashSet<String>>,
    link_tokens_issued: AtomicU64,
    exchanges_completed: AtomicU64,
}

// Response structures matching the real API

#[derive(Serialize)]
struct MockBalances {
    available: f64,
    current: f64,
    iso_currency_code: String,
}

#[derive(Serialize)]
struct MockAccount {
    account_id: String,
    name: String,
    official_name: Option<String>,
    #[serde(rename = "type")]
    account_type: String,
    subtype: String,
    mask: String,
    balances: MockBalances,
}

#[derive(Serialize)]
struct MockCategory {
    primary: String,
}

#[derive(Serialize)]
struct MockTransaction {
    transaction_id: String,
    account_id: String,
    amount: f64,
    iso_currency_code: String,
    date: String,
    name: String,
    merchant_name: Option<String>,
    pending: bool,
    personal_finance_category: MockCategory,
}

impl MockPlaidServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        Self::start_on_port(0, config)
    }

    /// Start mock server on a specific port (0 for random)
    pub fn start_on_port(port: u16, config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(format!("127.0.0.1:{}", port))?;
        let actual_port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let state = Arc::new(MockState {
            consumed_tokens: Mutex::new(HashSet::new()),
            link_tokens_issued: AtomicU64::new(0),
            exchanges_completed: AtomicU64::new(0),
        });

        // Set listener to non-blocking for graceful shutdown
        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let state = state.clone();
                        thread::spawn(move || {
                            handle_connection(stream, &cfg, &state);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        // No connection available, sleep briefly
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port: actual_port,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get the port the server is listening on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the base URL for this mock server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockPlaidServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig, state: &MockState) {
    // Accepted sockets can inherit the listener's non-blocking flag on
    // some platforms; the handler reads synchronously.
    let _ = stream.set_nonblocking(false);

    let request = match read_request(&mut stream) {
        Some(request) => request,
        None => return,
    };

    // Add configured delay
    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    // Parse request line
    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();

    if parts.len() < 2 {
        send_response(
            &mut stream,
            400,
            "Bad Request",
            r#"{"error": "Invalid request"}"#,
        );
        return;
    }

    let method = parts[0];
    let path = parts[1];

    // Plaid carries credentials in the JSON body, not headers
    let body: JsonValue = request
        .split_once("\r\n\r\n")
        .and_then(|(_, body)| serde_json::from_str(body.trim()).ok())
        .unwrap_or(JsonValue::Null);

    if config.fail_auth {
        send_response(
            &mut stream,
            400,
            "Bad Request",
            &plaid_error(
                "INVALID_INPUT",
                "INVALID_API_KEYS",
                "invalid client_id or secret provided",
            ),
        );
        return;
    }

    let has_credentials = body
        .get("client_id")
        .and_then(|v| v.as_str())
        .map_or(false, |v| !v.is_empty())
        && body
            .get("secret")
            .and_then(|v| v.as_str())
            .map_or(false, |v| !v.is_empty());

    if !has_credentials {
        send_response(
            &mut stream,
            400,
            "Bad Request",
            &plaid_error(
                "INVALID_INPUT",
                "INVALID_API_KEYS",
                "invalid client_id or secret provided",
            ),
        );
        return;
    }

    if config.rate_limit {
        send_response(
            &mut stream,
            429,
            "Too Many Requests",
            &plaid_error(
                "RATE_LIMIT_EXCEEDED",
                "RATE_LIMIT_EXCEEDED",
                "rate limit exceeded",
            ),
        );
        return;
    }

    if method != "POST" {
        send_response(
            &mut stream,
            405,
            "Method Not Allowed",
            r#"{"error": "Method not allowed"}"#,
        );
        return;
    }

    match path {
        "/link/token/create" => handle_link_token_create(&mut stream, state),
        "/item/public_token/exchange" => handle_exchange(&mut stream, &body, state),
        "/institutions/get_by_id" => handle_institution(&mut stream, &body),
        "/accounts/get" => handle_accounts(&mut stream, &body, config),
        "/transactions/sync" => handle_transactions_sync(&mut stream, &body, config),
        _ => send_response(
            &mut stream,
            404,
            "Not Found",
            r#"{"error": "Endpoint not found"}"#,
        ),
    }
}

/// Read one HTTP request, waiting for the full body per Content-Length
fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buffer[..header_end]);
            let content_length = headers
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.trim().eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);

            if buffer.len() >= header_end + 4 + content_length {
                return Some(String::from_utf8_lossy(&buffer).to_string());
            }
        }

        if buffer.len() > 65536 {
            break;
        }
    }

    None
}

fn handle_link_token_create(stream: &mut TcpStream, state: &MockState) {
    let n = state.link_tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    let expiration = (Utc::now() + Duration::hours(4)).to_rfc3339();
    let response = serde_json::json!({
        "link_token": format!("link-sandbox-{}", n),
        "expiration": expiration,
        "request_id": "mock-req",
    });
    send_response(stream, 200, "OK", &response.to_string());
}

fn handle_exchange(stream: &mut TcpStream, body: &JsonValue, state: &MockState) {
    let public_token = body
        .get("public_token")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    if !public_token.starts_with("public-") {
        send_response(
            stream,
            400,
            "Bad Request",
            &plaid_error(
                "INVALID_INPUT",
                "INVALID_PUBLIC_TOKEN",
                "provided public token is invalid",
            ),
        );
        return;
    }

    // HashSet::insert is false on replay
    let newly_consumed = state
        .consumed_tokens
        .lock()
        .map(|mut consumed| consumed.insert(public_token.to_string()))
        .unwrap_or(false);

    if !newly_consumed {
        send_response(
            stream,
            400,
            "Bad Request",
            &plaid_error(
                "INVALID_INPUT",
                "INVALID_PUBLIC_TOKEN",
                "public token has already been exchanged",
            ),
        );
        return;
    }

    let n = state.exchanges_completed.fetch_add(1, Ordering::SeqCst) + 1;
    let response = serde_json::json!({
        "access_token": format!("access-sandbox-{}", n),
        "item_id": format!("mock-item-{}", n),
        "request_id": "mock-req",
    });
    send_response(stream, 200, "OK", &response.to_string());
}

fn handle_institution(stream: &mut TcpStream, body: &JsonValue) {
    let institution_id = body
        .get("institution_id")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    if institution_id.is_empty() {
        send_response(
            stream,
            400,
            "Bad Request",
            &plaid_error(
                "INVALID_INPUT",
                "INVALID_INSTITUTION",
                "institution_id is required",
            ),
        );
        return;
    }

    let name = match institution_id {
        "ins_109508" => "First Platypus Bank".to_string(),
        "ins_109509" => "First Gingham Credit Union".to_string(),
        other => format!("Mock Institution {}", other),
    };

    let response = serde_json::json!({
        "institution": { "institution_id": institution_id, "name": name },
        "request_id": "mock-req",
    });
    send_response(stream, 200, "OK", &response.to_string());
}

fn handle_accounts(stream: &mut TcpStream, body: &JsonValue, config: &MockConfig) {
    if !has_access_token(body) {
        send_invalid_access_token(stream);
        return;
    }

    let accounts = generate_mock_accounts(config.num_accounts);
    let response = serde_json::json!({
        "accounts": accounts,
        "item": { "institution_id": "ins_109508" },
        "request_id": "mock-req",
    });
    send_response(stream, 200, "OK", &response.to_string());
}

fn handle_transactions_sync(stream: &mut TcpStream, body: &JsonValue, config: &MockConfig) {
    if !has_access_token(body) {
        send_invalid_access_token(stream);
        return;
    }

    let all = generate_mock_transactions(config.num_transactions, config.num_accounts);
    let page_size = if config.transactions_per_page == 0 {
        all.len().max(1)
    } else {
        config.transactions_per_page
    };

    let cursor = body.get("cursor").and_then(|v| v.as_str()).unwrap_or("");
    let offset = cursor
        .strip_prefix("cursor-")
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0)
        .min(all.len());
    let end = (offset + page_size).min(all.len());

    let response = serde_json::json!({
        "added": &all[offset..end],
        "modified": [],
        "removed": [],
        "next_cursor": format!("cursor-{}", end),
        "has_more": end < all.len(),
        "request_id": "mock-req",
    });
    send_response(stream, 200, "OK", &response.to_string());
}

fn has_access_token(body: &JsonValue) -> bool {
    body.get("access_token")
        .and_then(|v| v.as_str())
        .map_or(false, |token| token.starts_with("access-"))
}

fn send_invalid_access_token(stream: &mut TcpStream) {
    send_response(
        stream,
        400,
        "Bad Request",
        &plaid_error(
            "INVALID_INPUT",
            "INVALID_ACCESS_TOKEN",
            "provided access token is invalid",
        ),
    );
}

fn plaid_error(error_type: &str, error_code: &str, error_message: &str) -> String {
    serde_json::json!({
        "error_type": error_type,
        "error_code": error_code,
        "error_message": error_message,
        "request_id": "mock-req",
    })
    .to_string()
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn generate_mock_accounts(count: usize) -> Vec<MockAccount> {
    let templates = [
        ("Checking", "depository", "checking", 1100.50, 1250.75),
        ("Savings", "depository", "savings", 8400.00, 8400.00),
        ("Credit Card", "credit", "credit card", 450.21, 2049.79),
        ("Money Market", "depository", "money market", 12060.20, 12060.20),
    ];

    (0..count)
        .map(|i| {
            let (label, account_type, subtype, available, current) =
                templates[i % templates.len()];

            MockAccount {
                account_id: format!("mock-account-{}", i + 1),
                name: format!("Plaid {}", label),
                official_name: Some(format!("Plaid {} Account", label)),
                account_type: account_type.to_string(),
                subtype: subtype.to_string(),
                mask: format!("{:04}", i),
                balances: MockBalances {
                    available,
                    current,
                    iso_currency_code: "USD".to_string(),
                },
            }
        })
        .collect()
}

fn generate_mock_transactions(count: usize, num_accounts: usize) -> Vec<MockTransaction> {
    // Debits are positive in Plaid's sign convention
    let merchants = [
        ("Tesco", 45.23, "FOOD_AND_DRINK"),
        ("Amazon", 29.99, "GENERAL_MERCHANDISE"),
        ("Netflix", 9.99, "ENTERTAINMENT"),
        ("Shell", 52.00, "TRANSPORTATION"),
        ("Costa Coffee", 4.50, "FOOD_AND_DRINK"),
        ("Spotify", 9.99, "ENTERTAINMENT"),
        ("Uber", 12.50, "TRANSPORTATION"),
        ("Apple", 199.00, "GENERAL_MERCHANDISE"),
        ("SALARY", -3500.00, "INCOME"),
        ("Interest", -2.50, "INCOME"),
    ];

    let today = Utc::now().naive_utc().date();

    (0..count)
        .map(|i| {
            let (merchant, amount, category) = merchants[i % merchants.len()];
            let days_ago = (i % 90) as i64;
            let date = today - Duration::days(days_ago);

            MockTransaction {
                transaction_id: format!("mock-tx-{}", i + 1),
                account_id: format!("mock-account-{}", (i % num_accounts.max(1)) + 1),
                amount,
                iso_currency_code: "USD".to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                name: format!("{} - Transaction #{}", merchant, i + 1),
                merchant_name: Some(merchant.to_string()),
                pending: i < 3, // First 3 transactions are pending
                personal_finance_category: MockCategory {
                    primary: category.to_string(),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::plaid::{PlaidAggregator, PlaidClient};
    use crate::domain::result::Error as DomainError;
    use crate::domain::Identity;
    use crate::ports::BankDataAggregator;

    fn client_for(server: &MockPlaidServer) -> PlaidClient {
        PlaidClient::new_with_base_url("client-id", "secret", &server.base_url()).unwrap()
    }

    #[test]
    fn test_mock_server_starts() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        assert!(server.port() > 0);
    }

    #[test]
    fn test_link_token_roundtrip() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        let client = client_for(&server);

        let response = client
            .create_link_token("user-1", "Horizon", &["transactions".to_string()])
            .unwrap();

        assert!(response.link_token.starts_with("link-sandbox-"));
        assert!(response.expiration.is_some());
    }

    #[test]
    fn test_exchange_is_single_use() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        let client = client_for(&server);

        let first = client.exchange_public_token("public-sandbox-abc").unwrap();
        assert!(first.access_token.starts_with("access-sandbox-"));

        let replay = client.exchange_public_token("public-sandbox-abc");
        assert!(replay
            .unwrap_err()
            .to_string()
            .contains("INVALID_PUBLIC_TOKEN"));
    }

    #[test]
    fn test_exchange_rejects_garbage_tokens() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        let client = client_for(&server);

        let result = client.exchange_public_token("not-a-public-token");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("INVALID_PUBLIC_TOKEN"));
    }

    #[test]
    fn test_accounts_roundtrip() {
        let server = MockPlaidServer::start(MockConfig {
            num_accounts: 4,
            ..Default::default()
        })
        .unwrap();
        let client = client_for(&server);

        let response = client.get_accounts("access-sandbox-1").unwrap();

        assert_eq!(response.accounts.len(), 4);
        assert_eq!(response.item.institution_id.as_deref(), Some("ins_109508"));
        assert!(response.accounts[0].balances.current.is_some());
    }

    #[test]
    fn test_transactions_sync_pages_until_exhausted() {
        let server = MockPlaidServer::start(MockConfig {
            num_transactions: 25,
            transactions_per_page: 10,
            ..Default::default()
        })
        .unwrap();
        let client = client_for(&server);

        let mut cursor: Option<String> = None;
        let mut total = 0;
        let mut pages = 0;
        loop {
            let page = client
                .sync_transactions("access-sandbox-1", cursor.as_deref())
                .unwrap();
            total += page.added.len();
            pages += 1;
            if !page.has_more {
                break;
            }
            cursor = Some(page.next_cursor);
        }

        assert_eq!(total, 25);
        assert_eq!(pages, 3);
    }

    #[test]
    fn test_institution_lookup() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        let client = client_for(&server);

        let institution = client.get_institution("ins_109508").unwrap();
        assert_eq!(institution.name, "First Platypus Bank");
    }

    #[test]
    fn test_auth_failure() {
        let server = MockPlaidServer::start(MockConfig {
            fail_auth: true,
            ..Default::default()
        })
        .unwrap();
        let client = client_for(&server);

        let result = client.get_accounts("access-sandbox-1");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("authentication failed"));
    }

    #[test]
    fn test_rate_limit() {
        let server = MockPlaidServer::start(MockConfig {
            rate_limit: true,
            ..Default::default()
        })
        .unwrap();
        let client = client_for(&server);

        let result = client.sync_transactions("access-sandbox-1", None);
        let err_msg = result.unwrap_err().to_string().to_lowercase();
        assert!(
            err_msg.contains("rate limit"),
            "Expected 'rate limit' in error, got: {}",
            err_msg
        );
    }

    #[test]
    fn test_aggregator_against_mock() {
        let server = MockPlaidServer::start(MockConfig {
            num_accounts: 2,
            num_transactions: 5,
            ..Default::default()
        })
        .unwrap();

        let aggregator =
            PlaidAggregator::new_with_base_url("client-id", "secret", &server.base_url()).unwrap();
        let identity = Identity::new("mock@example.com", "Mock", "User");

        let link = aggregator
            .create_link_token(&identity, &["transactions".to_string()])
            .unwrap();
        assert!(!link.token.is_empty());
        assert!(link.expires_at.is_some());

        let grant = aggregator
            .exchange_public_token(&identity, "public-sandbox-xyz")
            .unwrap();
        assert_eq!(grant.institution_id, "ins_109508");
        assert_eq!(grant.institution_name, "First Platypus Bank");

        let accounts = aggregator.fetch_accounts(&grant.access_credential).unwrap();
        assert_eq!(accounts.accounts.len(), 2);
        assert!(accounts.warnings.is_empty());

        let page = aggregator
            .fetch_transactions(&grant.access_credential, None)
            .unwrap();
        assert_eq!(page.transactions.len(), 5);
        assert!(!page.has_more);

        // Replaying the same public token is a terminal exchange failure
        let replay = aggregator.exchange_public_token(&identity, "public-sandbox-xyz");
        assert!(matches!(replay, Err(DomainError::ExchangeFailed(_))));
    }
}
