//! DuckDB store implementation

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, params_from_iter, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    AccessCredential, Account, Identity, LinkedItem, Session, Tier, Transaction,
};
use crate::migrations::MIGRATIONS;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB store
///
/// The single shared mutable piece of the system. All access goes through
/// one `Mutex<Connection>`; multi-statement mutations run inside explicit
/// transactions so concurrent callers cannot observe half-applied state.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbStore {
    /// Create a new DuckDB store
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when multiple processes touch the database at the
    /// same time.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[horizon] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // IMPORTANT: Disable extension autoloading to avoid macOS code signing issues
        // (cached extensions in ~/.duckdb/extensions may have different Team IDs)
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;

        // Note: JSON extension is statically linked via Cargo feature "json"
        // No LOAD required - it's compiled into DuckDB
        // ICU is NOT included - expiry and date logic uses Rust-computed values

        Ok(conn)
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        // Check if migrations table exists
        let table_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        // Bootstrap migrations table if needed
        if !table_exists {
            if let Some((name, sql)) = MIGRATIONS.iter().find(|(n, _)| *n == "000_migrations.sql") {
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO sys_migrations (migration_name) VALUES (?)",
                    [name],
                )?;
            }
        }

        // Get applied migrations
        let mut stmt = conn.prepare("SELECT migration_name FROM sys_migrations")?;
        let applied: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        // Apply pending migrations in order
        for (name, sql) in MIGRATIONS.iter() {
            if *name == "000_migrations.sql" {
                continue;
            }
            if !applied.contains(&name.to_string()) {
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO sys_migrations (migration_name) VALUES (?)",
                    [name],
                )?;
            }
        }

        Ok(())
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // === Identity operations ===

    /// Insert a new identity together with its password hash
    ///
    /// The hash lives only in this table; it is never part of the entity.
    pub fn insert_identity(&self, identity: &Identity, password_hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sys_identities (identity_id, email, password_hash, first_name, last_name,
                                         address1, city, state, postal_code, date_of_birth, tier,
                                         created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                identity.id.to_string(),
                identity.email,
                password_hash,
                identity.first_name,
                identity.last_name,
                identity.address1,
                identity.city,
                identity.state,
                identity.postal_code,
                identity.date_of_birth.map(|d| d.to_string()),
                identity.tier.as_str(),
                identity.created_at.to_rfc3339(),
                identity.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up an identity and its password hash by normalized email
    pub fn get_identity_by_email(&self, email: &str) -> Result<Option<(Identity, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT identity_id, email, first_name, last_name, address1, city, state,
                    postal_code, date_of_birth::VARCHAR, tier, created_at, updated_at,
                    password_hash
             FROM sys_identities WHERE email = ?",
        )?;

        let row = stmt
            .query_row([email], |row| {
                let hash: String = row.get(12).unwrap_or_default();
                Ok((Self::row_to_identity(row), hash))
            })
            .ok();

        Ok(row)
    }

    pub fn get_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT identity_id, email, first_name, last_name, address1, city, state,
                    postal_code, date_of_birth::VARCHAR, tier, created_at, updated_at
             FROM sys_identities WHERE identity_id = ?",
        )?;

        let identity = stmt
            .query_row([id.to_string()], |row| Ok(Self::row_to_identity(row)))
            .ok();

        Ok(identity)
    }

    fn row_to_identity(row: &duckdb::Row) -> Identity {
        // Column indices from SELECT:
        // 0: identity_id, 1: email, 2: first_name, 3: last_name, 4: address1,
        // 5: city, 6: state, 7: postal_code, 8: date_of_birth, 9: tier,
        // 10: created_at, 11: updated_at
        let id_str: String = row.get(0).unwrap_or_default();
        let dob_str: Option<String> = row.get(8).ok();
        let tier_str: String = row.get(9).unwrap_or_default();
        let created_str: String = row.get(10).unwrap_or_default();
        let updated_str: String = row.get(11).unwrap_or_default();

        Identity {
            id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
            email: row.get(1).unwrap_or_default(),
            first_name: row.get(2).unwrap_or_default(),
            last_name: row.get(3).unwrap_or_default(),
            address1: row.get(4).ok(),
            city: row.get(5).ok(),
            state: row.get(6).ok(),
            postal_code: row.get(7).ok(),
            date_of_birth: dob_str.map(|s| parse_date(&s)),
            tier: Tier::from_str_or_user(&tier_str),
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        }
    }

    // === Session operations ===

    pub fn insert_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sys_sessions (session_id, identity_id, token_fingerprint, tier,
                                       issued_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                session.id.to_string(),
                session.identity_id.to_string(),
                session.token_fingerprint,
                session.tier.as_str(),
                session.issued_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_session_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id, identity_id, token_fingerprint, tier, issued_at, expires_at
             FROM sys_sessions WHERE token_fingerprint = ?",
        )?;

        let session = stmt
            .query_row([fingerprint], |row| {
                // 0: session_id, 1: identity_id, 2: token_fingerprint, 3: tier,
                // 4: issued_at, 5: expires_at
                let id_str: String = row.get(0).unwrap_or_default();
                let identity_str: String = row.get(1).unwrap_or_default();
                let tier_str: String = row.get(3).unwrap_or_default();
                let issued_str: String = row.get(4).unwrap_or_default();
                let expires_str: String = row.get(5).unwrap_or_default();

                Ok(Session {
                    id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
                    identity_id: Uuid::parse_str(&identity_str).unwrap_or_else(|_| Uuid::new_v4()),
                    token_fingerprint: row.get(2).unwrap_or_default(),
                    tier: Tier::from_str_or_user(&tier_str),
                    issued_at: parse_timestamp(&issued_str),
                    expires_at: parse_timestamp(&expires_str),
                })
            })
            .ok();

        Ok(session)
    }

    /// Delete a session by fingerprint; returns the number of rows removed
    pub fn delete_session_by_fingerprint(&self, fingerprint: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM sys_sessions WHERE token_fingerprint = ?",
            [fingerprint],
        )?;
        Ok(deleted)
    }

    // === Linked item operations ===

    /// Append a linked item outside the exchange path
    ///
    /// `commit_exchange` is the normal way items are created; this one is
    /// for registry appends that carry no public token.
    pub fn insert_linked_item(&self, item: &LinkedItem) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sys_linked_items (item_id, identity_id, item_ref, institution_id,
                                           institution_name, access_credential, sync_cursor,
                                           created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.id.to_string(),
                item.identity_id.to_string(),
                item.item_ref,
                item.institution_id,
                item.institution_name,
                item.access_credential.reveal(),
                item.sync_cursor,
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Items for one identity, in the order they were linked
    pub fn get_linked_items(&self, identity_id: Uuid) -> Result<Vec<LinkedItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT item_id, identity_id, item_ref, institution_id, institution_name,
                    access_credential, sync_cursor, created_at, updated_at
             FROM sys_linked_items WHERE identity_id = ?
             ORDER BY link_seq",
        )?;

        let items = stmt
            .query_map([identity_id.to_string()], |row| Ok(Self::row_to_item(row)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(items)
    }

    pub fn get_linked_item_by_id(&self, item_id: Uuid) -> Result<Option<LinkedItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT item_id, identity_id, item_ref, institution_id, institution_name,
                    access_credential, sync_cursor, created_at, updated_at
             FROM sys_linked_items WHERE item_id = ?",
        )?;

        let item = stmt
            .query_row([item_id.to_string()], |row| Ok(Self::row_to_item(row)))
            .ok();

        Ok(item)
    }

    /// Whether an item already exists for this (identity, institution) pair
    pub fn has_active_link(&self, identity_id: Uuid, institution_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_linked_items WHERE identity_id = ? AND institution_id = ?",
            params![identity_id.to_string(), institution_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Persist the advanced transaction sync cursor for an item
    pub fn update_sync_cursor(&self, item_id: Uuid, cursor: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sys_linked_items SET sync_cursor = ?, updated_at = ? WHERE item_id = ?",
            params![cursor, Utc::now().to_rfc3339(), item_id.to_string()],
        )?;
        Ok(())
    }

    /// Delete an item and all cached projections that hang off it
    ///
    /// Transactions, accounts, and the item row go in one transaction, so a
    /// crash cannot leave orphaned projections behind.
    pub fn delete_linked_item(&self, item_id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let id = item_id.to_string();
        tx.execute(
            "DELETE FROM sys_transactions WHERE account_id IN
             (SELECT account_id FROM sys_accounts WHERE item_id = ?)",
            [&id],
        )?;
        tx.execute("DELETE FROM sys_accounts WHERE item_id = ?", [&id])?;
        tx.execute("DELETE FROM sys_linked_items WHERE item_id = ?", [&id])?;

        tx.commit()?;
        Ok(())
    }

    fn row_to_item(row: &duckdb::Row) -> LinkedItem {
        // Column indices from SELECT:
        // 0: item_id, 1: identity_id, 2: item_ref, 3: institution_id,
        // 4: institution_name, 5: access_credential, 6: sync_cursor,
        // 7: created_at, 8: updated_at
        let id_str: String = row.get(0).unwrap_or_default();
        let identity_str: String = row.get(1).unwrap_or_default();
        let credential: String = row.get(5).unwrap_or_default();
        let created_str: String = row.get(7).unwrap_or_default();
        let updated_str: String = row.get(8).unwrap_or_default();

        LinkedItem {
            id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
            identity_id: Uuid::parse_str(&identity_str).unwrap_or_else(|_| Uuid::new_v4()),
            item_ref: row.get(2).unwrap_or_default(),
            institution_id: row.get(3).unwrap_or_default(),
            institution_name: row.get(4).unwrap_or_default(),
            access_credential: AccessCredential::new(credential),
            sync_cursor: row.get(6).ok(),
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        }
    }

    // === Link grant operations ===

    /// Whether a public token fingerprint has already been consumed
    pub fn is_token_consumed(&self, token_fingerprint: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_link_grants WHERE token_fingerprint = ?",
            [token_fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a consumed token that produced no item (duplicate-link case)
    pub fn record_consumed_token(&self, token_fingerprint: &str, identity_id: Uuid) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sys_link_grants (token_fingerprint, identity_id, item_id, consumed_at)
             VALUES (?, ?, NULL, ?)
             ON CONFLICT (token_fingerprint) DO NOTHING",
            params![
                token_fingerprint,
                identity_id.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Atomically retire a public token and register the item it produced
    ///
    /// One unit of work per (identity, public token): the fingerprint row
    /// and the item row land together or not at all. A fingerprint that is
    /// already present fails the whole commit, so a replayed exchange can
    /// never yield a second item.
    pub fn commit_exchange(&self, token_fingerprint: &str, item: &LinkedItem) -> Result<LinkedItem> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let consumed: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sys_link_grants WHERE token_fingerprint = ?",
            [token_fingerprint],
            |row| row.get(0),
        )?;
        if consumed > 0 {
            return Err(Error::exchange_failed("public token already consumed"));
        }

        tx.execute(
            "INSERT INTO sys_link_grants (token_fingerprint, identity_id, item_id, consumed_at)
             VALUES (?, ?, ?, ?)",
            params![
                token_fingerprint,
                item.identity_id.to_string(),
                item.id.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.execute(
            "INSERT INTO sys_linked_items (item_id, identity_id, item_ref, institution_id,
                                           institution_name, access_credential, sync_cursor,
                                           created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.id.to_string(),
                item.identity_id.to_string(),
                item.item_ref,
                item.institution_id,
                item.institution_name,
                item.access_credential.reveal(),
                item.sync_cursor,
                item.created_at.to_rfc3339(),
                item.updated_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(item.clone())
    }

    // === Account operations ===

    /// Replace the cached account projections for one item
    ///
    /// Upserts by (item_id, external_id) so internal account ids stay
    /// stable across refreshes; accounts the aggregator no longer reports
    /// are dropped along with their cached transactions.
    pub fn replace_accounts_for_item(&self, item_id: Uuid, accounts: &[Account]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for account in accounts {
            tx.execute(
                "INSERT INTO sys_accounts (account_id, item_id, external_id, name, official_name,
                                           account_type, subtype, mask, currency,
                                           current_balance, available_balance,
                                           created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (item_id, external_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    official_name = COALESCE(EXCLUDED.official_name, sys_accounts.official_name),
                    account_type = COALESCE(EXCLUDED.account_type, sys_accounts.account_type),
                    subtype = COALESCE(EXCLUDED.subtype, sys_accounts.subtype),
                    mask = COALESCE(EXCLUDED.mask, sys_accounts.mask),
                    currency = EXCLUDED.currency,
                    current_balance = EXCLUDED.current_balance,
                    available_balance = EXCLUDED.available_balance,
                    updated_at = EXCLUDED.updated_at",
                params![
                    account.id.to_string(),
                    item_id.to_string(),
                    account.external_id,
                    account.name,
                    account.official_name,
                    account.account_type,
                    account.subtype,
                    account.mask,
                    account.currency,
                    account
                        .current_balance
                        .map(|d| d.to_string().parse::<f64>().unwrap_or(0.0)),
                    account
                        .available_balance
                        .map(|d| d.to_string().parse::<f64>().unwrap_or(0.0)),
                    account.created_at.to_rfc3339(),
                    account.updated_at.to_rfc3339(),
                ],
            )?;
        }

        // Drop accounts (and their transactions) the aggregator stopped reporting
        if accounts.is_empty() {
            tx.execute(
                "DELETE FROM sys_transactions WHERE account_id IN
                 (SELECT account_id FROM sys_accounts WHERE item_id = ?)",
                [item_id.to_string()],
            )?;
            tx.execute(
                "DELETE FROM sys_accounts WHERE item_id = ?",
                [item_id.to_string()],
            )?;
        } else {
            let placeholders = vec!["?"; accounts.len()].join(", ");
            let params_iter = std::iter::once(item_id.to_string())
                .chain(accounts.iter().map(|a| a.external_id.clone()));

            tx.execute(
                &format!(
                    "DELETE FROM sys_transactions WHERE account_id IN
                     (SELECT account_id FROM sys_accounts
                      WHERE item_id = ? AND external_id NOT IN ({}))",
                    placeholders
                ),
                params_from_iter(params_iter.clone()),
            )?;
            tx.execute(
                &format!(
                    "DELETE FROM sys_accounts WHERE item_id = ? AND external_id NOT IN ({})",
                    placeholders
                ),
                params_from_iter(params_iter),
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_accounts_for_item(&self, item_id: Uuid) -> Result<Vec<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, item_id, external_id, name, official_name, account_type,
                    subtype, mask, currency, current_balance, available_balance,
                    created_at, updated_at
             FROM sys_accounts WHERE item_id = ?",
        )?;

        let accounts = stmt
            .query_map([item_id.to_string()], |row| Ok(Self::row_to_account(row)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(accounts)
    }

    /// Accounts across every item the identity has linked, in link order
    pub fn get_accounts_for_identity(&self, identity_id: Uuid) -> Result<Vec<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.account_id, a.item_id, a.external_id, a.name, a.official_name,
                    a.account_type, a.subtype, a.mask, a.currency,
                    a.current_balance, a.available_balance, a.created_at, a.updated_at
             FROM sys_accounts a
             JOIN sys_linked_items i ON i.item_id = a.item_id
             WHERE i.identity_id = ?
             ORDER BY i.link_seq, a.name",
        )?;

        let accounts = stmt
            .query_map([identity_id.to_string()], |row| {
                Ok(Self::row_to_account(row))
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(accounts)
    }

    fn row_to_account(row: &duckdb::Row) -> Account {
        // Column indices from SELECT:
        // 0: account_id, 1: item_id, 2: external_id, 3: name, 4: official_name,
        // 5: account_type, 6: subtype, 7: mask, 8: currency,
        // 9: current_balance, 10: available_balance, 11: created_at, 12: updated_at
        let id_str: String = row.get(0).unwrap_or_default();
        let item_str: String = row.get(1).unwrap_or_default();
        let created_str: String = row.get(11).unwrap_or_default();
        let updated_str: String = row.get(12).unwrap_or_default();

        Account {
            id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
            item_id: Uuid::parse_str(&item_str).unwrap_or_else(|_| Uuid::new_v4()),
            external_id: row.get(2).unwrap_or_default(),
            name: row.get(3).unwrap_or_default(),
            official_name: row.get(4).ok(),
            account_type: row.get::<_, Option<String>>(5).ok().flatten(),
            subtype: row.get::<_, Option<String>>(6).ok().flatten(),
            mask: row.get(7).ok(),
            currency: row.get(8).unwrap_or_else(|_| "USD".to_string()),
            current_balance: row
                .get::<_, Option<f64>>(9)
                .ok()
                .flatten()
                .map(|f| Decimal::try_from(f).unwrap_or_default()),
            available_balance: row
                .get::<_, Option<f64>>(10)
                .ok()
                .flatten()
                .map(|f| Decimal::try_from(f).unwrap_or_default()),
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        }
    }

    // === Transaction operations ===

    /// Upsert a batch of transactions in one store transaction
    ///
    /// Deduplicates on the aggregator transaction id. Returns
    /// (added, updated) counts.
    pub fn upsert_transactions(&self, transactions: &[Transaction]) -> Result<(usize, usize)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut added = 0;
        let mut updated = 0;

        for t in transactions {
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM sys_transactions WHERE external_id = ?",
                [&t.external_id],
                |row| row.get(0),
            )?;

            if exists > 0 {
                tx.execute(
                    "UPDATE sys_transactions SET
                        transaction_date = ?, amount = ?, description = ?, category = ?,
                        pending = ?, currency = ?, updated_at = ?
                     WHERE external_id = ?",
                    params![
                        t.date.to_string(),
                        t.amount.to_string().parse::<f64>().unwrap_or(0.0),
                        t.description,
                        t.category,
                        t.pending,
                        t.currency,
                        t.updated_at.to_rfc3339(),
                        t.external_id,
                    ],
                )?;
                updated += 1;
            } else {
                tx.execute(
                    "INSERT INTO sys_transactions (transaction_id, account_id, external_id,
                                                   transaction_date, amount, description,
                                                   category, pending, currency,
                                                   created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        t.id.to_string(),
                        t.account_id.to_string(),
                        t.external_id,
                        t.date.to_string(),
                        t.amount.to_string().parse::<f64>().unwrap_or(0.0),
                        t.description,
                        t.category,
                        t.pending,
                        t.currency,
                        t.created_at.to_rfc3339(),
                        t.updated_at.to_rfc3339(),
                    ],
                )?;
                added += 1;
            }
        }

        tx.commit()?;
        Ok((added, updated))
    }

    /// Remove transactions the aggregator reports as deleted upstream
    pub fn delete_transactions_by_external_ids(&self, external_ids: &[String]) -> Result<usize> {
        if external_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; external_ids.len()].join(", ");
        let deleted = conn.execute(
            &format!(
                "DELETE FROM sys_transactions WHERE external_id IN ({})",
                placeholders
            ),
            params_from_iter(external_ids.iter()),
        )?;
        Ok(deleted)
    }

    /// All cached transactions for one identity, in insertion order
    ///
    /// Insertion order is the canonical tie-breaker; the pager applies the
    /// date ordering with a stable sort on top of this.
    pub fn get_transactions_for_identity(&self, identity_id: Uuid) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT t.transaction_id, t.account_id, t.external_id, t.transaction_date::VARCHAR,
                    t.amount, t.description, t.category, t.pending, t.currency,
                    t.created_at, t.updated_at
             FROM sys_transactions t
             JOIN sys_accounts a ON a.account_id = t.account_id
             JOIN sys_linked_items i ON i.item_id = a.item_id
             WHERE i.identity_id = ?
             ORDER BY t.tx_seq",
        )?;

        let transactions = stmt
            .query_map([identity_id.to_string()], |row| {
                Ok(Self::row_to_transaction(row))
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(transactions)
    }

    pub fn count_transactions_for_identity(&self, identity_id: Uuid) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM sys_transactions t
             JOIN sys_accounts a ON a.account_id = t.account_id
             JOIN sys_linked_items i ON i.item_id = a.item_id
             WHERE i.identity_id = ?",
            [identity_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Oldest and newest cached transaction dates for one identity
    pub fn get_transaction_date_range(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let conn = self.conn.lock().unwrap();
        let range: (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(t.transaction_date)::VARCHAR, MAX(t.transaction_date)::VARCHAR
             FROM sys_transactions t
             JOIN sys_accounts a ON a.account_id = t.account_id
             JOIN sys_linked_items i ON i.item_id = a.item_id
             WHERE i.identity_id = ?",
            [identity_id.to_string()],
            |row| Ok((row.get(0).ok(), row.get(1).ok())),
        )?;

        match range {
            (Some(min), Some(max)) => Ok(Some((parse_date(&min), parse_date(&max)))),
            _ => Ok(None),
        }
    }

    fn row_to_transaction(row: &duckdb::Row) -> Transaction {
        // Column indices from SELECT:
        // 0: transaction_id, 1: account_id, 2: external_id, 3: transaction_date,
        // 4: amount, 5: description, 6: category, 7: pending, 8: currency,
        // 9: created_at, 10: updated_at
        let id_str: String = row.get(0).unwrap_or_default();
        let account_str: String = row.get(1).unwrap_or_default();
        let date_str: String = row.get(3).unwrap_or_default();
        let amount: f64 = row.get(4).unwrap_or(0.0);
        let created_str: String = row.get(9).unwrap_or_default();
        let updated_str: String = row.get(10).unwrap_or_default();

        Transaction {
            id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
            account_id: Uuid::parse_str(&account_str).unwrap_or_else(|_| Uuid::new_v4()),
            external_id: row.get(2).unwrap_or_default(),
            date: parse_date(&date_str),
            amount: Decimal::try_from(amount).unwrap_or_default(),
            description: row.get(5).ok(),
            category: row.get(6).ok(),
            pending: row.get(7).unwrap_or(false),
            currency: row.get(8).unwrap_or_else(|_| "USD".to_string()),
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}
