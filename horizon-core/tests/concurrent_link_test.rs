//! Concurrent link and store access tests
//!
//! These tests verify that racing callers cannot corrupt the registry: a
//! public token must finalize at most once no matter how many threads try,
//! and separate store instances on the same file must serialize cleanly.
//!
//! Run with: cargo test --test concurrent_link_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use uuid::Uuid;

use horizon_core::adapters::directory::DirectoryProvider;
use horizon_core::adapters::duckdb::DuckDbStore;
use horizon_core::domain::result::Result;
use horizon_core::domain::{
    AccessCredential, Identity, LinkToken, LinkedItem, NewIdentity, NewLinkedItem,
};
use horizon_core::ports::{
    BankDataAggregator, ExchangeGrant, FetchAccountsResult, TransactionsPage,
};
use horizon_core::services::{LinkService, RegistryService, SessionService};

/// Number of concurrent threads for stress tests.
/// Keep this realistic - in production we'd have at most a few processes
/// (web handler + CLI + maybe another CLI command) hitting the store.
const THREAD_COUNT: usize = 6;

/// Number of iterations per thread
const ITERATIONS_PER_THREAD: usize = 5;

const ADMIN_KEY: &str = "race-admin-key";
const PASSWORD: &str = "hunter2hunter2";

/// Aggregator double that happily exchanges the same public token forever.
///
/// With the aggregator never refusing, the store's transactional
/// consumed-token check is the only thing standing between a race and a
/// double link.
struct PermissiveBank {
    exchanges: AtomicUsize,
}

impl PermissiveBank {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            exchanges: AtomicUsize::new(0),
        })
    }
}

impl BankDataAggregator for PermissiveBank {
    fn name(&self) -> &str {
        "permissive"
    }

    fn create_link_token(&self, _identity: &Identity, _products: &[String]) -> Result<LinkToken> {
        Ok(LinkToken {
            token: "link-race".to_string(),
            expires_at: None,
        })
    }

    fn exchange_public_token(
        &self,
        _identity: &Identity,
        _public_token: &str,
    ) -> Result<ExchangeGrant> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(ExchangeGrant {
            access_credential: AccessCredential::new(format!("access-race-{}", n)),
            item_ref: format!("item-race-{}", n),
            institution_id: "ins_109508".to_string(),
            institution_name: "First Platypus Bank".to_string(),
        })
    }

    fn fetch_accounts(&self, _credential: &AccessCredential) -> Result<FetchAccountsResult> {
        Ok(FetchAccountsResult::default())
    }

    fn fetch_transactions(
        &self,
        _credential: &AccessCredential,
        _cursor: Option<&str>,
    ) -> Result<TransactionsPage> {
        Ok(TransactionsPage::default())
    }
}

fn register_and_sign_in(sessions: &SessionService, email: &str) -> (Uuid, String) {
    let admin = sessions.create_admin_scope(ADMIN_KEY).unwrap();
    let identity = sessions
        .register(
            &admin,
            &NewIdentity {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                first_name: "Race".to_string(),
                last_name: "Tester".to_string(),
                address1: None,
                city: None,
                state: None,
                postal_code: None,
                date_of_birth: None,
            },
        )
        .unwrap();
    let signed_in = sessions.sign_in(email, PASSWORD).unwrap();
    (identity.id, signed_in.token)
}

/// Test: All threads race to finalize the SAME public token.
///
/// The aggregator always grants, so the winner is decided entirely by the
/// store's commit. Exactly one thread must end up with a linked item; the
/// rest must fail (as a spent token or a duplicate institution, depending
/// on where the race lands).
#[test]
fn test_racing_finalize_commits_exactly_one_item() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_race.duckdb");

    let store = Arc::new(DuckDbStore::new(&db_path).unwrap());
    store.ensure_schema().unwrap();

    let sessions = Arc::new(SessionService::new(
        Arc::new(DirectoryProvider::new(Arc::clone(&store))),
        7,
        Some(ADMIN_KEY.to_string()),
    ));
    let (identity_id, token) = register_and_sign_in(&sessions, "race@example.com");

    let links = Arc::new(LinkService::new(
        Arc::clone(&store),
        PermissiveBank::new(),
        vec!["auth".to_string(), "transactions".to_string()],
    ));

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));
    let failure_count = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let sessions = Arc::clone(&sessions);
        let links = Arc::clone(&links);
        let token = token.clone();
        let success_count = Arc::clone(&success_count);
        let failure_count = Arc::clone(&failure_count);

        let handle = thread::spawn(move || {
            // Each thread resolves its own scope, like separate requests
            let scope = sessions.create_user_scope(&token).unwrap();
            barrier.wait();

            match links.finalize_link(&scope, "public-race", false) {
                Ok(item) => {
                    println!("Thread {}: Won the race, linked {}", thread_id, item.id);
                    success_count.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    println!("Thread {}: Lost the race: {}", thread_id, e);
                    failure_count.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let successes = success_count.load(Ordering::SeqCst);
    let failures = failure_count.load(Ordering::SeqCst);

    println!("\n=== Results ===");
    println!("Successes: {}", successes);
    println!("Failures: {}", failures);

    assert_eq!(successes, 1, "Exactly one thread must win the race");
    assert_eq!(
        failures,
        THREAD_COUNT - 1,
        "Every other thread must fail"
    );

    let items = store.get_linked_items(identity_id).unwrap();
    assert_eq!(
        items.len(),
        1,
        "The race must leave exactly one linked item"
    );
}

/// Test: Writers finalize fresh tokens while readers list the registry.
///
/// Simulates a refresh command listing items while link commands are
/// still landing. Reads and writes go through the same shared store.
#[test]
fn test_interleaved_reads_and_finalizes() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_interleaved.duckdb");

    let store = Arc::new(DuckDbStore::new(&db_path).unwrap());
    store.ensure_schema().unwrap();

    let sessions = SessionService::new(
        Arc::new(DirectoryProvider::new(Arc::clone(&store))),
        7,
        Some(ADMIN_KEY.to_string()),
    );
    let (_identity_id, token) = register_and_sign_in(&sessions, "interleaved@example.com");
    let scope = sessions.create_user_scope(&token).unwrap();

    let links = Arc::new(LinkService::new(
        Arc::clone(&store),
        PermissiveBank::new(),
        vec!["auth".to_string(), "transactions".to_string()],
    ));
    let registry = Arc::new(RegistryService::new(Arc::clone(&store)));

    let writer_count = THREAD_COUNT / 2;
    let reader_count = THREAD_COUNT / 2;

    let barrier = Arc::new(Barrier::new(writer_count + reader_count));
    let write_errors = Arc::new(AtomicUsize::new(0));
    let read_errors = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];

    for thread_id in 0..writer_count {
        let barrier = Arc::clone(&barrier);
        let links = Arc::clone(&links);
        let scope = scope.clone();
        let write_errors = Arc::clone(&write_errors);

        let handle = thread::spawn(move || {
            barrier.wait();

            for i in 0..ITERATIONS_PER_THREAD {
                // Distinct tokens; multi because every grant is the same
                // institution.
                let public_token = format!("public-rw-t{}-i{}", thread_id, i);
                if let Err(e) = links.finalize_link(&scope, &public_token, true) {
                    eprintln!("Writer {}: Finalize error at {}: {}", thread_id, i, e);
                    write_errors.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        handles.push(handle);
    }

    for thread_id in 0..reader_count {
        let barrier = Arc::clone(&barrier);
        let registry = Arc::clone(&registry);
        let scope = scope.clone();
        let read_errors = Arc::clone(&read_errors);

        let handle = thread::spawn(move || {
            barrier.wait();

            for i in 0..ITERATIONS_PER_THREAD {
                if let Err(e) = registry.list_items(&scope) {
                    eprintln!("Reader {}: List error at {}: {}", thread_id, i, e);
                    read_errors.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let total_write_errors = write_errors.load(Ordering::SeqCst);
    let total_read_errors = read_errors.load(Ordering::SeqCst);
    let items = registry.list_items(&scope).unwrap();

    println!("\n=== Read/Write Results ===");
    println!("Write errors: {}", total_write_errors);
    println!("Read errors: {}", total_read_errors);
    println!("Items linked: {}", items.len());

    assert_eq!(total_write_errors, 0, "Finalizes should not fail");
    assert_eq!(total_read_errors, 0, "Reads should not fail");
    assert_eq!(
        items.len(),
        writer_count * ITERATIONS_PER_THREAD,
        "Every distinct token must produce its own item"
    );
}

/// Test: Multiple threads creating separate DuckDbStore instances
/// and writing to the same database file simultaneously.
///
/// This simulates concurrent CLI invocations, each of which builds its
/// own context with its own store.
#[test]
fn test_concurrent_store_instances_writing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_concurrent.duckdb");

    // Create initial database with schema
    {
        let store = DuckDbStore::new(&db_path).unwrap();
        store.ensure_schema().unwrap();
    }

    let identity_id = Uuid::new_v4();
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let db_path = Arc::new(db_path);
    let success_count = Arc::new(AtomicUsize::new(0));
    let error_count = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let db_path = Arc::clone(&db_path);
        let success_count = Arc::clone(&success_count);
        let error_count = Arc::clone(&error_count);

        let handle = thread::spawn(move || {
            // Wait for all threads to be ready
            barrier.wait();

            // Each thread creates its OWN store instance
            match DuckDbStore::new(&db_path) {
                Ok(store) => {
                    for i in 0..ITERATIONS_PER_THREAD {
                        let item = LinkedItem::new(NewLinkedItem {
                            identity_id,
                            item_ref: format!("item-t{}-i{}", thread_id, i),
                            institution_id: format!("ins_t{}_i{}", thread_id, i),
                            institution_name: format!("Bank t{} i{}", thread_id, i),
                            access_credential: AccessCredential::new(format!(
                                "access-t{}-i{}",
                                thread_id, i
                            )),
                        });
                        match store.insert_linked_item(&item) {
                            Ok(_) => {
                                success_count.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(e) => {
                                eprintln!(
                                    "Thread {}: Write error at iteration {}: {}",
                                    thread_id, i, e
                                );
                                error_count.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Thread {}: Failed to open store: {}", thread_id, e);
                    error_count.fetch_add(ITERATIONS_PER_THREAD, Ordering::SeqCst);
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let total_successes = success_count.load(Ordering::SeqCst);
    let total_errors = error_count.load(Ordering::SeqCst);
    let expected_total = THREAD_COUNT * ITERATIONS_PER_THREAD;

    println!("\n=== Results ===");
    println!("Total operations: {}", expected_total);
    println!("Successes: {}", total_successes);
    println!("Errors: {}", total_errors);

    // Verify database integrity by reading the items back
    let store = DuckDbStore::new(&db_path).unwrap();
    let items = store.get_linked_items(identity_id).unwrap();
    println!("Items in database: {}", items.len());

    assert_eq!(
        total_errors, 0,
        "Expected 0 errors but got {}. This indicates race conditions.",
        total_errors
    );
    assert_eq!(
        total_successes, expected_total,
        "Expected {} successful operations but got {}",
        expected_total, total_successes
    );
    assert_eq!(items.len(), expected_total);
}
