//! Embedded schema migrations for logs.duckdb
//!
//! Same mechanism as the main database: SQL compiled in with include_str!,
//! applied once in list order, tracked by file name in sys_migrations.

/// Ordered (file name, SQL) pairs for the event log database.
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
