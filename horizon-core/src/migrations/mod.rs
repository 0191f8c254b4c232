//! Embedded schema migrations for the main database
//!
//! Each SQL file is compiled into the binary with include_str! and applied
//! once, in list order, keyed by file name in sys_migrations.

/// Ordered (file name, SQL) pairs. New migrations append here with the
/// next NNN_ prefix.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
