//! `SQLite` schema definitions for spraylog.
//!
//! This module contains the SQL statements for creating the database schema.

use rusqlite::Connection;

use crate::error::Result;

/// SQL statement to create the records table.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    field TEXT NOT NULL,
    product TEXT NOT NULL,
    dose REAL NOT NULL,
    notes TEXT DEFAULT ''
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_RECORDS_TABLE];

/// Create all tables if they don't exist.
///
/// Safe to run on every startup.
///
/// # Errors
///
/// Returns an error if a schema statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    Ok(())
}
