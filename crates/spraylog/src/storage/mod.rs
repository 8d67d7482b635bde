//! Storage layer for spraylog.
//!
//! This module provides `SQLite`-based persistent storage for spraying
//! records. [`Storage`] describes the database and initializes it once at
//! startup; every request then works through its own [`StorageHandle`], which
//! closes its connection when dropped.

pub mod schema;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{NewRecord, Record};

const SELECT_COLUMNS: &str = "SELECT id, date, field, product, dose, notes FROM records";

/// The record database.
///
/// Holds the database location resolved from configuration. Opening it
/// creates the file and schema; connections are handed out per request by
/// [`Storage::handle`].
#[derive(Debug, Clone)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// and the records table if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = connect(&path)?;

        // WAL lets readers proceed while another request is writing
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::initialize_schema(&conn)?;

        info!("Database ready at {}", path.display());
        Ok(Self { path })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a connection for a single request.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn handle(&self) -> Result<StorageHandle> {
        Ok(StorageHandle {
            conn: connect(&self.path)?,
        })
    }
}

fn connect(path: &Path) -> Result<Connection> {
    Connection::open(path).map_err(|source| Error::DatabaseOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// A scoped connection to the record database.
///
/// The connection is closed when the handle goes out of scope.
#[derive(Debug)]
pub struct StorageHandle {
    conn: Connection,
}

impl StorageHandle {
    /// Create an in-memory handle with an initialized schema, for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        schema::initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Insert a record and return it with its assigned id.
    ///
    /// The row is read back after the insert. If it has vanished by then
    /// (deleted by a concurrent request) the insert is not undone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] if the inserted row cannot be
    /// read back, or a query error if the database operation fails.
    pub fn create(&self, record: &NewRecord) -> Result<Record> {
        self.conn.execute(
            r"
            INSERT INTO records (date, field, product, dose, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                record.date.format("%Y-%m-%d").to_string(),
                record.field,
                record.product,
                record.dose,
                record.notes,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted record with id {}", id);

        self.get(id)?.ok_or(Error::StorageUnavailable { id })
    }

    /// Get a record by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<Record>> {
        let record = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// List all records, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self) -> Result<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))?;

        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id, or a query error
    /// if the database operation fails.
    pub fn delete(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(Error::NotFound { id });
        }
        debug!("Deleted record {}", id);
        Ok(())
    }

    /// Delete every record.
    ///
    /// Returns the number of records removed; an empty table is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_all(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM records", [])?;
        Ok(affected)
    }

    /// Convert a database row to a Record.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<Record> {
        let date_str: String = row.get(1)?;
        let date = date_str
            .parse::<NaiveDate>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let notes: Option<String> = row.get(5)?;

        Ok(Record {
            id: row.get(0)?,
            date,
            field: row.get(2)?,
            product: row.get(3)?,
            dose: row.get(4)?,
            notes: notes.unwrap_or_default(),
        })
    }
}
