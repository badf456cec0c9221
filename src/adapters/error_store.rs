//! Append-only SQLite store for validation error records.
//!
//! Records are content-addressed, so re-inserting an identical record is a
//! no-op. Batches are written in a single transaction: either the whole
//! batch lands or none of it does.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::domain::ErrorRecord;

/// Table receiving error records
pub const ERRORS_TABLE: &str = "citation_errors";

/// SQLite-backed error store
pub struct ErrorStore {
    connection: Connection,
}

impl ErrorStore {
    /// Open (or create) an error database on disk
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create error store directory: {}", parent.display())
            })?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("Failed to open error store: {}", path.display()))?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set journal_mode=WAL")?;

        Self::from_connection(connection)
    }

    /// In-memory store (tests and dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Self::from_connection(connection)
    }

    /// Wrap an existing connection, creating the schema if needed
    pub fn from_connection(connection: Connection) -> Result<Self> {
        let store = Self { connection };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.connection
            .execute_batch(&format!(
                "
                CREATE TABLE IF NOT EXISTS {ERRORS_TABLE} (
                  content_id TEXT PRIMARY KEY,
                  citation_content_id TEXT NOT NULL,
                  place_id INTEGER NOT NULL,
                  geography_error TEXT,
                  type_error TEXT,
                  section_error TEXT,
                  date_error TEXT,
                  format_error TEXT,
                  severity INTEGER NOT NULL,
                  error_message TEXT NOT NULL,
                  created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_{ERRORS_TABLE}_place
                  ON {ERRORS_TABLE}(place_id);
                "
            ))
            .context("Failed to create error store schema")
    }

    /// Insert a batch inside one transaction.
    ///
    /// Returns the number of rows actually inserted. On failure the
    /// transaction is rolled back and nothing from the batch is kept.
    pub fn insert_batch(&mut self, records: &[ErrorRecord]) -> rusqlite::Result<usize> {
        let tx = self.connection.transaction()?;

        let inserted = {
            let mut statement = tx.prepare_cached(&format!(
                "
                INSERT OR IGNORE INTO {ERRORS_TABLE}(
                  content_id, citation_content_id, place_id,
                  geography_error, type_error, section_error, date_error, format_error,
                  severity, error_message, created_at
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "
            ))?;

            let mut inserted = 0;
            for record in records {
                let result = statement.execute(params![
                    &record.content_id,
                    &record.citation_content_id,
                    record.place_id,
                    &record.geography_error,
                    &record.type_error,
                    &record.section_error,
                    &record.date_error,
                    &record.format_error,
                    record.severity,
                    &record.error_message,
                    &record.created_at,
                ]);
                match result {
                    Ok(rows) => inserted += rows,
                    Err(err) => {
                        drop(statement);
                        tx.rollback()?;
                        return Err(err);
                    }
                }
            }
            inserted
        };

        tx.commit()?;
        Ok(inserted)
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .connection
            .query_row(&format!("SELECT COUNT(*) FROM {ERRORS_TABLE}"), [], |row| {
                row.get(0)
            })
            .context("Failed to count error records")?;
        Ok(count as usize)
    }

    /// All stored records, oldest first
    pub fn records(&self) -> Result<Vec<ErrorRecord>> {
        let mut statement = self.connection.prepare(&format!(
            "SELECT content_id, citation_content_id, place_id,
                    geography_error, type_error, section_error, date_error, format_error,
                    severity, error_message, created_at
             FROM {ERRORS_TABLE}
             ORDER BY created_at, content_id"
        ))?;

        let records = statement
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read error records")?;
        Ok(records)
    }

    /// Records for one place
    pub fn records_for_place(&self, place_id: i64) -> Result<Vec<ErrorRecord>> {
        let mut statement = self.connection.prepare(&format!(
            "SELECT content_id, citation_content_id, place_id,
                    geography_error, type_error, section_error, date_error, format_error,
                    severity, error_message, created_at
             FROM {ERRORS_TABLE}
             WHERE place_id = ?1
             ORDER BY created_at, content_id"
        ))?;

        let records = statement
            .query_map([place_id], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read error records for place {}", place_id))?;
        Ok(records)
    }

    /// Direct connection access (schema inspection, fault injection in tests)
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ErrorRecord> {
    Ok(ErrorRecord {
        content_id: row.get(0)?,
        citation_content_id: row.get(1)?,
        place_id: row.get(2)?,
        geography_error: row.get(3)?,
        type_error: row.get(4)?,
        section_error: row.get(5)?,
        date_error: row.get(6)?,
        format_error: row.get(7)?,
        severity: row.get(8)?,
        error_message: row.get(9)?,
        created_at: row.get(10)?,
    })
}
