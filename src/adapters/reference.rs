//! Read-only geographic reference lookups keyed by GNIS place id.
//!
//! The reference database is never written by this crate, so any number of
//! workers may query it at once. The SQLite implementation hands each query
//! its own read-only connection from a small checkout pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params_from_iter, Connection, OpenFlags};
use thiserror::Error;

use crate::domain::PlaceReference;

/// Table holding one row per place
pub const REFERENCE_TABLE: &str = "places";

/// Errors raised by reference lookups
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Reference database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to open reference database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Reference store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only lookup of state and class codes by place id
pub trait ReferenceLookup: Send + Sync {
    /// Look up a single place
    fn lookup(&self, place_id: i64) -> Result<Option<PlaceReference>, ReferenceError>;

    /// Look up many places at once; ids absent from the store are omitted
    fn lookup_batch(
        &self,
        place_ids: &[i64],
    ) -> Result<HashMap<i64, PlaceReference>, ReferenceError> {
        let mut found = HashMap::with_capacity(place_ids.len());
        for &place_id in place_ids {
            if let Some(reference) = self.lookup(place_id)? {
                found.insert(place_id, reference);
            }
        }
        Ok(found)
    }
}

/// Reference table held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryReference {
    places: HashMap<i64, PlaceReference>,
}

impl MemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a place
    pub fn insert(&mut self, place_id: i64, state_code: &str, class_code: &str) {
        self.places
            .insert(place_id, PlaceReference::new(state_code, class_code));
    }

    pub fn with_place(mut self, place_id: i64, state_code: &str, class_code: &str) -> Self {
        self.insert(place_id, state_code, class_code);
        self
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl FromIterator<(i64, PlaceReference)> for MemoryReference {
    fn from_iter<T: IntoIterator<Item = (i64, PlaceReference)>>(iter: T) -> Self {
        Self {
            places: iter.into_iter().collect(),
        }
    }
}

impl ReferenceLookup for MemoryReference {
    fn lookup(&self, place_id: i64) -> Result<Option<PlaceReference>, ReferenceError> {
        Ok(self.places.get(&place_id).cloned())
    }
}

/// SQLite reference database opened read-only
pub struct SqliteReference {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl SqliteReference {
    /// Open the database, verifying it can be read
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref().to_path_buf();
        let connection = Self::connect(&path)?;

        Ok(Self {
            path,
            idle: Mutex::new(vec![connection]),
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path) -> Result<Connection, ReferenceError> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| ReferenceError::Open {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Run `f` on an idle connection, opening a new one when none is free
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, ReferenceError>,
    ) -> Result<T, ReferenceError> {
        let checked_out = self
            .idle
            .lock()
            .map_err(|_| ReferenceError::Unavailable("connection pool poisoned".to_string()))?
            .pop();

        let connection = match checked_out {
            Some(connection) => connection,
            None => Self::connect(&self.path)?,
        };

        let result = f(&connection);

        if let Ok(mut idle) = self.idle.lock() {
            idle.push(connection);
        }

        result
    }
}

impl ReferenceLookup for SqliteReference {
    fn lookup(&self, place_id: i64) -> Result<Option<PlaceReference>, ReferenceError> {
        self.with_connection(|connection| {
            let sql = format!(
                "SELECT state_code, class_code FROM {REFERENCE_TABLE} WHERE gnis = ?1"
            );
            let mut statement = connection.prepare_cached(&sql)?;
            let mut rows = statement.query([place_id])?;

            let found = match rows.next()? {
                Some(row) => Some(PlaceReference {
                    state_code: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    class_code: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                }),
                None => None,
            };
            Ok(found)
        })
    }

    fn lookup_batch(
        &self,
        place_ids: &[i64],
    ) -> Result<HashMap<i64, PlaceReference>, ReferenceError> {
        if place_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_connection(|connection| {
            let placeholders = vec!["?"; place_ids.len()].join(", ");
            let sql = format!(
                "SELECT gnis, state_code, class_code FROM {REFERENCE_TABLE} WHERE gnis IN ({placeholders})"
            );
            let mut statement = connection.prepare(&sql)?;
            let mut rows = statement.query(params_from_iter(place_ids.iter()))?;

            let mut found = HashMap::with_capacity(place_ids.len());
            while let Some(row) = rows.next()? {
                let place_id: i64 = row.get(0)?;
                found.insert(
                    place_id,
                    PlaceReference {
                        state_code: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        class_code: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    },
                );
            }
            Ok(found)
        })
    }
}
