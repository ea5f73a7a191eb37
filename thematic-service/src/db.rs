//! Database module for SQLite operations.
//!
//! This module provides the `Database` struct and all database operations
//! organized into submodules by domain.

mod documents;
pub mod migrations;
pub mod models;
mod projects;
#[cfg(test)]
mod quotes;

pub use models::{Document, DocumentChanges, DocumentType, NewDocumentRecord, Project, User};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path and bring it to head
    pub fn open(path: &Path) -> ServiceResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ServiceError::Storage)?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(DatabaseError::Query)?;

        Self::prepare(conn)
    }

    /// Open a private in-memory database at head
    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> ServiceResult<Self> {
        // Table rebuilds in the revision chain require enforcement to be off
        conn.execute_batch("PRAGMA foreign_keys=OFF;")
            .map_err(DatabaseError::Query)?;

        let applied = migrations::upgrade(&conn, None)?;
        if !applied.is_empty() {
            info!(revisions = ?applied, "Applied schema revisions");
        }

        let violations = foreign_key_violations(&conn)?;
        if violations > 0 {
            warn!(violations, "Foreign key check reported violations after migration");
        }

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn foreign_key_violations(conn: &Connection) -> ServiceResult<usize> {
    let mut stmt = conn
        .prepare("PRAGMA foreign_key_check")
        .map_err(DatabaseError::Query)?;
    let mut rows = stmt.query([]).map_err(DatabaseError::Query)?;

    let mut count = 0;
    while rows.next().map_err(DatabaseError::Query)?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Current time in the format stored in timestamp columns
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
