//! Connection ownership and explicit units of work.

use crate::error::StorageResult;
use rusqlite::{Connection, Savepoint};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// The entity database: entities plus the error log.
///
/// The connection sits behind a mutex; a dispatch holds the guard for its
/// whole lifetime, so one dispatch never shares its rollback point with
/// another.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection.
    ///
    /// A poisoned lock is recovered: the connection itself stays valid and
    /// any savepoint left open by the panicking holder was rolled back on drop.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("database mutex poisoned, recovering connection");
            poisoned.into_inner()
        })
    }
}

fn init_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL CHECK (length(entity_type) > 0),
            data TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            modified_at INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);

        CREATE TABLE IF NOT EXISTS error_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            context TEXT NOT NULL,
            message TEXT NOT NULL,
            trace TEXT NOT NULL,
            record_index INTEGER,
            entity_id TEXT,
            operation TEXT,
            created_at INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// One all-or-nothing boundary, backed by a SQLite savepoint.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls it
/// back. [`UnitOfWork::rollback`] discards the work done so far but leaves
/// the boundary open, so follow-up writes (such as error records) can still
/// be committed through it.
pub struct UnitOfWork<'c> {
    savepoint: Savepoint<'c>,
    label: String,
}

impl<'c> UnitOfWork<'c> {
    /// Opens a top-level unit of work on a locked connection.
    pub fn begin(conn: &'c mut Connection, label: impl Into<String>) -> StorageResult<Self> {
        let label = label.into();
        let savepoint = conn.savepoint()?;
        debug!(label = %label, "unit of work opened");
        Ok(Self { savepoint, label })
    }

    /// Opens a nested boundary inside this one.
    pub fn nested(&mut self, label: impl Into<String>) -> StorageResult<UnitOfWork<'_>> {
        let label = label.into();
        let savepoint = self.savepoint.savepoint()?;
        debug!(parent = %self.label, label = %label, "nested unit of work opened");
        Ok(UnitOfWork { savepoint, label })
    }

    /// The connection all work inside this boundary must go through.
    pub fn connection(&self) -> &Connection {
        &self.savepoint
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Releases the boundary, keeping its writes.
    pub fn commit(self) -> StorageResult<()> {
        let label = self.label;
        self.savepoint.commit()?;
        debug!(label = %label, "unit of work committed");
        Ok(())
    }

    /// Undoes everything written since the boundary was opened.
    pub fn rollback(&mut self) -> StorageResult<()> {
        self.savepoint.rollback()?;
        debug!(label = %self.label, "unit of work rolled back");
        Ok(())
    }
}
