//! Ordered handler configuration.
//!
//! Uses a separate SQLite file so configuration data is isolated from
//! entity writes and their rollback points.

use crate::error::{StorageError, StorageResult};
use rusqlite::{Connection, TransactionBehavior, params};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use triggerflow_model::HandlerDescriptor;
use triggerflow_types::Action;

/// Updates the row in place so its id, and with it its order, survives.
const ON_CONFLICT_UPDATE: &str = "DO UPDATE SET actions = excluded.actions, rank = excluded.rank, \
     asynchronous = excluded.asynchronous, active = excluded.active";

/// Persistent store of handler descriptors.
///
/// Owns the default descriptors and the "defaults seeded" flag, so the
/// dispatcher never tracks seeding state itself.
pub struct HandlerConfigStore {
    conn: Mutex<Connection>,
    defaults: Vec<HandlerDescriptor>,
    seed_checked: AtomicBool,
}

impl HandlerConfigStore {
    /// Opens (or creates) a handler configuration store at the given path.
    pub fn open(path: impl AsRef<Path>, defaults: Vec<HandlerDescriptor>) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path.as_ref())?, defaults)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory(defaults: Vec<HandlerDescriptor>) -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, defaults)
    }

    fn with_connection(conn: Connection, defaults: Vec<HandlerDescriptor>) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS handler_config (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                class_identifier TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                actions TEXT NOT NULL,
                rank INTEGER NOT NULL DEFAULT 0,
                asynchronous INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                UNIQUE(class_identifier, entity_type)
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            defaults,
            seed_checked: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Saves a descriptor, replacing any existing one for the same
    /// handler and entity type. An edited descriptor keeps its place among
    /// handlers of equal rank.
    pub fn save(&self, descriptor: &HandlerDescriptor) -> StorageResult<()> {
        let conn = self.lock();
        Self::write(&conn, descriptor, ON_CONFLICT_UPDATE)
    }

    fn write(conn: &Connection, descriptor: &HandlerDescriptor, on_conflict: &str) -> StorageResult<()> {
        let actions: Vec<&str> = descriptor.actions.iter().map(Action::name).collect();
        conn.execute(
            &format!(
                "INSERT INTO handler_config (class_identifier, entity_type, actions, rank, asynchronous, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(class_identifier, entity_type) {on_conflict}"
            ),
            params![
                descriptor.class_identifier,
                descriptor.entity_type,
                serde_json::to_string(&actions)?,
                descriptor.rank,
                descriptor.asynchronous,
                descriptor.active,
            ],
        )?;
        Ok(())
    }

    /// Removes a descriptor. Returns true if one existed.
    pub fn remove(&self, class_identifier: &str, entity_type: &str) -> StorageResult<bool> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM handler_config WHERE class_identifier = ?1 AND entity_type = ?2",
            params![class_identifier, entity_type],
        )?;
        Ok(removed > 0)
    }

    pub fn count(&self) -> StorageResult<usize> {
        let conn = self.lock();
        Self::count_rows(&conn)
    }

    fn count_rows(conn: &Connection) -> StorageResult<usize> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM handler_config", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.count()? == 0)
    }

    /// Every descriptor, in execution order.
    pub fn all(&self) -> StorageResult<Vec<HandlerDescriptor>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT class_identifier, entity_type, actions, rank, asynchronous, active
             FROM handler_config ORDER BY rank, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;

        let mut descriptors = Vec::new();
        for row in rows {
            let (class_identifier, entity_type, actions, rank, asynchronous, active) = row?;
            let names: Vec<String> = serde_json::from_str(&actions)?;
            let actions = names
                .iter()
                .map(|name| name.parse::<Action>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::corrupt("handler_config", format!("handler '{class_identifier}': {e}")))?;
            descriptors.push(HandlerDescriptor {
                class_identifier,
                entity_type,
                actions,
                rank,
                asynchronous,
                active,
            });
        }
        Ok(descriptors)
    }

    /// Active descriptors for one entity type and action, in execution order
    /// (rank ascending, then insertion order).
    pub fn handlers_for(&self, entity_type: &str, action: Action) -> StorageResult<Vec<HandlerDescriptor>> {
        let handlers: Vec<_> = self
            .all()?
            .into_iter()
            .filter(|d| d.applies_to(entity_type, action))
            .collect();
        debug!(entity_type, %action, count = handlers.len(), "loaded handler configuration");
        Ok(handlers)
    }

    /// Inserts the default descriptors if the store is empty.
    ///
    /// Only the first call per store does any work. The emptiness check and
    /// the inserts share one immediate transaction, so two processes seeding
    /// the same file cannot both see an empty table. Returns true if this
    /// call inserted the defaults.
    pub fn seed_defaults_if_empty(&self) -> StorageResult<bool> {
        if self.seed_checked.load(Ordering::Acquire) {
            return Ok(false);
        }
        let mut conn = self.lock();
        // Re-check under the lock; another thread may have seeded meanwhile.
        if self.seed_checked.load(Ordering::Acquire) {
            return Ok(false);
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let seeded = if Self::count_rows(&tx)? == 0 && !self.defaults.is_empty() {
            for descriptor in &self.defaults {
                Self::write(&tx, descriptor, "DO NOTHING")?;
            }
            true
        } else {
            false
        };
        tx.commit()?;
        self.seed_checked.store(true, Ordering::Release);

        if seeded {
            info!(count = self.defaults.len(), "seeded default handler configuration");
        }
        Ok(seeded)
    }
}
