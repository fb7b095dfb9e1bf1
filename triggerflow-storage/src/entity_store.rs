//! Best-effort batched entity writes.
//!
//! Every record in a batch is attempted. A record that cannot be written
//! yields a failed [`WriteResult`] and the remaining records carry on; only
//! a failure to talk to the database at all aborts the call.

use crate::error::{StorageError, StorageResult};
use crate::now_millis;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use triggerflow_model::{Entity, WriteResult};
use triggerflow_types::{EntityId, OperationKind};

/// Entity reads and writes over a borrowed connection.
///
/// Borrowing the connection of a [`UnitOfWork`](crate::UnitOfWork) puts
/// every write under that unit's rollback point.
pub struct EntityStore<'a> {
    conn: &'a Connection,
}

impl<'a> EntityStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Writes `records` as `kind`, one result per record in input order.
    pub fn write(&self, kind: OperationKind, records: &[Entity]) -> StorageResult<Vec<WriteResult>> {
        let results = match kind {
            OperationKind::Insert => self.insert_all(records)?,
            OperationKind::Update => self.update_all(records)?,
            OperationKind::Delete => self.delete_all(records)?,
            OperationKind::Undelete => self.undelete_all(records)?,
        };
        debug!(
            kind = %kind,
            attempted = records.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "batched write finished"
        );
        Ok(results)
    }

    /// Inserts records that have no identity yet, assigning a fresh id to each.
    pub fn insert_all(&self, records: &[Entity]) -> StorageResult<Vec<WriteResult>> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO entities (id, entity_type, data, created_at, modified_at, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?4, 0)",
        )?;
        let mut results = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if let Some(id) = record.id {
                results.push(WriteResult::failure(
                    index,
                    Some(id),
                    format!("cannot insert a record that already has an id: {id}"),
                ));
                continue;
            }
            let id = EntityId::new();
            let data = serde_json::to_string(&record.data)?;
            let outcome = stmt.execute(params![id.to_string(), record.entity_type, data, now_millis()]);
            results.push(match outcome {
                Ok(_) => WriteResult::success(index, id),
                Err(e) => WriteResult::failure(index, None, e.to_string()),
            });
        }
        Ok(results)
    }

    /// Replaces type and payload of live records.
    pub fn update_all(&self, records: &[Entity]) -> StorageResult<Vec<WriteResult>> {
        let mut stmt = self.conn.prepare(
            "UPDATE entities SET entity_type = ?2, data = ?3, modified_at = ?4
             WHERE id = ?1 AND is_deleted = 0",
        )?;
        let mut results = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let Some(id) = record.id else {
                results.push(WriteResult::failure(index, None, "cannot update a record without an id"));
                continue;
            };
            let data = serde_json::to_string(&record.data)?;
            let outcome = stmt.execute(params![id.to_string(), record.entity_type, data, now_millis()]);
            results.push(Self::expect_one_row(index, id, outcome, "entity not found or deleted"));
        }
        Ok(results)
    }

    /// Soft-deletes live records.
    pub fn delete_all(&self, records: &[Entity]) -> StorageResult<Vec<WriteResult>> {
        self.set_deleted(records, true)
    }

    /// Restores soft-deleted records.
    pub fn undelete_all(&self, records: &[Entity]) -> StorageResult<Vec<WriteResult>> {
        self.set_deleted(records, false)
    }

    fn set_deleted(&self, records: &[Entity], deleted: bool) -> StorageResult<Vec<WriteResult>> {
        let mut stmt = self.conn.prepare(
            "UPDATE entities SET is_deleted = ?2, modified_at = ?3
             WHERE id = ?1 AND is_deleted = ?4",
        )?;
        let (verb, missing) = if deleted {
            ("delete", "entity not found or already deleted")
        } else {
            ("undelete", "entity not found or not deleted")
        };
        let mut results = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let Some(id) = record.id else {
                results.push(WriteResult::failure(index, None, format!("cannot {verb} a record without an id")));
                continue;
            };
            let outcome = stmt.execute(params![id.to_string(), deleted, now_millis(), !deleted]);
            results.push(Self::expect_one_row(index, id, outcome, missing));
        }
        Ok(results)
    }

    fn expect_one_row(
        index: usize,
        id: EntityId,
        outcome: rusqlite::Result<usize>,
        missing: &str,
    ) -> WriteResult {
        match outcome {
            Ok(0) => WriteResult::failure(index, Some(id), format!("{missing}: {id}")),
            Ok(_) => WriteResult::success(index, id),
            Err(e) => WriteResult::failure(index, Some(id), e.to_string()),
        }
    }

    /// Loads one record by id, deleted or not.
    pub fn get(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, entity_type, data, created_at, modified_at, is_deleted
                 FROM entities WHERE id = ?1",
                params![id.to_string()],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::into_entity).transpose()
    }

    /// Loads records in the order of `ids`, skipping ids that do not exist.
    pub fn load_many<'i>(&self, ids: impl IntoIterator<Item = &'i EntityId>) -> StorageResult<Vec<Entity>> {
        let mut entities = Vec::new();
        for id in ids {
            if let Some(entity) = self.get(id)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Live records of one type, oldest first.
    pub fn list_by_type(&self, entity_type: &str) -> StorageResult<Vec<Entity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, data, created_at, modified_at, is_deleted
             FROM entities WHERE entity_type = ?1 AND is_deleted = 0
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![entity_type], Self::read_row)?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(Self::into_entity(row?)?);
        }
        Ok(entities)
    }

    /// Number of live records of one type.
    pub fn count(&self, entity_type: &str) -> StorageResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE entity_type = ?1 AND is_deleted = 0",
            params![entity_type],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntity> {
        Ok(RawEntity {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            data: row.get(2)?,
            created_at: row.get(3)?,
            modified_at: row.get(4)?,
            is_deleted: row.get(5)?,
        })
    }

    fn into_entity(raw: RawEntity) -> StorageResult<Entity> {
        let id = EntityId::parse(&raw.id)
            .map_err(|e| StorageError::corrupt("entities", format!("id {}: {e}", raw.id)))?;
        let mut entity = Entity::with_id(id, raw.entity_type, serde_json::from_str(&raw.data)?);
        entity.created_at = raw.created_at;
        entity.modified_at = raw.modified_at;
        entity.is_deleted = raw.is_deleted;
        Ok(entity)
    }
}

struct RawEntity {
    id: String,
    entity_type: String,
    data: String,
    created_at: i64,
    modified_at: i64,
    is_deleted: bool,
}
