//! Persistent audit trail of captured dispatch failures.

use crate::error::{StorageError, StorageResult};
use rusqlite::{Connection, params};
use triggerflow_model::ErrorRecord;
use triggerflow_types::{EntityId, OperationKind};

/// Error record persistence over a borrowed connection.
pub struct ErrorLog<'a> {
    conn: &'a Connection,
}

impl<'a> ErrorLog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Saves one record, returning its row id.
    pub fn append(&self, record: &ErrorRecord) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO error_log (context, message, trace, record_index, entity_id, operation, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.context,
                record.message,
                record.trace,
                record.record_index.map(|i| i as i64),
                record.entity_id.map(|id| id.to_string()),
                record.operation.map(|op| op.as_str()),
                record.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn append_all(&self, records: &[ErrorRecord]) -> StorageResult<()> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Loads records, newest first.
    pub fn list(&self, limit: usize, offset: usize) -> StorageResult<Vec<ErrorRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT context, message, trace, record_index, entity_id, operation, created_at
             FROM error_log ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            let context: String = row.get(0)?;
            let message: String = row.get(1)?;
            let trace: String = row.get(2)?;
            let record_index: Option<i64> = row.get(3)?;
            let entity_id: Option<String> = row.get(4)?;
            let operation: Option<String> = row.get(5)?;
            let created_at: i64 = row.get(6)?;
            Ok((context, message, trace, record_index, entity_id, operation, created_at))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (context, message, trace, record_index, entity_id, operation, created_at) = row?;
            let entity_id = entity_id
                .map(|s| {
                    EntityId::parse(&s)
                        .map_err(|e| StorageError::corrupt("error_log", format!("entity_id {s}: {e}")))
                })
                .transpose()?;
            let operation = operation
                .map(|s| s.parse::<OperationKind>())
                .transpose()
                .map_err(|e| StorageError::corrupt("error_log", e))?;
            records.push(ErrorRecord {
                context,
                message,
                trace,
                record_index: record_index.map(|i| i as usize),
                entity_id,
                operation,
                created_at,
            });
        }
        Ok(records)
    }

    /// Returns the total number of error log entries.
    pub fn count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM error_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
