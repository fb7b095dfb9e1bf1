use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use triggerflow_types::{EntityId, OperationKind};

/// Outcome of writing one record during a batched write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Position of the record within its kind's sequence.
    pub index: usize,
    /// Identity of the record; assigned by the store for inserts.
    pub id: Option<EntityId>,
    /// Failure reason, `None` on success.
    pub error: Option<String>,
}

impl WriteResult {
    pub fn success(index: usize, id: EntityId) -> Self {
        Self {
            index,
            id: Some(id),
            error: None,
        }
    }

    pub fn failure(index: usize, id: Option<EntityId>, error: impl Into<String>) -> Self {
        Self {
            index,
            id,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Structured capture of one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Where the failure was caught, e.g. `"dispatch:account:AfterUpdate"`.
    pub context: String,
    pub message: String,
    /// Rendered error source chain.
    pub trace: String,
    /// Index of the failed record within its kind, for write failures.
    pub record_index: Option<usize>,
    pub entity_id: Option<EntityId>,
    pub operation: Option<OperationKind>,
    /// Unix millis.
    pub created_at: i64,
}

impl ErrorRecord {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            trace: String::new(),
            record_index: None,
            entity_id: None,
            operation: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Captures a raised error together with its source chain.
    pub fn from_error(context: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = write!(trace, "\ncaused by: {cause}");
            source = cause.source();
        }
        Self {
            trace,
            ..Self::new(context, err.to_string())
        }
    }

    /// Captures a failed per-record write.
    pub fn from_write_failure(context: impl Into<String>, kind: OperationKind, result: &WriteResult) -> Self {
        let message = result.error.clone().unwrap_or_else(|| "unknown write failure".to_string());
        Self {
            trace: format!("{kind} failed for record {}: {message}", result.index),
            record_index: Some(result.index),
            entity_id: result.id,
            operation: Some(kind),
            ..Self::new(context, message)
        }
    }
}

/// All per-record failures from one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Errors {
    pub records: Vec<ErrorRecord>,
    pub errors_exist: bool,
}

impl Errors {
    pub fn from_records(records: Vec<ErrorRecord>) -> Self {
        Self {
            errors_exist: !records.is_empty(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl std::fmt::Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} record(s) failed", self.records.len())?;
        if let Some(first) = self.records.first() {
            write!(f, ": {}", first.message)?;
        }
        Ok(())
    }
}
