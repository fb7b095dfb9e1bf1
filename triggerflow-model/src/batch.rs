use crate::Entity;
use serde::{Deserialize, Serialize};
use triggerflow_types::OperationKind;

/// Proposed writes collected from handlers during one dispatch.
///
/// Four append-only sequences, one per [`OperationKind`]. Nothing is
/// deduplicated; within each kind records keep the order they were
/// appended in. A batch is merged into the dispatch aggregate and consumed
/// once by the committer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    inserts: Vec<Entity>,
    updates: Vec<Entity>,
    deletes: Vec<Entity>,
    undeletes: Vec<Entity>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `records` to the sequence for `kind`.
    pub fn append(&mut self, kind: OperationKind, records: impl IntoIterator<Item = Entity>) -> &mut Self {
        self.slot_mut(kind).extend(records);
        self
    }

    pub fn insert(&mut self, record: Entity) -> &mut Self {
        self.append(OperationKind::Insert, [record])
    }

    pub fn update(&mut self, record: Entity) -> &mut Self {
        self.append(OperationKind::Update, [record])
    }

    pub fn delete(&mut self, record: Entity) -> &mut Self {
        self.append(OperationKind::Delete, [record])
    }

    pub fn undelete(&mut self, record: Entity) -> &mut Self {
        self.append(OperationKind::Undelete, [record])
    }

    /// Records proposed for `kind`, in submission order.
    pub fn records(&self, kind: OperationKind) -> &[Entity] {
        match kind {
            OperationKind::Insert => &self.inserts,
            OperationKind::Update => &self.updates,
            OperationKind::Delete => &self.deletes,
            OperationKind::Undelete => &self.undeletes,
        }
    }

    fn slot_mut(&mut self, kind: OperationKind) -> &mut Vec<Entity> {
        match kind {
            OperationKind::Insert => &mut self.inserts,
            OperationKind::Update => &mut self.updates,
            OperationKind::Delete => &mut self.deletes,
            OperationKind::Undelete => &mut self.undeletes,
        }
    }

    /// Appends every sequence of `other` after this batch's entries.
    pub fn merge(&mut self, other: WriteBatch) -> &mut Self {
        let WriteBatch {
            inserts,
            updates,
            deletes,
            undeletes,
        } = other;
        self.inserts.extend(inserts);
        self.updates.extend(updates);
        self.deletes.extend(deletes);
        self.undeletes.extend(undeletes);
        self
    }

    /// Non-empty groups in commit order.
    ///
    /// Read-only: grouping twice yields the same groups and leaves the batch
    /// untouched.
    pub fn group_by_type(&self) -> Vec<(OperationKind, &[Entity])> {
        OperationKind::ORDERED
            .into_iter()
            .map(|kind| (kind, self.records(kind)))
            .filter(|(_, records)| !records.is_empty())
            .collect()
    }

    /// Consumes the batch into its four sequences, in commit order.
    pub fn into_groups(self) -> [(OperationKind, Vec<Entity>); 4] {
        [
            (OperationKind::Insert, self.inserts),
            (OperationKind::Update, self.updates),
            (OperationKind::Delete, self.deletes),
            (OperationKind::Undelete, self.undeletes),
        ]
    }

    /// Total number of proposed writes across all kinds.
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len() + self.undeletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positions (kind, index) of records that break the identity rule:
    /// inserts must not carry an id, every other kind must.
    pub fn identity_violations(&self) -> Vec<(OperationKind, usize)> {
        OperationKind::ORDERED
            .into_iter()
            .flat_map(move |kind| {
                let needs_id = kind != OperationKind::Insert;
                self.records(kind)
                    .iter()
                    .enumerate()
                    .filter(move |(_, record)| record.id.is_some() != needs_id)
                    .map(move |(index, _)| (kind, index))
            })
            .collect()
    }
}
