//! Trigger actions and the resolver that derives them from raw event flags.
//!
//! A mutation event reaches the dispatcher as six independent booleans
//! (before/after × insert/update/delete/undelete). Exactly one timing flag and
//! exactly one operation flag must be set; anything else is rejected with
//! [`Error::InvalidActionState`].

use crate::{Error, OperationKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the event fires before or after the mutation is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    Before,
    After,
}

/// The single action a dispatch runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeUndelete,
    AfterUndelete,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Action; 8] = [
        Action::BeforeInsert,
        Action::AfterInsert,
        Action::BeforeUpdate,
        Action::AfterUpdate,
        Action::BeforeDelete,
        Action::AfterDelete,
        Action::BeforeUndelete,
        Action::AfterUndelete,
    ];

    /// Resolves the action from the six raw trigger flags.
    pub fn resolve(
        is_before: bool,
        is_after: bool,
        is_insert: bool,
        is_update: bool,
        is_delete: bool,
        is_undelete: bool,
    ) -> crate::Result<Self> {
        TriggerFlags {
            is_before,
            is_after,
            is_insert,
            is_update,
            is_delete,
            is_undelete,
        }
        .resolve()
    }

    /// Builds an action from its timing and operation parts.
    pub const fn from_parts(timing: Timing, operation: OperationKind) -> Self {
        match (timing, operation) {
            (Timing::Before, OperationKind::Insert) => Action::BeforeInsert,
            (Timing::After, OperationKind::Insert) => Action::AfterInsert,
            (Timing::Before, OperationKind::Update) => Action::BeforeUpdate,
            (Timing::After, OperationKind::Update) => Action::AfterUpdate,
            (Timing::Before, OperationKind::Delete) => Action::BeforeDelete,
            (Timing::After, OperationKind::Delete) => Action::AfterDelete,
            (Timing::Before, OperationKind::Undelete) => Action::BeforeUndelete,
            (Timing::After, OperationKind::Undelete) => Action::AfterUndelete,
        }
    }

    pub const fn timing(&self) -> Timing {
        match self {
            Action::BeforeInsert
            | Action::BeforeUpdate
            | Action::BeforeDelete
            | Action::BeforeUndelete => Timing::Before,
            _ => Timing::After,
        }
    }

    pub const fn operation(&self) -> OperationKind {
        match self {
            Action::BeforeInsert | Action::AfterInsert => OperationKind::Insert,
            Action::BeforeUpdate | Action::AfterUpdate => OperationKind::Update,
            Action::BeforeDelete | Action::AfterDelete => OperationKind::Delete,
            Action::BeforeUndelete | Action::AfterUndelete => OperationKind::Undelete,
        }
    }

    /// Canonical name, e.g. `"AfterInsert"`. This is the string deferred jobs carry.
    pub const fn name(&self) -> &'static str {
        match self {
            Action::BeforeInsert => "BeforeInsert",
            Action::AfterInsert => "AfterInsert",
            Action::BeforeUpdate => "BeforeUpdate",
            Action::AfterUpdate => "AfterUpdate",
            Action::BeforeDelete => "BeforeDelete",
            Action::AfterDelete => "AfterDelete",
            Action::BeforeUndelete => "BeforeUndelete",
            Action::AfterUndelete => "AfterUndelete",
        }
    }

    /// Records in a `BeforeInsert` event have no identity yet.
    pub const fn records_have_identity(&self) -> bool {
        !matches!(self, Action::BeforeInsert)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownAction(s.to_string()))
    }
}

/// The raw flags a mutation event arrives with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFlags {
    pub is_before: bool,
    pub is_after: bool,
    pub is_insert: bool,
    pub is_update: bool,
    pub is_delete: bool,
    pub is_undelete: bool,
}

impl TriggerFlags {
    /// The flags a well-formed event for `action` would carry.
    pub fn for_action(action: Action) -> Self {
        let operation = action.operation();
        Self {
            is_before: action.timing() == Timing::Before,
            is_after: action.timing() == Timing::After,
            is_insert: operation == OperationKind::Insert,
            is_update: operation == OperationKind::Update,
            is_delete: operation == OperationKind::Delete,
            is_undelete: operation == OperationKind::Undelete,
        }
    }

    /// Maps the flags onto exactly one [`Action`].
    pub fn resolve(&self) -> crate::Result<Action> {
        let timing = match (self.is_before, self.is_after) {
            (true, false) => Timing::Before,
            (false, true) => Timing::After,
            (before, after) => {
                return Err(Error::InvalidActionState(format!(
                    "exactly one of before/after must be set (before={before}, after={after})"
                )));
            }
        };

        let operations = [
            (self.is_insert, OperationKind::Insert),
            (self.is_update, OperationKind::Update),
            (self.is_delete, OperationKind::Delete),
            (self.is_undelete, OperationKind::Undelete),
        ];
        let mut set = operations.iter().filter(|(flag, _)| *flag).map(|(_, op)| *op);
        let operation = match (set.next(), set.next()) {
            (Some(op), None) => op,
            (None, _) => {
                return Err(Error::InvalidActionState(
                    "no operation flag set".to_string(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidActionState(format!(
                    "more than one operation flag set: {self:?}"
                )));
            }
        };

        Ok(Action::from_parts(timing, operation))
    }
}
