//! Buffered writes.

use crate::entity::{ErasedRef, ObjectIdentity};
use std::collections::HashMap;

/// Kind of a queued write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// Insert a new object.
    Persist,
    /// Insert or update.
    Upsert,
    /// Remove.
    Delete,
}

/// A write waiting for the next flush.
#[derive(Debug, Clone)]
pub enum WriteOperation {
    /// Insert a newly created object.
    Persist(ErasedRef),
    /// Insert or update an object.
    Upsert(ErasedRef),
    /// Remove an object.
    Delete(ErasedRef),
}

impl WriteOperation {
    /// Builds an operation of `kind` on `target`.
    #[must_use]
    pub fn new(kind: WriteKind, target: ErasedRef) -> Self {
        match kind {
            WriteKind::Persist => Self::Persist(target),
            WriteKind::Upsert => Self::Upsert(target),
            WriteKind::Delete => Self::Delete(target),
        }
    }

    /// The operation kind.
    #[must_use]
    pub fn kind(&self) -> WriteKind {
        match self {
            Self::Persist(_) => WriteKind::Persist,
            Self::Upsert(_) => WriteKind::Upsert,
            Self::Delete(_) => WriteKind::Delete,
        }
    }

    /// The object the operation applies to.
    #[must_use]
    pub fn target(&self) -> &ErasedRef {
        match self {
            Self::Persist(target) | Self::Upsert(target) | Self::Delete(target) => target,
        }
    }
}

/// Insertion-ordered writes with one slot per object identity.
///
/// The first write for an object fixes its position. A later write of a
/// different kind replaces the operation in that slot.
#[derive(Debug, Default)]
pub struct WriteQueue {
    slots: Vec<WriteOperation>,
    index: HashMap<ObjectIdentity, usize>,
}

impl WriteQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `op`. Returns false if an identical write was already queued.
    pub fn push(&mut self, op: WriteOperation) -> bool {
        let identity = op.target().identity();
        match self.index.get(&identity) {
            Some(&slot) if self.slots[slot].kind() == op.kind() => false,
            Some(&slot) => {
                self.slots[slot] = op;
                true
            }
            None => {
                self.index.insert(identity, self.slots.len());
                self.slots.push(op);
                true
            }
        }
    }

    /// Removes every queued write, in queue order.
    pub fn drain(&mut self) -> Vec<WriteOperation> {
        self.index.clear();
        std::mem::take(&mut self.slots)
    }

    /// Queued writes in order.
    pub fn iter(&self) -> impl Iterator<Item = &WriteOperation> {
        self.slots.iter()
    }

    /// Number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
