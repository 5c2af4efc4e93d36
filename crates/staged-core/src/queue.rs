use std::collections::VecDeque;
use std::fmt;

use crate::NodeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Remove,
}

/// A pending change waiting to reach the output.
///
/// `index` is the position the node occupied (for removals) or now occupies
/// (for insertions) in the child list at the moment the change was observed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MutationEntry {
    pub node: NodeId,
    pub index: usize,
    pub kind: MutationKind,
}

impl MutationEntry {
    pub fn insert(node: NodeId, index: usize) -> Self {
        Self {
            node,
            index,
            kind: MutationKind::Insert,
        }
    }

    pub fn remove(node: NodeId, index: usize) -> Self {
        Self {
            node,
            index,
            kind: MutationKind::Remove,
        }
    }
}

impl fmt::Display for MutationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            MutationKind::Insert => "insert",
            MutationKind::Remove => "remove",
        };
        write!(f, "{kind} node {} at {}", self.node, self.index)
    }
}

/// Append-only FIFO of pending entries. Each entry is popped exactly once.
#[derive(Debug, Default)]
pub struct MutationQueue {
    entries: VecDeque<MutationEntry>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: MutationEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<MutationEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every pending entry, returning how many were discarded.
    pub fn discard(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = &MutationEntry> {
        self.entries.iter()
    }
}
