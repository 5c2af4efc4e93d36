use std::fmt;

use crate::queue::MutationEntry;
use crate::NodeId;

/// Failure reported by an [`OutputTarget`](crate::OutputTarget) operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    /// The target has no representation for `node` (the child itself or an anchor).
    Missing { node: NodeId },
    /// The target refused the operation.
    Rejected { node: NodeId, reason: String },
}

impl fmt::Display for MaterializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterializeError::Missing { node } => write!(f, "no output for node {node}"),
            MaterializeError::Rejected { node, reason } => {
                write!(f, "output for node {node} rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for MaterializeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// A named initial child did not resolve against the container's properties.
    InvalidChildReference { name: String },
    /// The node is already part of the child list.
    DuplicateChild { node: NodeId },
    /// A replace range does not fit the child list.
    OutOfBounds {
        start: usize,
        remove: usize,
        len: usize,
    },
    /// The output target failed while applying `entry`.
    Materialization {
        entry: MutationEntry,
        source: MaterializeError,
    },
    /// `entry` no longer lines up with the materialized children.
    StaleEntry { entry: MutationEntry },
    AlreadyMaterialized,
    /// `commit` was called before the container produced any output.
    NothingToCommit,
    Destroyed,
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::InvalidChildReference { name } => {
                write!(f, "child reference `{name}` does not resolve")
            }
            ContainerError::DuplicateChild { node } => {
                write!(f, "node {node} is already a child")
            }
            ContainerError::OutOfBounds { start, remove, len } => write!(
                f,
                "replace of {remove} at {start} is out of bounds for {len} children"
            ),
            ContainerError::Materialization { entry, source } => {
                write!(f, "failed to {entry}: {source}")
            }
            ContainerError::StaleEntry { entry } => {
                write!(f, "stale entry: {entry}")
            }
            ContainerError::AlreadyMaterialized => write!(f, "container already materialized"),
            ContainerError::NothingToCommit => write!(f, "container has no output to commit"),
            ContainerError::Destroyed => write!(f, "container destroyed"),
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContainerError::Materialization { source, .. } => Some(source),
            _ => None,
        }
    }
}
