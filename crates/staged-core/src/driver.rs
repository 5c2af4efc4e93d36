//! Materialization state machine.
//!
//! What it means to insert or remove a child depends on how far the
//! container itself has progressed: before it has any output nothing can be
//! applied, while it only exists as a buffer children are spliced into that
//! buffer, and once it is live on the surface children are attached and torn
//! down there. [`plan`] captures that mapping; [`Effect::perform`] carries it
//! out against an [`OutputTarget`].

use crate::error::MaterializeError;
use crate::NodeId;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MaterializationState {
    /// No output exists yet; the next synchronous pass owns every child.
    #[default]
    Unmaterialized,
    /// Output exists only as an intermediate render buffer.
    Buffered,
    /// Output has been committed to the final surface.
    Materialized,
}

/// Where a child's output goes relative to its siblings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// After every child output already present.
    Append,
    /// Before the container's first child output.
    Prepend,
    /// Immediately after the output of the given sibling.
    After(NodeId),
}

impl Placement {
    fn following(predecessor: Option<NodeId>) -> Self {
        match predecessor {
            Some(node) => Placement::After(node),
            None => Placement::Prepend,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriverOp {
    /// Initial synchronous pass: children arrive in order.
    Append { child: NodeId },
    Insert {
        child: NodeId,
        predecessor: Option<NodeId>,
    },
    Remove { child: NodeId },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to do until the container produces output.
    Deferred,
    /// The operation has no meaning for the current output and is ignored.
    Discard,
    RenderIntoBuffer { child: NodeId, placement: Placement },
    InsertIntoSurface { child: NodeId, placement: Placement },
    DestroyOutput { child: NodeId },
}

pub fn plan(state: MaterializationState, op: DriverOp) -> Effect {
    match (state, op) {
        (MaterializationState::Unmaterialized, _) => Effect::Deferred,
        (MaterializationState::Buffered, DriverOp::Append { child }) => Effect::RenderIntoBuffer {
            child,
            placement: Placement::Append,
        },
        (MaterializationState::Buffered, DriverOp::Insert { child, predecessor }) => {
            Effect::RenderIntoBuffer {
                child,
                placement: Placement::following(predecessor),
            }
        }
        (MaterializationState::Buffered, DriverOp::Remove { .. }) => Effect::Discard,
        (MaterializationState::Materialized, DriverOp::Append { child }) => {
            Effect::InsertIntoSurface {
                child,
                placement: Placement::Append,
            }
        }
        (MaterializationState::Materialized, DriverOp::Insert { child, predecessor }) => {
            Effect::InsertIntoSurface {
                child,
                placement: Placement::following(predecessor),
            }
        }
        (MaterializationState::Materialized, DriverOp::Remove { child }) => {
            Effect::DestroyOutput { child }
        }
    }
}

impl Effect {
    pub fn perform(
        self,
        parent: NodeId,
        target: &mut dyn OutputTarget,
    ) -> Result<(), MaterializeError> {
        match self {
            Effect::Deferred | Effect::Discard => Ok(()),
            Effect::RenderIntoBuffer { child, placement } => {
                target.render_into_buffer(parent, child, placement)
            }
            Effect::InsertIntoSurface { child, placement } => {
                target.insert_into_surface(parent, child, placement)
            }
            Effect::DestroyOutput { child } => target.destroy_output(child),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Effect::Deferred | Effect::Discard)
    }
}

/// Host-side output representation that child effects are applied to.
pub trait OutputTarget {
    /// Render `child` into `parent`'s pending buffer at `placement`.
    fn render_into_buffer(
        &mut self,
        parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError>;

    /// Create `child`'s live output and attach it under `parent` at `placement`.
    fn insert_into_surface(
        &mut self,
        parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError>;

    /// Tear down `child`'s live output, including everything it owns.
    fn destroy_output(&mut self, child: NodeId) -> Result<(), MaterializeError>;
}

impl<T: OutputTarget + ?Sized> OutputTarget for Box<T> {
    fn render_into_buffer(
        &mut self,
        parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        (**self).render_into_buffer(parent, child, placement)
    }

    fn insert_into_surface(
        &mut self,
        parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        (**self).insert_into_surface(parent, child, placement)
    }

    fn destroy_output(&mut self, child: NodeId) -> Result<(), MaterializeError> {
        (**self).destroy_output(child)
    }
}
