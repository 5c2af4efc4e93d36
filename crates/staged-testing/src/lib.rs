//! Testing utilities for staged containers.
//!
//! Everything here is deterministic: time only moves when a test advances
//! the [`ManualClock`], and scheduled ticks only run when the test drives
//! the [`ManualScheduler`].

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use staged_core::{
        ContainerConfig, ContainerError, ContainerNode, MaterializationState, MutationEntry,
        NodeId, Runtime,
    };
}
