#![doc = r"Time-sliced materialization of container children.

A [`ContainerNode`] owns an observable [`ChildList`]. Every change to that
list is translated into [`MutationEntry`]s which are applied to an
[`OutputTarget`] in bounded slices on host-scheduled ticks, keeping
[`ContainerNode::materialized_children`] eventually consistent with the list
without ever blocking the caller for long."]

pub mod child_list;
pub mod collections;
pub mod config;
pub mod container;
pub mod driver;
pub mod error;
pub mod platform;
pub mod queue;
pub mod runtime;
pub mod ticker;

pub use child_list::{ChildList, ChildListObserver, ChildViews, ObserverId};
pub use config::{ContainerConfig, DEFAULT_BUDGET_MS};
pub use container::{ChildRef, ContainerBuilder, ContainerNode, ParentLifecycle};
pub use driver::{plan, DriverOp, Effect, MaterializationState, OutputTarget, Placement};
pub use error::{ContainerError, MaterializeError};
pub use platform::{Clock, RuntimeScheduler, TaskId};
pub use queue::{MutationEntry, MutationKind, MutationQueue};
pub use runtime::{DefaultScheduler, Runtime};
pub use ticker::{Budget, SliceReport, TickScheduler};

pub type NodeId = usize;

#[cfg(test)]
#[path = "tests/child_list_tests.rs"]
mod child_list_tests;

#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod driver_tests;

#[cfg(test)]
#[path = "tests/container_tests.rs"]
mod container_tests;
