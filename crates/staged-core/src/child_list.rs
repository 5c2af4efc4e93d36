//! Observable ordered list of child nodes.
//!
//! Every mutation funnels through [`ChildList::replace`]. Observers are told
//! about the affected range before the list changes (so they can still read
//! the outgoing nodes) and again afterwards (so they can read the incoming
//! ones).

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::collections::map::HashSet;
use crate::error::ContainerError;
use crate::NodeId;

pub type ObserverId = u64;

type BeforeChange = Box<dyn FnMut(&[NodeId], usize, usize) + 'static>;
type AfterChange = Box<dyn FnMut(&[NodeId], usize, usize, usize) + 'static>;

/// Pair of callbacks invoked around every [`ChildList::replace`].
///
/// `before_change(items, start, removed)` sees the list as it was;
/// `after_change(items, start, removed, added)` sees the list as it is now.
/// Callbacks must not reach back into the list they observe.
pub struct ChildListObserver {
    before_change: BeforeChange,
    after_change: AfterChange,
}

impl ChildListObserver {
    pub fn new(
        before_change: impl FnMut(&[NodeId], usize, usize) + 'static,
        after_change: impl FnMut(&[NodeId], usize, usize, usize) + 'static,
    ) -> Self {
        Self {
            before_change: Box::new(before_change),
            after_change: Box::new(after_change),
        }
    }
}

#[derive(Default)]
pub struct ChildList {
    items: Vec<NodeId>,
    members: HashSet<NodeId>,
    observers: Vec<(ObserverId, ChildListObserver)>,
    next_observer_id: ObserverId,
}

impl ChildList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Result<Self, ContainerError> {
        let mut list = Self::new();
        for node in nodes {
            if !list.members.insert(node) {
                return Err(ContainerError::DuplicateChild { node });
            }
            list.items.push(node);
        }
        Ok(list)
    }

    /// Removes `remove` nodes at `start` and inserts `nodes` in their place.
    ///
    /// Rejected mutations leave the list untouched and notify nobody.
    pub fn replace(
        &mut self,
        start: usize,
        remove: usize,
        nodes: &[NodeId],
    ) -> Result<(), ContainerError> {
        let len = self.items.len();
        let end = start
            .checked_add(remove)
            .filter(|end| *end <= len)
            .ok_or(ContainerError::OutOfBounds { start, remove, len })?;
        self.check_incoming(&self.items[start..end], nodes)?;
        if remove == 0 && nodes.is_empty() {
            return Ok(());
        }

        for (_, observer) in self.observers.iter_mut() {
            (observer.before_change)(&self.items, start, remove);
        }

        for node in self.items.splice(start..end, nodes.iter().copied()) {
            self.members.remove(&node);
        }
        self.members.extend(nodes.iter().copied());

        for (_, observer) in self.observers.iter_mut() {
            (observer.after_change)(&self.items, start, remove, nodes.len());
        }
        Ok(())
    }

    fn check_incoming(&self, outgoing: &[NodeId], incoming: &[NodeId]) -> Result<(), ContainerError> {
        let mut seen = HashSet::default();
        for &node in incoming {
            let kept = self.members.contains(&node) && !outgoing.contains(&node);
            if kept || !seen.insert(node) {
                return Err(ContainerError::DuplicateChild { node });
            }
        }
        Ok(())
    }

    pub fn push(&mut self, node: NodeId) -> Result<(), ContainerError> {
        self.replace(self.items.len(), 0, &[node])
    }

    pub fn insert(&mut self, index: usize, node: NodeId) -> Result<(), ContainerError> {
        self.replace(index, 0, &[node])
    }

    pub fn remove_at(&mut self, index: usize) -> Option<NodeId> {
        let node = self.items.get(index).copied()?;
        self.replace(index, 1, &[]).ok()?;
        Some(node)
    }

    /// Removes `node` if present. Absent nodes are ignored.
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        match self.position(node) {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    pub fn position(&self, node: NodeId) -> Option<usize> {
        if !self.members.contains(&node) {
            return None;
        }
        self.items.iter().position(|&item| item == node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.items.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.items
    }

    pub fn observe(&mut self, observer: ChildListObserver) -> ObserverId {
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl fmt::Debug for ChildList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildList")
            .field("items", &self.items)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Shared handle to a [`ChildList`].
///
/// Containers keep one of these; external code that drives the composition
/// holds clones and mutates through them.
#[derive(Clone, Default, Debug)]
pub struct ChildViews(Rc<RefCell<ChildList>>);

impl ChildViews {
    pub fn new(list: ChildList) -> Self {
        Self(Rc::new(RefCell::new(list)))
    }

    pub fn replace(&self, start: usize, remove: usize, nodes: &[NodeId]) -> Result<(), ContainerError> {
        self.0.borrow_mut().replace(start, remove, nodes)
    }

    pub fn push(&self, node: NodeId) -> Result<(), ContainerError> {
        self.0.borrow_mut().push(node)
    }

    pub fn insert(&self, index: usize, node: NodeId) -> Result<(), ContainerError> {
        self.0.borrow_mut().insert(index, node)
    }

    pub fn remove_at(&self, index: usize) -> Option<NodeId> {
        self.0.borrow_mut().remove_at(index)
    }

    pub fn remove_node(&self, node: NodeId) -> bool {
        self.0.borrow_mut().remove_node(node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.0.borrow().contains(node)
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.0.borrow().get(index)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<NodeId> {
        self.0.borrow().as_slice().to_vec()
    }

    pub fn borrow(&self) -> Ref<'_, ChildList> {
        self.0.borrow()
    }

    pub fn observe(&self, observer: ChildListObserver) -> ObserverId {
        self.0.borrow_mut().observe(observer)
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.0.borrow_mut().unobserve(id)
    }
}
