//! Container node: keeps an observable child list in step with its output.
//!
//! Changes to the child list are not applied on the spot. The container
//! records them as [`MutationEntry`]s and drains the queue in time-boxed
//! slices on host ticks, so a burst of mutations never blocks the caller for
//! longer than one slice. `materialized_children` always reflects what has
//! actually reached the output and converges to the child list once the queue
//! is empty.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::child_list::{ChildList, ChildListObserver, ChildViews, ObserverId};
use crate::collections::map::HashMap;
use crate::config::ContainerConfig;
use crate::driver::{plan, DriverOp, Effect, MaterializationState, OutputTarget};
use crate::error::ContainerError;
use crate::queue::{MutationEntry, MutationKind, MutationQueue};
use crate::runtime::Runtime;
use crate::ticker::{Budget, SliceReport, TickScheduler};
use crate::NodeId;

/// An initial child, given either directly or by property name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildRef {
    Node(NodeId),
    Named(String),
}

impl From<NodeId> for ChildRef {
    fn from(node: NodeId) -> Self {
        ChildRef::Node(node)
    }
}

impl From<&str> for ChildRef {
    fn from(name: &str) -> Self {
        ChildRef::Named(name.to_owned())
    }
}

impl From<String> for ChildRef {
    fn from(name: String) -> Self {
        ChildRef::Named(name)
    }
}

/// Parent/child bookkeeping owned by whoever creates nodes.
pub trait ParentLifecycle {
    fn adopt(&mut self, parent: NodeId, child: NodeId);
    fn release(&mut self, parent: NodeId, child: NodeId);
}

pub struct ContainerBuilder {
    id: NodeId,
    config: ContainerConfig,
    properties: HashMap<String, NodeId>,
    children: Vec<ChildRef>,
    lifecycle: Option<Box<dyn ParentLifecycle>>,
}

impl ContainerBuilder {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            config: ContainerConfig::default(),
            properties: HashMap::default(),
            children: Vec::new(),
            lifecycle: None,
        }
    }

    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers `node` under `name` so children can refer to it by name.
    pub fn property(mut self, name: impl Into<String>, node: NodeId) -> Self {
        self.properties.insert(name.into(), node);
        self
    }

    pub fn child(mut self, child: impl Into<ChildRef>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ChildRef>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn lifecycle(mut self, lifecycle: impl ParentLifecycle + 'static) -> Self {
        self.lifecycle = Some(Box::new(lifecycle));
        self
    }

    pub fn build(self, runtime: &Runtime) -> Result<ContainerNode, ContainerError> {
        let ContainerBuilder {
            id,
            config,
            properties,
            children,
            mut lifecycle,
        } = self;

        let mut resolved = Vec::with_capacity(children.len());
        for child in children {
            let node = match child {
                ChildRef::Node(node) => node,
                ChildRef::Named(name) => properties
                    .get(&name)
                    .copied()
                    .ok_or(ContainerError::InvalidChildReference { name })?,
            };
            resolved.push(node);
        }
        let list = ChildList::from_nodes(resolved)?;

        if let Some(lifecycle) = lifecycle.as_mut() {
            for &child in list.as_slice() {
                lifecycle.adopt(id, child);
            }
        }

        let inner = Rc::new(ContainerInner {
            id,
            config,
            runtime: runtime.clone(),
            properties,
            children: ChildViews::new(list),
            observer: Cell::new(None),
            materialized: RefCell::new(Vec::new()),
            queue: RefCell::new(MutationQueue::new()),
            ticker: RefCell::new(TickScheduler::new()),
            state: Cell::new(MaterializationState::Unmaterialized),
            target: RefCell::new(None),
            lifecycle: RefCell::new(lifecycle),
            failures: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        });
        ContainerInner::register_observer(&inner);
        log::debug!(
            "container {id}: created with {} children",
            inner.children.len()
        );
        Ok(ContainerNode { inner })
    }
}

struct ContainerInner {
    id: NodeId,
    config: ContainerConfig,
    runtime: Runtime,
    properties: HashMap<String, NodeId>,
    children: ChildViews,
    observer: Cell<Option<ObserverId>>,
    materialized: RefCell<Vec<NodeId>>,
    queue: RefCell<MutationQueue>,
    ticker: RefCell<TickScheduler>,
    state: Cell<MaterializationState>,
    target: RefCell<Option<Box<dyn OutputTarget>>>,
    lifecycle: RefCell<Option<Box<dyn ParentLifecycle>>>,
    failures: RefCell<Vec<ContainerError>>,
    destroyed: Cell<bool>,
}

impl ContainerInner {
    fn register_observer(this: &Rc<Self>) {
        let before = Rc::downgrade(this);
        let after = Rc::downgrade(this);
        let observer = ChildListObserver::new(
            move |items, start, removed| {
                if let Some(inner) = before.upgrade() {
                    inner.children_will_change(items, start, removed);
                }
            },
            move |items, start, removed, added| {
                if let Some(inner) = after.upgrade() {
                    inner.children_did_change(items, start, removed, added);
                }
            },
        );
        let id = this.children.observe(observer);
        this.observer.set(Some(id));
    }

    /// Before the first synchronous pass nothing is queued: that pass reads
    /// the child list as it stands.
    fn accepts_mutations(&self) -> bool {
        !self.destroyed.get() && self.state.get() != MaterializationState::Unmaterialized
    }

    fn children_will_change(self: &Rc<Self>, items: &[NodeId], start: usize, removed: usize) {
        if removed == 0 {
            return;
        }
        if !self.accepts_mutations() {
            log::trace!(
                "container {}: not materialized, ignoring removal of {removed} at {start}",
                self.id
            );
            return;
        }
        {
            let mut queue = self.queue.borrow_mut();
            for (index, &node) in items.iter().enumerate().skip(start).take(removed) {
                queue.push(MutationEntry::remove(node, index));
            }
        }
        self.request_schedule();
    }

    fn children_did_change(
        self: &Rc<Self>,
        items: &[NodeId],
        start: usize,
        _removed: usize,
        added: usize,
    ) {
        if added == 0 {
            return;
        }
        if !self.accepts_mutations() {
            log::trace!(
                "container {}: not materialized, ignoring insertion of {added} at {start}",
                self.id
            );
            return;
        }
        {
            let mut queue = self.queue.borrow_mut();
            for (index, &node) in items.iter().enumerate().skip(start).take(added) {
                queue.push(MutationEntry::insert(node, index));
            }
        }
        self.request_schedule();
    }

    fn request_schedule(self: &Rc<Self>) {
        if self.destroyed.get() {
            return;
        }
        let weak = Rc::downgrade(self);
        let armed = self.ticker.borrow_mut().request(
            &self.runtime,
            self.config.tick_delay_ms,
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.run_scheduled_slice();
                }
            },
        );
        if armed {
            log::debug!(
                "container {}: tick armed in {}ms, {} pending",
                self.id,
                self.config.tick_delay_ms,
                self.queue.borrow().len()
            );
        }
    }

    fn run_scheduled_slice(self: &Rc<Self>) {
        if self.destroyed.get() {
            return;
        }
        if let Err(err) = self.process_slice() {
            log::error!("container {}: {err}", self.id);
            self.failures.borrow_mut().push(err);
        }
    }

    fn process_slice(self: &Rc<Self>) -> Result<SliceReport, ContainerError> {
        if self.destroyed.get() {
            return Err(ContainerError::Destroyed);
        }
        // Whatever was armed is either running now or superseded by this slice.
        self.ticker.borrow_mut().cancel(&self.runtime);

        let clock = self.runtime.clock().clone();
        let budget = Budget::start(clock.as_ref(), self.config.slice_budget_ms);
        let mut applied = 0;
        let mut outcome = Ok(());
        loop {
            let Some(entry) = self.queue.borrow_mut().pop() else {
                break;
            };
            if let Err(err) = self.apply(entry) {
                outcome = Err(err);
                break;
            }
            applied += 1;
            if budget.exhausted(clock.as_ref()) {
                break;
            }
        }

        let remaining = self.queue.borrow().len();
        if remaining > 0 {
            self.request_schedule();
        }
        let elapsed_ms = budget.elapsed(clock.as_ref());
        log::debug!(
            "container {}: slice applied {applied} in {elapsed_ms}ms, {remaining} remaining",
            self.id
        );
        outcome.map(|()| SliceReport {
            applied,
            remaining,
            elapsed_ms,
        })
    }

    fn apply(&self, entry: MutationEntry) -> Result<(), ContainerError> {
        match entry.kind {
            MutationKind::Insert => self.apply_insert(entry),
            MutationKind::Remove => self.apply_remove(entry),
        }
    }

    fn apply_insert(&self, entry: MutationEntry) -> Result<(), ContainerError> {
        let (index, predecessor) = {
            let materialized = self.materialized.borrow();
            if materialized.contains(&entry.node) {
                return Err(ContainerError::StaleEntry { entry });
            }
            let index = if entry.index > materialized.len() {
                log::warn!(
                    "container {}: {entry} is past the end of {} materialized children",
                    self.id,
                    materialized.len()
                );
                materialized.len()
            } else {
                entry.index
            };
            let predecessor = index
                .checked_sub(1)
                .and_then(|prev| materialized.get(prev).copied());
            (index, predecessor)
        };
        let effect = plan(
            self.state.get(),
            DriverOp::Insert {
                child: entry.node,
                predecessor,
            },
        );
        self.perform(effect, entry)?;

        let mut materialized = self.materialized.borrow_mut();
        let index = index.min(materialized.len());
        materialized.insert(index, entry.node);
        log::trace!("container {}: applied {entry}", self.id);
        Ok(())
    }

    fn apply_remove(&self, entry: MutationEntry) -> Result<(), ContainerError> {
        let located = {
            let materialized = self.materialized.borrow();
            if materialized.get(entry.index) == Some(&entry.node) {
                Some(entry.index)
            } else {
                materialized.iter().position(|&node| node == entry.node)
            }
        };
        let Some(position) = located else {
            log::warn!(
                "container {}: skipping {entry}, node is not materialized",
                self.id
            );
            return Ok(());
        };
        // Multi-node removals record pre-splice indices, so later entries
        // of the same range resolve by identity.
        if position != entry.index {
            log::debug!(
                "container {}: {entry} found node at {position} instead",
                self.id
            );
        }

        let effect = plan(self.state.get(), DriverOp::Remove { child: entry.node });
        self.perform(effect, entry)?;

        let mut materialized = self.materialized.borrow_mut();
        if materialized.get(position) == Some(&entry.node) {
            materialized.remove(position);
        } else {
            materialized.retain(|&node| node != entry.node);
        }
        log::trace!("container {}: applied {entry}", self.id);
        Ok(())
    }

    fn perform(&self, effect: Effect, entry: MutationEntry) -> Result<(), ContainerError> {
        if effect.is_noop() {
            log::trace!("container {}: {entry} has no output effect", self.id);
            return Ok(());
        }
        let mut target = self.target.borrow_mut();
        let Some(target) = target.as_mut() else {
            return Err(ContainerError::StaleEntry { entry });
        };
        effect
            .perform(self.id, &mut **target)
            .map_err(|source| ContainerError::Materialization { entry, source })
    }

    fn materialize_all(self: &Rc<Self>, target: Box<dyn OutputTarget>) -> Result<(), ContainerError> {
        if self.destroyed.get() {
            return Err(ContainerError::Destroyed);
        }
        if self.state.get() != MaterializationState::Unmaterialized {
            return Err(ContainerError::AlreadyMaterialized);
        }
        *self.target.borrow_mut() = Some(target);
        self.state.set(MaterializationState::Buffered);

        let children = self.children.to_vec();
        let clock = self.runtime.clock().clone();
        let budget = Budget::start(clock.as_ref(), self.config.initial_budget_ms);
        let mut next = 0;
        let mut outcome = Ok(());
        while next < children.len() {
            let child = children[next];
            next += 1;
            let entry = MutationEntry::insert(child, self.materialized.borrow().len());
            let effect = plan(self.state.get(), DriverOp::Append { child });
            if let Err(err) = self.perform(effect, entry) {
                outcome = Err(err);
                break;
            }
            self.materialized.borrow_mut().push(child);
            if budget.exceeded(clock.as_ref()) {
                break;
            }
        }

        if next < children.len() {
            let base = self.materialized.borrow().len();
            {
                let mut queue = self.queue.borrow_mut();
                for (offset, &child) in children[next..].iter().enumerate() {
                    queue.push(MutationEntry::insert(child, base + offset));
                }
            }
            log::debug!(
                "container {}: initial pass rendered {base} of {} children in {}ms",
                self.id,
                children.len(),
                budget.elapsed(clock.as_ref())
            );
            self.request_schedule();
        }
        outcome
    }

    fn discard_pending(&self) -> usize {
        self.ticker.borrow_mut().cancel(&self.runtime);
        self.queue.borrow_mut().discard()
    }
}

/// Owner handle for a container. Dropping it destroys the container.
pub struct ContainerNode {
    inner: Rc<ContainerInner>,
}

impl ContainerNode {
    pub fn builder(id: NodeId) -> ContainerBuilder {
        ContainerBuilder::new(id)
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn config(&self) -> ContainerConfig {
        self.inner.config
    }

    pub fn state(&self) -> MaterializationState {
        self.inner.state.get()
    }

    pub fn property(&self, name: &str) -> Option<NodeId> {
        self.inner.properties.get(name).copied()
    }

    /// Shared handle to the child list; mutations made through it are observed.
    pub fn child_views(&self) -> ChildViews {
        self.inner.children.clone()
    }

    pub fn children(&self) -> Vec<NodeId> {
        self.inner.children.to_vec()
    }

    /// Children whose output has actually been applied, in output order.
    pub fn materialized_children(&self) -> Vec<NodeId> {
        self.inner.materialized.borrow().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn pending_entries(&self) -> Vec<MutationEntry> {
        self.inner.queue.borrow().iter().copied().collect()
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.ticker.borrow().is_scheduled()
    }

    /// Host tasks requested so far; bursts of mutations share one request.
    pub fn tick_requests(&self) -> u64 {
        self.inner.ticker.borrow().requests()
    }

    pub fn is_quiescent(&self) -> bool {
        self.inner.queue.borrow().is_empty()
            && *self.inner.materialized.borrow() == self.inner.children.to_vec()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Failures raised by slices that ran from scheduled ticks.
    pub fn take_failures(&self) -> Vec<ContainerError> {
        std::mem::take(&mut *self.inner.failures.borrow_mut())
    }

    pub fn replace_children(
        &self,
        start: usize,
        remove: usize,
        nodes: &[NodeId],
    ) -> Result<(), ContainerError> {
        self.inner.children.replace(start, remove, nodes)
    }

    pub fn push_child(&self, node: NodeId) -> Result<(), ContainerError> {
        self.inner.children.push(node)
    }

    pub fn insert_child(&self, index: usize, node: NodeId) -> Result<(), ContainerError> {
        self.inner.children.insert(index, node)
    }

    /// Removes `node` from the child list and releases it. Absent nodes are ignored.
    pub fn remove_child(&self, node: NodeId) -> bool {
        if !self.inner.children.remove_node(node) {
            return false;
        }
        if let Some(lifecycle) = self.inner.lifecycle.borrow_mut().as_mut() {
            lifecycle.release(self.inner.id, node);
        }
        true
    }

    /// Renders the children into a fresh buffer on `target`.
    ///
    /// Children are rendered in order until the initial budget runs out; the
    /// rest are queued and materialized by later ticks.
    pub fn materialize_all(&self, target: impl OutputTarget + 'static) -> Result<(), ContainerError> {
        self.inner.materialize_all(Box::new(target))
    }

    /// Marks the container's own output as committed to the surface.
    pub fn commit(&self) -> Result<(), ContainerError> {
        if self.inner.destroyed.get() {
            return Err(ContainerError::Destroyed);
        }
        match self.inner.state.get() {
            MaterializationState::Unmaterialized => Err(ContainerError::NothingToCommit),
            MaterializationState::Buffered => {
                self.inner.state.set(MaterializationState::Materialized);
                log::debug!(
                    "container {}: committed with {} pending",
                    self.inner.id,
                    self.pending_len()
                );
                Ok(())
            }
            MaterializationState::Materialized => Ok(()),
        }
    }

    /// Drains one slice immediately instead of waiting for the armed tick.
    pub fn process_slice(&self) -> Result<SliceReport, ContainerError> {
        self.inner.process_slice()
    }

    /// Forgets all materialized children so the next `materialize_all` starts over.
    pub fn rerender(&self) {
        if self.inner.destroyed.get() {
            return;
        }
        let discarded = self.inner.discard_pending();
        self.inner.materialized.borrow_mut().clear();
        self.inner.target.borrow_mut().take();
        self.inner.state.set(MaterializationState::Unmaterialized);
        log::debug!(
            "container {}: rerender requested, {discarded} pending entries discarded",
            self.inner.id
        );
    }

    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.replace(true) {
            return;
        }
        if let Some(id) = inner.observer.take() {
            inner.children.unobserve(id);
        }
        let discarded = inner.discard_pending();
        inner.materialized.borrow_mut().clear();
        inner.target.borrow_mut().take();
        inner.lifecycle.borrow_mut().take();
        log::debug!(
            "container {}: destroyed, {discarded} pending entries discarded",
            inner.id
        );
    }
}

impl Drop for ContainerNode {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for ContainerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerNode")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("children", &self.inner.children.to_vec())
            .field("materialized", &*self.inner.materialized.borrow())
            .field("pending", &self.inner.queue.borrow().len())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}
