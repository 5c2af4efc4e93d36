use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use staged_core::{
    Clock, MaterializeError, NodeId, OutputTarget, ParentLifecycle, Placement, Runtime,
    RuntimeScheduler, TaskId,
};

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, millis: u64) {
        self.now.set(self.now.get().saturating_add(millis));
    }

    /// Moves the clock to `millis`. Time never runs backwards.
    pub fn set(&self, millis: u64) {
        if millis > self.now.get() {
            self.now.set(millis);
        }
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }
}

struct ScheduledTask {
    id: TaskId,
    due: u64,
    task: Box<dyn FnOnce() + 'static>,
}

/// Scheduler whose tasks run only when the test drives it.
///
/// Tasks run in due-time order, ties broken by submission order. Running a
/// task moves the shared [`ManualClock`] forward to its due time.
pub struct ManualScheduler {
    clock: ManualClock,
    next_id: Cell<TaskId>,
    tasks: RefCell<Vec<ScheduledTask>>,
    requests: Cell<usize>,
    cancelled: Cell<usize>,
    executed: Cell<usize>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            next_id: Cell::new(0),
            tasks: RefCell::new(Vec::new()),
            requests: Cell::new(0),
            cancelled: Cell::new(0),
            executed: Cell::new(0),
        }
    }

    /// Tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Due time of the next task, if any.
    pub fn next_due(&self) -> Option<u64> {
        self.tasks.borrow().iter().map(|task| task.due).min()
    }

    /// Total `schedule_after` calls.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    /// Tasks cancelled before they ran.
    pub fn cancelled(&self) -> usize {
        self.cancelled.get()
    }

    /// Tasks that have run.
    pub fn executed(&self) -> usize {
        self.executed.get()
    }

    /// Runs the earliest task. Returns `false` when nothing is pending.
    pub fn run_next(&self) -> bool {
        let Some(next) = self.take_next(u64::MAX) else {
            return false;
        };
        self.run(next);
        true
    }

    /// Runs every task due at or before `millis`, including tasks those
    /// tasks schedule, then leaves the clock at `millis`.
    pub fn advance_to(&self, millis: u64) -> usize {
        let mut ran = 0;
        while let Some(next) = self.take_next(millis) {
            self.run(next);
            ran += 1;
        }
        self.clock.set(millis);
        ran
    }

    pub fn advance_by(&self, millis: u64) -> usize {
        self.advance_to(self.clock.now().saturating_add(millis))
    }

    /// Runs tasks until none remain. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    fn take_next(&self, deadline: u64) -> Option<ScheduledTask> {
        let mut tasks = self.tasks.borrow_mut();
        let index = tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= deadline)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(index, _)| index)?;
        Some(tasks.remove(index))
    }

    fn run(&self, next: ScheduledTask) {
        self.clock.set(next.due);
        self.executed.set(self.executed.get() + 1);
        log::trace!("running task {} at {}ms", next.id, next.due);
        (next.task)();
    }
}

impl RuntimeScheduler for ManualScheduler {
    fn schedule_after(&self, delay_ms: u64, task: Box<dyn FnOnce() + 'static>) -> TaskId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.requests.set(self.requests.get() + 1);
        let due = self.clock.now().saturating_add(delay_ms);
        self.tasks.borrow_mut().push(ScheduledTask { id, due, task });
        id
    }

    fn cancel(&self, id: TaskId) {
        let mut tasks = self.tasks.borrow_mut();
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        if tasks.len() != before {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.clock.now())
            .field("pending", &self.pending())
            .field("requests", &self.requests.get())
            .finish()
    }
}

/// Manual clock and scheduler wired into a core [`Runtime`].
#[derive(Clone, Debug)]
pub struct TestRuntime {
    clock: ManualClock,
    scheduler: Rc<ManualScheduler>,
    runtime: Runtime,
}

impl TestRuntime {
    pub fn new() -> Self {
        let clock = ManualClock::new();
        let scheduler = Rc::new(ManualScheduler::new(clock.clone()));
        let runtime = Runtime::new(scheduler.clone(), Rc::new(clock.clone()));
        Self {
            clock,
            scheduler,
            runtime,
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordedOp {
    Buffer { child: NodeId, placement: Placement },
    Surface { child: NodeId, placement: Placement },
    Destroy { child: NodeId },
}

#[derive(Default)]
struct Recording {
    output: Vec<NodeId>,
    ops: Vec<RecordedOp>,
    fail_on: Vec<NodeId>,
    cost_ms: u64,
    clock: Option<ManualClock>,
}

/// Output target that records every call and keeps the resulting child order.
///
/// Clones share the same recording, so a test can hand one clone to a
/// container and inspect another.
#[derive(Clone, Default)]
pub struct RecordingTarget {
    inner: Rc<RefCell<Recording>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call advances `clock` by `cost_ms`, simulating slow output.
    pub fn with_cost(clock: &ManualClock, cost_ms: u64) -> Self {
        let target = Self::new();
        {
            let mut inner = target.inner.borrow_mut();
            inner.clock = Some(clock.clone());
            inner.cost_ms = cost_ms;
        }
        target
    }

    /// Makes every call for `child` fail.
    pub fn fail_on(&self, child: NodeId) {
        self.inner.borrow_mut().fail_on.push(child);
    }

    pub fn clear_failures(&self) {
        self.inner.borrow_mut().fail_on.clear();
    }

    /// Child outputs in their current order.
    pub fn output(&self) -> Vec<NodeId> {
        self.inner.borrow().output.clone()
    }

    pub fn ops(&self) -> Vec<RecordedOp> {
        self.inner.borrow().ops.clone()
    }

    pub fn op_count(&self) -> usize {
        self.inner.borrow().ops.len()
    }

    fn place(&self, child: NodeId, placement: Placement) -> Result<(), MaterializeError> {
        let mut inner = self.inner.borrow_mut();
        let output = &mut inner.output;
        if output.contains(&child) {
            return Err(MaterializeError::Rejected {
                node: child,
                reason: "output already present".to_owned(),
            });
        }
        match placement {
            Placement::Append => output.push(child),
            Placement::Prepend => output.insert(0, child),
            Placement::After(sibling) => {
                let Some(index) = output.iter().position(|&node| node == sibling) else {
                    return Err(MaterializeError::Missing { node: sibling });
                };
                output.insert(index + 1, child);
            }
        }
        Ok(())
    }

    fn charge(&self, child: NodeId) -> Result<(), MaterializeError> {
        let inner = self.inner.borrow();
        if let Some(clock) = inner.clock.as_ref() {
            clock.advance(inner.cost_ms);
        }
        if inner.fail_on.contains(&child) {
            return Err(MaterializeError::Rejected {
                node: child,
                reason: "injected failure".to_owned(),
            });
        }
        Ok(())
    }

    fn record(&self, op: RecordedOp) {
        self.inner.borrow_mut().ops.push(op);
    }
}

impl OutputTarget for RecordingTarget {
    fn render_into_buffer(
        &mut self,
        _parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        self.charge(child)?;
        self.place(child, placement)?;
        self.record(RecordedOp::Buffer { child, placement });
        Ok(())
    }

    fn insert_into_surface(
        &mut self,
        _parent: NodeId,
        child: NodeId,
        placement: Placement,
    ) -> Result<(), MaterializeError> {
        self.charge(child)?;
        self.place(child, placement)?;
        self.record(RecordedOp::Surface { child, placement });
        Ok(())
    }

    fn destroy_output(&mut self, child: NodeId) -> Result<(), MaterializeError> {
        self.charge(child)?;
        {
            let mut inner = self.inner.borrow_mut();
            let Some(index) = inner.output.iter().position(|&node| node == child) else {
                return Err(MaterializeError::Missing { node: child });
            };
            inner.output.remove(index);
        }
        self.record(RecordedOp::Destroy { child });
        Ok(())
    }
}

impl fmt::Debug for RecordingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("RecordingTarget")
            .field("output", &inner.output)
            .field("ops", &inner.ops.len())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Adopt { parent: NodeId, child: NodeId },
    Release { parent: NodeId, child: NodeId },
}

/// [`ParentLifecycle`] that records adopt and release calls.
#[derive(Clone, Debug, Default)]
pub struct RecordingLifecycle {
    events: Rc<RefCell<Vec<LifecycleEvent>>>,
}

impl RecordingLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.borrow().clone()
    }
}

impl ParentLifecycle for RecordingLifecycle {
    fn adopt(&mut self, parent: NodeId, child: NodeId) {
        self.events
            .borrow_mut()
            .push(LifecycleEvent::Adopt { parent, child });
    }

    fn release(&mut self, parent: NodeId, child: NodeId) {
        self.events
            .borrow_mut()
            .push(LifecycleEvent::Release { parent, child });
    }
}
