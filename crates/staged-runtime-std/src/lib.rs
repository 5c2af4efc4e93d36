//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `staged-core`. Applications construct a
//! [`StdRuntime`], hand its [`staged_core::Runtime`] to their containers and
//! pump [`StdRuntime::run_due`] (or [`StdRuntime::run_until_idle`]) from
//! their event loop.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::env;
use std::fmt;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use staged_core::collections::map::HashMap;
use staged_core::{Clock, ContainerConfig, Runtime, RuntimeScheduler, TaskId};

pub const INITIAL_BUDGET_ENV: &str = "STAGED_INITIAL_BUDGET_MS";
pub const TICK_DELAY_ENV: &str = "STAGED_TICK_DELAY_MS";
pub const SLICE_BUDGET_ENV: &str = "STAGED_SLICE_BUDGET_MS";

/// Clock implementation backed by [`std::time`], counting from its creation.
#[derive(Debug, Clone)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Returns the elapsed time since `since` as a [`Duration`] for convenience.
    pub fn elapsed(&self, since: u64) -> Duration {
        Duration::from_millis(self.elapsed_millis(since))
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Timer queue for tasks submitted by containers on this thread.
pub struct StdScheduler {
    clock: Rc<StdClock>,
    next_id: Cell<TaskId>,
    timers: RefCell<BinaryHeap<Reverse<(u64, TaskId)>>>,
    tasks: RefCell<HashMap<TaskId, Box<dyn FnOnce() + 'static>>>,
}

impl StdScheduler {
    pub fn new(clock: Rc<StdClock>) -> Self {
        Self {
            clock,
            next_id: Cell::new(0),
            timers: RefCell::new(BinaryHeap::new()),
            tasks: RefCell::new(HashMap::default()),
        }
    }

    /// Number of tasks that have not run and were not cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Due time, in clock milliseconds, of the earliest live task.
    pub fn next_due(&self) -> Option<u64> {
        let tasks = self.tasks.borrow();
        let mut timers = self.timers.borrow_mut();
        while let Some(Reverse((due, id))) = timers.peek().copied() {
            if tasks.contains_key(&id) {
                return Some(due);
            }
            // Cancelled; its timer entry is stale.
            timers.pop();
        }
        None
    }

    /// Runs every task due by now. Returns how many ran.
    ///
    /// Tasks scheduled by running tasks are picked up in the same call once
    /// they are due.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.take_due(self.clock.now_millis()) {
            task();
            ran += 1;
        }
        ran
    }

    /// Sleeps between due times until no task is left. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            ran += self.run_due();
            let Some(due) = self.next_due() else {
                return ran;
            };
            let now = self.clock.now_millis();
            if due > now {
                thread::sleep(Duration::from_millis(due - now));
            }
        }
    }

    fn take_due(&self, now: u64) -> Option<Box<dyn FnOnce() + 'static>> {
        let due = self.next_due()?;
        if due > now {
            return None;
        }
        let Reverse((_, id)) = self.timers.borrow_mut().pop()?;
        self.tasks.borrow_mut().remove(&id)
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new(Rc::new(StdClock::new()))
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_after(&self, delay_ms: u64, task: Box<dyn FnOnce() + 'static>) -> TaskId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let due = self.clock.now_millis().saturating_add(delay_ms);
        self.tasks.borrow_mut().insert(id, task);
        self.timers.borrow_mut().push(Reverse((due, id)));
        log::trace!("task {id} due at {due}ms");
        id
    }

    fn cancel(&self, id: TaskId) {
        if self.tasks.borrow_mut().remove(&id).is_some() {
            log::trace!("task {id} cancelled");
        }
    }
}

/// Convenience container bundling the standard scheduler and clock.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Rc<StdScheduler>,
    clock: Rc<StdClock>,
    runtime: Runtime,
}

impl StdRuntime {
    /// Creates a new standard runtime instance.
    pub fn new() -> Self {
        let clock = Rc::new(StdClock::new());
        let scheduler = Rc::new(StdScheduler::new(Rc::clone(&clock)));
        let runtime = Runtime::new(scheduler.clone(), clock.clone());
        Self {
            scheduler,
            clock,
            runtime,
        }
    }

    /// Returns a [`staged_core::Runtime`] configured with the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Rc<StdScheduler> {
        Rc::clone(&self.scheduler)
    }

    /// Returns the clock implementation.
    pub fn clock(&self) -> Rc<StdClock> {
        Rc::clone(&self.clock)
    }

    pub fn run_due(&self) -> usize {
        self.scheduler.run_due()
    }

    pub fn run_until_idle(&self) -> usize {
        self.scheduler.run_until_idle()
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a [`ContainerConfig`] from the `STAGED_*_MS` environment variables.
///
/// Unset variables keep their defaults; unparsable ones are ignored with a
/// warning.
pub fn config_from_env() -> ContainerConfig {
    config_from_lookup(|key| env::var(key).ok())
}

fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ContainerConfig {
    let read = |key: &str| -> Option<u64> {
        let raw = lookup(key)?;
        match raw.trim().parse() {
            Ok(millis) => Some(millis),
            Err(err) => {
                log::warn!("ignoring {key}={raw:?}: {err}");
                None
            }
        }
    };

    let mut config = ContainerConfig::default();
    if let Some(millis) = read(INITIAL_BUDGET_ENV) {
        config = config.with_initial_budget(millis);
    }
    if let Some(millis) = read(TICK_DELAY_ENV) {
        config = config.with_tick_delay(millis);
    }
    if let Some(millis) = read(SLICE_BUDGET_ENV) {
        config = config.with_slice_budget(millis);
    }
    config
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;
    use std::time::Duration;

    use staged_core::{
        Clock, ContainerConfig, ContainerNode, MaterializeError, NodeId, OutputTarget, Placement,
    };

    use super::{config_from_lookup, StdClock, StdRuntime, SLICE_BUDGET_ENV, TICK_DELAY_ENV};

    #[derive(Clone, Default)]
    struct VecTarget {
        output: Rc<RefCell<Vec<NodeId>>>,
    }

    impl VecTarget {
        fn place(&self, child: NodeId, placement: Placement) {
            let mut output = self.output.borrow_mut();
            match placement {
                Placement::Append => output.push(child),
                Placement::Prepend => output.insert(0, child),
                Placement::After(sibling) => {
                    let index = output
                        .iter()
                        .position(|&node| node == sibling)
                        .map_or(output.len(), |index| index + 1);
                    output.insert(index, child);
                }
            }
        }
    }

    impl OutputTarget for VecTarget {
        fn render_into_buffer(
            &mut self,
            _parent: NodeId,
            child: NodeId,
            placement: Placement,
        ) -> Result<(), MaterializeError> {
            self.place(child, placement);
            Ok(())
        }

        fn insert_into_surface(
            &mut self,
            _parent: NodeId,
            child: NodeId,
            placement: Placement,
        ) -> Result<(), MaterializeError> {
            self.place(child, placement);
            Ok(())
        }

        fn destroy_output(&mut self, child: NodeId) -> Result<(), MaterializeError> {
            self.output.borrow_mut().retain(|&node| node != child);
            Ok(())
        }
    }

    #[test]
    fn std_runtime_drains_a_container_until_idle() {
        let runtime = StdRuntime::new();
        let config = ContainerConfig::default()
            .with_tick_delay(1)
            .with_slice_budget(5);
        let container = ContainerNode::builder(0)
            .config(config)
            .children([1usize, 2, 3])
            .build(&runtime.runtime())
            .expect("container");
        let target = VecTarget::default();
        container.materialize_all(target.clone()).expect("materialize");
        container.commit().expect("commit");

        container.replace_children(1, 1, &[4, 5]).expect("replace");
        assert_eq!(runtime.scheduler().pending(), 1);

        assert!(runtime.run_until_idle() >= 1);
        assert!(container.is_quiescent());
        assert_eq!(*target.output.borrow(), vec![1, 4, 5, 3]);
        assert_eq!(runtime.scheduler().pending(), 0);
    }

    #[test]
    fn std_clock_counts_milliseconds_from_creation() {
        let clock = StdClock::new();
        let start = clock.now_millis();
        thread::sleep(Duration::from_millis(5));

        assert!(clock.elapsed_millis(start) >= 5);
        assert!(clock.elapsed(start) >= Duration::from_millis(5));
        assert_eq!(clock.elapsed_millis(u64::MAX), 0);
    }

    #[test]
    fn cancelled_tasks_are_skipped() {
        let runtime = StdRuntime::new();
        let ran = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&ran);
        let second = Rc::clone(&ran);
        let id = runtime
            .runtime()
            .schedule_after(0, move || first.borrow_mut().push("cancelled"));
        runtime
            .runtime()
            .schedule_after(0, move || second.borrow_mut().push("kept"));
        runtime.runtime().cancel(id);

        assert_eq!(runtime.scheduler().pending(), 1);
        assert_eq!(runtime.run_due(), 1);
        assert_eq!(*ran.borrow(), vec!["kept"]);
        assert_eq!(runtime.scheduler().next_due(), None);
    }

    #[test]
    fn env_config_overrides_defaults_and_skips_garbage() {
        let config = config_from_lookup(|key| match key {
            SLICE_BUDGET_ENV => Some(" 8 ".to_owned()),
            TICK_DELAY_ENV => Some("soon".to_owned()),
            _ => None,
        });
        assert_eq!(config, ContainerConfig::default().with_slice_budget(8));
    }
}
