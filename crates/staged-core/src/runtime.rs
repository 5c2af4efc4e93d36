use std::fmt;
use std::rc::Rc;

use crate::platform::{Clock, RuntimeScheduler, TaskId};

/// Host services shared by every container driven from the same loop.
#[derive(Clone)]
pub struct Runtime {
    scheduler: Rc<dyn RuntimeScheduler>,
    clock: Rc<dyn Clock>,
}

impl Runtime {
    pub fn new(scheduler: Rc<dyn RuntimeScheduler>, clock: Rc<dyn Clock>) -> Self {
        Self { scheduler, clock }
    }

    pub fn scheduler(&self) -> &Rc<dyn RuntimeScheduler> {
        &self.scheduler
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn elapsed_millis(&self, since: u64) -> u64 {
        self.clock.elapsed_millis(since)
    }

    pub fn schedule_after(&self, delay_ms: u64, task: impl FnOnce() + 'static) -> TaskId {
        self.scheduler.schedule_after(delay_ms, Box::new(task))
    }

    pub fn cancel(&self, id: TaskId) {
        self.scheduler.cancel(id);
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("now_millis", &self.clock.now_millis())
            .finish()
    }
}

/// Scheduler that never runs anything. Useful for containers that are only
/// ever drained by hand through `process_slice`.
#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_after(&self, _delay_ms: u64, _task: Box<dyn FnOnce() + 'static>) -> TaskId {
        0
    }

    fn cancel(&self, _id: TaskId) {}
}
