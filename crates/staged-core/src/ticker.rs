use crate::platform::{Clock, TaskId};
use crate::runtime::Runtime;

/// Idempotent tick arming.
///
/// At most one host task is outstanding per ticker: requests made while one
/// is pending are coalesced into it.
#[derive(Debug, Default)]
pub struct TickScheduler {
    scheduled: bool,
    pending: Option<TaskId>,
    requests: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a tick running `task` after `delay_ms`, unless one is already armed.
    /// Returns whether a new host task was requested.
    ///
    /// The host must not run `task` before this call returns.
    pub fn request(
        &mut self,
        runtime: &Runtime,
        delay_ms: u64,
        task: impl FnOnce() + 'static,
    ) -> bool {
        if self.scheduled {
            return false;
        }
        self.scheduled = true;
        self.requests += 1;
        self.pending = Some(runtime.schedule_after(delay_ms, task));
        true
    }

    /// Drops the outstanding host task, if any, and clears the guard.
    pub fn cancel(&mut self, runtime: &Runtime) {
        if let Some(id) = self.pending.take() {
            runtime.cancel(id);
        }
        self.scheduled = false;
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Number of host tasks requested over the ticker's lifetime.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}

/// Time box measured against a [`Clock`]. Exhausted once `limit_ms` have elapsed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Budget {
    start: u64,
    limit_ms: u64,
}

impl Budget {
    pub fn start(clock: &dyn Clock, limit_ms: u64) -> Self {
        Self {
            start: clock.now_millis(),
            limit_ms,
        }
    }

    pub fn elapsed(&self, clock: &dyn Clock) -> u64 {
        clock.elapsed_millis(self.start)
    }

    /// Whether the whole budget has been used. Slices stop here.
    pub fn exhausted(&self, clock: &dyn Clock) -> bool {
        self.elapsed(clock) >= self.limit_ms
    }

    /// Whether more than the budget has been used. The first pass only stops
    /// once it has gone over.
    pub fn exceeded(&self, clock: &dyn Clock) -> bool {
        self.elapsed(clock) > self.limit_ms
    }
}

/// Outcome of one drained slice.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SliceReport {
    pub applied: usize,
    pub remaining: usize,
    pub elapsed_ms: u64,
}
