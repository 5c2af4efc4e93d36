//! Platform abstraction traits for the staged runtime.
//!
//! Containers never sleep or spawn on their own. Delayed work and time
//! measurement are delegated to the host through these traits so the same
//! container logic runs under a real event loop or a deterministic test
//! harness.

/// Identifier handed out by a [`RuntimeScheduler`] for a pending task.
pub type TaskId = u64;

/// Runs deferred work on behalf of containers.
///
/// Tasks are executed on the thread that drives the host loop, never
/// concurrently with one another.
pub trait RuntimeScheduler {
    /// Arrange for `task` to run once, no earlier than `delay_ms` from now.
    fn schedule_after(&self, delay_ms: u64, task: Box<dyn FnOnce() + 'static>) -> TaskId;

    /// Cancel a task that has not run yet. Unknown or already-run ids are ignored.
    fn cancel(&self, id: TaskId);
}

/// Provides timing information for time-boxed work.
pub trait Clock {
    /// Monotonic milliseconds since an arbitrary, fixed origin.
    fn now_millis(&self) -> u64;

    /// Milliseconds elapsed since `since`, saturating at zero.
    fn elapsed_millis(&self, since: u64) -> u64 {
        self.now_millis().saturating_sub(since)
    }
}
