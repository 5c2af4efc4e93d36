/// Default for every time budget and delay, in milliseconds.
pub const DEFAULT_BUDGET_MS: u64 = 50;

/// Timing knobs for a container.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Time the synchronous first pass may spend before deferring the rest.
    pub initial_budget_ms: u64,
    /// Delay between a schedule request and the slice it triggers.
    pub tick_delay_ms: u64,
    /// Time a single slice may spend draining the queue.
    pub slice_budget_ms: u64,
}

impl ContainerConfig {
    pub fn with_initial_budget(mut self, millis: u64) -> Self {
        self.initial_budget_ms = millis;
        self
    }

    pub fn with_tick_delay(mut self, millis: u64) -> Self {
        self.tick_delay_ms = millis;
        self
    }

    pub fn with_slice_budget(mut self, millis: u64) -> Self {
        self.slice_budget_ms = millis;
        self
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            initial_budget_ms: DEFAULT_BUDGET_MS,
            tick_delay_ms: DEFAULT_BUDGET_MS,
            slice_budget_ms: DEFAULT_BUDGET_MS,
        }
    }
}
