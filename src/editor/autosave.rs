use std::time::{Duration, Instant};

/// Quiet window after the last mutation before a save fires.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Debounces block mutations into periodic persistence calls.
///
/// Every mutation re-arms the timer; only the latest block state within a
/// one-second quiet window is persisted. The coordinator never runs the
/// save itself; the owning session polls it and performs the write, so
/// there is exactly one suspended operation and it is cooperative.
#[derive(Debug, Default)]
pub struct AutosaveCoordinator {
    deadline: Option<Instant>,
}

impl AutosaveCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation: cancel any pending save and schedule a new one
    /// a debounce window from `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + AUTOSAVE_DEBOUNCE);
    }

    /// Whether a save is scheduled and not yet fired.
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the deadline if it has passed. Returns true exactly once
    /// per quiet window; the caller performs the save.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel without firing (session teardown, navigation away). The
    /// pending state must not leak into the next document.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
