use std::time::Duration;

use tokio::time::Instant;

/// Fires at most once per `every`, measured from the last time it fired.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cadence {
    every: Duration,
    last: Instant,
}

impl Cadence {
    pub fn new(every: Duration, now: Instant) -> Self {
        Self { every, last: now }
    }

    /// True when at least `every` has elapsed since the last firing; resets the counter.
    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.every {
            self.last = now;
            true
        } else {
            false
        }
    }
}
