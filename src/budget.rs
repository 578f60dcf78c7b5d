use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Remaining time before the invocation must yield.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    deadline: Instant,
}

impl TimeBudget {
    pub fn new(remaining: Duration) -> Self {
        Self {
            deadline: Instant::now() + remaining,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// The instant `margin` before the deadline, or now if that already passed.
    pub fn cutoff(&self, margin: Duration) -> Instant {
        let now = Instant::now();
        match self.deadline.checked_sub(margin) {
            Some(at) if at > now => at,
            _ => now,
        }
    }
}

static NEXT_INVOCATION: AtomicU64 = AtomicU64::new(1);

/// One logical request flowing through a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    pub id: u64,
    pub budget: TimeBudget,
}

impl Invocation {
    pub fn new(budget: TimeBudget) -> Self {
        Self {
            id: NEXT_INVOCATION.fetch_add(1, Ordering::Relaxed),
            budget,
        }
    }
}
