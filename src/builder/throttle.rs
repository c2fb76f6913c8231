//! Time-based throttle for progress reporting

use std::time::{Duration, Instant};

/// Lets an event through at most once per period
#[derive(Debug, Clone, Copy)]
pub(crate) struct Throttle {
    period: Duration,
    next: Option<Instant>,
}

impl Throttle {
    pub fn new(period: Duration) -> Self {
        Throttle { period, next: None }
    }

    /// The first check always passes
    #[inline]
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    pub fn check_at(&mut self, now: Instant) -> bool {
        let ready = self.next.is_none_or(|next| now >= next);
        if ready {
            self.next = Some(now + self.period);
        }
        ready
    }
}
