use std::time::{Duration, Instant};

/// Fixed-period gate for one periodic concern.
///
/// The first call to [`Interval::ready`] always fires.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    last: Option<Instant>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// True if a full period has passed since the last firing; marks `now`
    /// as the new firing time when it does.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Forget the last firing so the next check fires.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
