use std::time::{Duration, Instant};

/// Advisory wall-clock budget for one search. Polled at node entry only, so a
/// search may overrun by the cost of one node.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// `secs == 0` means no limit. Negative or non-finite budgets are treated as unlimited.
    pub fn from_secs(secs: f64) -> Self {
        let limit = if secs.is_finite() && secs > 0.0 {
            Some(Duration::from_secs_f64(secs))
        } else {
            None
        };
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::from_secs(0.0)
    }

    pub fn expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.start.elapsed() >= limit,
            None => false,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
