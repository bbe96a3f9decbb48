use std::thread;
use std::time::{Duration, Instant};

/// Spaces metered calls at least `min_interval` apart.
///
/// Advisory only: it tracks wall time since the last call started, not the
/// quota points actually consumed, and never retries.
#[derive(Debug)]
pub struct RateGovernor {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Interval that keeps `points_per_call` sized calls under `points_per_second`.
    pub fn from_budget(points_per_call: u32, points_per_second: u32) -> Self {
        let interval = if points_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(
                1_000_000_000 * u64::from(points_per_call) / u64::from(points_per_second),
            )
        };
        Self::new(interval)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the next metered call may start, then mark it started.
    pub fn wait_turn(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }

    /// Run `call` as a metered call.
    pub fn metered<T>(&mut self, call: impl FnOnce() -> T) -> T {
        self.wait_turn();
        call()
    }
}
