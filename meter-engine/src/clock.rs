use std::time::{Duration, Instant};

/// 100ns ticks, the resolution the capture side reports in.
pub const DEFAULT_TICKS_PER_SECOND: u64 = 10_000_000;

/// Monotonic tick source anchored at creation.
#[derive(Debug, Clone, Copy)]
pub struct TickClock {
    epoch: Instant,
    ticks_per_second: u64,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_SECOND)
    }
}

impl TickClock {
    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            epoch: Instant::now(),
            ticks_per_second,
        }
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    pub fn now(&self) -> i64 {
        self.to_ticks(self.epoch.elapsed())
    }

    pub fn to_ticks(&self, elapsed: Duration) -> i64 {
        let ticks = elapsed.as_nanos() * self.ticks_per_second as u128 / 1_000_000_000;
        i64::try_from(ticks).unwrap_or(i64::MAX)
    }
}
