use std::time::{Duration, Instant};

/// Default upper bound for a single tick delta.
pub const DEFAULT_MAX_TICK_DELTA: Duration = Duration::from_millis(250);

/// Measures time between ticks of one canvas.
///
/// The baseline is the manager's construction time, then the previous tick.
/// Deltas are clamped so a canvas that sat hidden for minutes resumes with a
/// bounded step instead of a jump.
#[derive(Debug, Clone)]
pub struct TickClock {
    last: Instant,
    max_delta: Duration,
    ticks: u64,
}

impl TickClock {
    pub fn new(start: Instant, max_delta: Duration) -> Self {
        Self {
            last: start,
            max_delta,
            ticks: 0,
        }
    }

    /// Seconds since the previous tick (or construction), then moves the
    /// baseline to `now`.
    pub fn delta(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.last).min(self.max_delta);
        if now > self.last {
            self.last = now;
        }
        self.ticks += 1;
        elapsed.as_secs_f32()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn max_delta(&self) -> Duration {
        self.max_delta
    }
}
