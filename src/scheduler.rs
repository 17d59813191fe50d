use std::time::Duration;

/// Step assumed on the first tick and after a clock jump.
pub const DEFAULT_DT_S: f32 = 0.02;
/// Elapsed times above this are treated as a clock jump.
pub const MAX_DT_S: f32 = 1.0;

/// Tracks the previous tick time to derive the per-tick step.
#[derive(Debug, Clone, Default)]
pub struct TickTimer {
    last_tick_usec: Option<u64>,
    tick_count: u64,
}

impl TickTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tick at `now_usec` and return the step in seconds since the
    /// previous one.
    pub fn next_dt(&mut self, now_usec: u64) -> f32 {
        let dt = match self.last_tick_usec {
            Some(last) => sanitize_dt(now_usec.saturating_sub(last) as f32 / 1_000_000.0),
            None => DEFAULT_DT_S,
        };
        self.last_tick_usec = Some(now_usec);
        self.tick_count = self.tick_count.wrapping_add(1);
        dt
    }

    pub fn last_tick_usec(&self) -> Option<u64> {
        self.last_tick_usec
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

/// Replace non-positive or oversized steps with [`DEFAULT_DT_S`].
pub fn sanitize_dt(dt: f32) -> f32 {
    if dt <= 0.0 || dt > MAX_DT_S || dt.is_nan() {
        DEFAULT_DT_S
    } else {
        dt
    }
}

/// Period of a rate group running at `hz`, never shorter than 1 ms.
pub fn tick_period(hz: u32) -> Duration {
    let hz = u64::from(hz.max(1));
    Duration::from_micros((1_000_000 / hz).max(1000))
}
