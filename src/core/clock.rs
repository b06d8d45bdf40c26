use std::time::{Duration, Instant};

/// Frame clock - measures time between ticks, capped so a stalled event loop
/// does not hand navigation a huge step
#[derive(Debug)]
pub struct Clock {
    started: Instant,
    last_tick: Instant,
    max_delta: f32,
}

impl Clock {
    pub const DEFAULT_MAX_DELTA: f32 = 0.25;

    pub fn new() -> Self {
        Self::with_max_delta(Self::DEFAULT_MAX_DELTA)
    }

    pub fn with_max_delta(max_delta: f32) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_tick: now,
            max_delta,
        }
    }

    /// Seconds since the previous tick, at most `max_delta`
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        delta.min(self.max_delta)
    }

    /// Restart delta measurement, e.g. after switching frame source
    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
