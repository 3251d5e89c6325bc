//! Frame timing for the application loop.

use std::time::{Duration, Instant};

/// Timing snapshot handed to every window rendered this tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Monotonic tick counter.
    pub frame_index: u64,
}

/// Produces one `FrameTime` per tick. Delta time is clamped so a debugger
/// pause or a long stall does not feed a huge step into animation and input
/// logic, and a tight loop never reports zero.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restart the baseline without touching the frame index. Used after
    /// stalls the caller knows about, like returning from suspension.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Advance one tick.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;
        let frame = FrameTime {
            dt: dt.as_secs_f32(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
