//! Frame timing for the update loop.

use std::time::{Duration, Instant};

/// Longest delta handed to the camera and gameplay in one tick.
///
/// A stalled frame (window drag, breakpoint, swapchain rebuild) would
/// otherwise teleport the camera.
const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Measures the time between update ticks.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    frame_count: u64,
}

impl FrameTimer {
    /// Create a timer starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frame_count: 0,
        }
    }

    /// Advance one tick and return the clamped delta in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.frame_count += 1;
        delta.min(MAX_FRAME_DELTA).as_secs_f32()
    }

    /// Number of ticks since creation.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Seconds since the timer was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Average ticks per second since creation.
    pub fn average_fps(&self) -> f32 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.frame_count as f32 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = FrameTimer::new();
        let start = timer.last_tick;
        timer.tick_at(start + Duration::from_millis(16));
        timer.tick_at(start + Duration::from_millis(32));
        assert_eq!(timer.frame_count(), 2);
    }

    #[test]
    fn test_tick_returns_delta() {
        let mut timer = FrameTimer::new();
        let start = timer.last_tick;
        let delta = timer.tick_at(start + Duration::from_millis(20));
        assert!((delta - 0.020).abs() < 1e-4);
    }

    #[test]
    fn test_long_stall_is_clamped() {
        let mut timer = FrameTimer::new();
        let start = timer.last_tick;
        let delta = timer.tick_at(start + Duration::from_secs(3));
        assert!((delta - MAX_FRAME_DELTA.as_secs_f32()).abs() < 1e-6);
    }
}
