//! Frame slot accounting.

use sable_rhi::sync::MAX_FRAMES_IN_FLIGHT;

/// Cycles through frame slots `0..frames_in_flight`.
///
/// Only a completed frame advances the counter; a skipped frame retries the
/// same slot on the next tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
    frames_in_flight: usize,
}

impl FrameCounter {
    /// # Panics
    ///
    /// If `frames_in_flight` is zero.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "at least one frame slot is required");
        Self {
            current: 0,
            frames_in_flight,
        }
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames_in_flight;
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(MAX_FRAMES_IN_FLIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_in_order() {
        let mut counter = FrameCounter::new(3);
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(counter.current());
            counter.advance();
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_default_is_double_buffered() {
        let counter = FrameCounter::default();
        assert_eq!(counter.frames_in_flight(), 2);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    #[should_panic]
    fn test_zero_slots_rejected() {
        let _ = FrameCounter::new(0);
    }
}
