//! Frame pacing for the render loop.

use std::time::{Duration, Instant};

/// Interval over which the frame rate is averaged.
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Tracks frame boundaries for the render loop.
///
/// [`tick`](Self::tick) marks the start of a frame and returns the time
/// elapsed since the previous one, for advancing animation. The clock
/// also counts frames and keeps a frame-rate estimate averaged over the
/// last second, for the loop's diagnostics.
#[derive(Debug)]
pub struct FrameClock {
    /// Start of the previous frame.
    last_frame: Instant,
    /// Total frames ticked since creation.
    frame_count: u64,
    /// Start of the current averaging window.
    window_start: Instant,
    /// Frames ticked inside the current window.
    window_frames: u32,
    /// Frame rate over the last completed window.
    rate: f32,
}

impl FrameClock {
    /// Creates a clock; the first tick measures from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            frame_count: 0,
            window_start: now,
            window_frames: 0,
            rate: 0.0,
        }
    }

    /// Marks a frame boundary and returns the delta since the last one.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;

        self.frame_count += 1;
        self.window_frames += 1;

        let window = now - self.window_start;
        if window >= RATE_WINDOW {
            self.rate = rate_over(self.window_frames, window);
            self.window_start = now;
            self.window_frames = 0;
        }

        delta
    }

    /// Total number of frames ticked so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frame rate averaged over the last second.
    ///
    /// Stays at 0.0 until the first full averaging window has elapsed.
    pub fn frame_rate(&self) -> f32 {
        self.rate
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames per second over the given window.
fn rate_over(frames: u32, window: Duration) -> f32 {
    if window.is_zero() {
        return 0.0;
    }
    frames as f32 / window.as_secs_f32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frame_count(), 0);

        clock.tick();
        clock.tick();
        clock.tick();
        assert_eq!(clock.frame_count(), 3);
    }

    #[test]
    fn test_tick_delta_is_non_negative_and_bounded() {
        let mut clock = FrameClock::new();
        let first = clock.tick();
        let second = clock.tick();
        assert!(first >= Duration::ZERO);
        // Consecutive ticks cannot measure more wall time than has passed
        // since the clock was created plus a generous margin.
        assert!(second < Duration::from_secs(60));
    }

    #[test]
    fn test_frame_rate_starts_at_zero() {
        let mut clock = FrameClock::new();
        clock.tick();
        // No full averaging window has elapsed yet.
        assert_eq!(clock.frame_rate(), 0.0);
    }

    #[test]
    fn test_rate_over() {
        assert_eq!(rate_over(60, Duration::from_secs(1)), 60.0);
        assert_eq!(rate_over(30, Duration::from_secs(2)), 15.0);
        assert_eq!(rate_over(10, Duration::ZERO), 0.0);
    }
}
