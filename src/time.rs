//! Frame timing for the window loop.
//!
//! The simulation advances one step per frame regardless of wall time; the
//! clock only feeds time-based effects (camera auto-rotate) and the frame
//! rate shown in the UI.

use std::time::{Duration, Instant};

/// Longest delta handed to time-based effects, in seconds.
pub const MAX_DELTA: f32 = 0.1;

/// Frame clock with a periodically refreshed FPS estimate.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            last_frame: now,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Mark a new frame. Returns the clamped delta in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.delta_secs = raw_delta.min(MAX_DELTA);
        self.last_frame = now;
        self.frame_count += 1;

        // Update FPS periodically
        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        self.delta_secs
    }

    /// Time since last frame in seconds, clamped to [`MAX_DELTA`].
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Calculated frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.delta(), 0.0);
        assert_eq!(clock.fps(), 0.0);
    }

    #[test]
    fn test_delta_is_clamped() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let dt = clock.tick_at(start + Duration::from_millis(20));
        assert!((dt - 0.02).abs() < 1e-4);
        let dt = clock.tick_at(start + Duration::from_secs(5));
        assert_eq!(dt, MAX_DELTA);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn test_fps_estimate() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        for i in 1..=30 {
            clock.tick_at(start + Duration::from_millis(i * 20));
        }
        // 25 frames landed in the first 500ms window
        assert!((clock.fps() - 50.0).abs() < 1.0);
    }
}
