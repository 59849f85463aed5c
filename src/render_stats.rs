//! Frame-rate tracking for the accelerated scene.
//!
//! The runner calls [`FrameMonitor::update`] once per frame while the gate is
//! READY. The rate is recomputed once per second and logged at debug level.

use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct FrameMonitor {
    frames: u32,
    window_start: Instant,
    fps: u32,
}

impl FrameMonitor {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
            fps: 0,
        }
    }

    /// Count one frame at `now` and return the latest rate.
    pub fn update(&mut self, now: Instant) -> u32 {
        self.frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= WINDOW {
            let rate = f64::from(self.frames) / elapsed.as_secs_f64();
            self.fps = rate.round() as u32;
            self.frames = 0;
            self.window_start = now;
            log::debug!("Scene running at {} fps", self.fps);
        }

        self.fps
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Start a fresh window, e.g. after the scene was remounted.
    pub fn restart(&mut self, now: Instant) {
        *self = Self::new(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_is_zero_before_first_window() {
        let start = Instant::now();
        let mut monitor = FrameMonitor::new(start);
        for i in 1..10 {
            assert_eq!(monitor.update(start + Duration::from_millis(i * 16)), 0);
        }
    }

    #[test]
    fn test_rate_after_one_second() {
        let start = Instant::now();
        let mut monitor = FrameMonitor::new(start);
        let mut fps = 0;
        for i in 1..=60u64 {
            fps = monitor.update(start + Duration::from_micros(i * 16_667));
        }
        assert_eq!(fps, 60);
        assert_eq!(monitor.fps(), 60);
    }

    #[test]
    fn test_restart_clears_rate() {
        let start = Instant::now();
        let mut monitor = FrameMonitor::new(start);
        monitor.update(start + Duration::from_secs(1));
        assert_eq!(monitor.fps(), 1);

        monitor.restart(start + Duration::from_secs(1));
        assert_eq!(monitor.fps(), 0);
    }
}
