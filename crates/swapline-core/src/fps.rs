// SPDX-License-Identifier: CEPL-1.0
use std::time::{Duration, Instant};

use tracing::info;

const WINDOW: Duration = Duration::from_secs(1);

/// Counts presented frames and reports the rate once per second.
#[derive(Debug)]
pub struct FrameRateCounter {
    frames: u32,
    window_start: Instant,
    last: Option<u32>,
}

impl FrameRateCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
            last: None,
        }
    }

    /// Counts one frame and logs the rate when a second has passed.
    pub fn frame(&mut self) {
        if let Some(fps) = self.frame_at(Instant::now()) {
            info!("fps ~ {}", fps);
        }
    }

    /// Counts one frame at `now`. Returns the frames seen in the window that
    /// just closed, if one did.
    pub fn frame_at(&mut self, now: Instant) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);
        if now.duration_since(self.window_start) < WINDOW {
            return None;
        }
        let fps = self.frames;
        self.frames = 0;
        self.window_start = now;
        self.last = Some(fps);
        Some(fps)
    }

    /// Rate reported by the last completed window.
    pub fn last(&self) -> Option<u32> {
        self.last
    }
}

impl Default for FrameRateCounter {
    fn default() -> Self {
        Self::new()
    }
}
