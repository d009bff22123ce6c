use web_time::{Duration, Instant};

/// Wall-time deltas between frames, for advancing the transport.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    /// Last tick timestamp
    last_frame: Instant,
    /// Longest delta handed out, so a stall does not jump engine time
    max_delta: Duration,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Timer starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            max_delta: Duration::from_millis(250),
        }
    }

    /// Seconds since the previous tick, capped at a quarter second.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.last_frame = now;
        elapsed.min(self.max_delta).as_secs_f32()
    }
}

/// Smoothed FPS for the `fps` reply, fed with the frame times the frame
/// loop is driven with.
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// Smoothed FPS using exponential moving average
    smoothed_fps: f32,
    /// Smoothing factor (lower = smoother, 0.0-1.0)
    smoothing: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Clock assuming 60 FPS until frames are recorded.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            smoothed_fps: 60.0,
            smoothing: 0.05,
        }
    }

    /// Feed the duration of one frame in seconds.
    pub fn record(&mut self, frame_time: f32) {
        if frame_time > 0.0 {
            let instant_fps = 1.0 / frame_time;
            self.smoothed_fps = self.smoothed_fps * (1.0 - self.smoothing)
                + instant_fps * self.smoothing;
        }
    }

    /// Smoothed frames per second.
    #[must_use]
    pub const fn fps(&self) -> f32 {
        self.smoothed_fps
    }
}
