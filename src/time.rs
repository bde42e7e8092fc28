//! Frame clock for driving the simulation from a render loop.
//!
//! Wall-clock frame time is fed into an accumulator that releases whole
//! fixed-size physics steps, so the rope is stepped with a constant `dt`
//! regardless of the display's refresh rate.
//!
//! ```
//! use strand::time::FrameClock;
//!
//! let mut clock = FrameClock::new().with_fixed_step(0.01);
//! assert_eq!(clock.advance(0.035), 3);
//! assert!((clock.alpha() - 0.5).abs() < 1e-4);
//! ```

use std::time::{Duration, Instant};

/// Default physics step: 60 Hz.
pub const DEFAULT_FIXED_STEP: f32 = 1.0 / 60.0;

/// Frame time above this is clamped, so a stalled window does not trigger
/// a burst of catch-up steps.
const MAX_FRAME_TIME: f32 = 0.25;

#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    elapsed: f32,
    delta: f32,
    frame_count: u64,
    step_count: u64,
    accumulator: f32,
    fixed_step: f32,
    max_steps: u32,
    time_scale: f32,
    paused: bool,
    fps: f32,
    fps_frames: u64,
    fps_window: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            elapsed: 0.0,
            delta: 0.0,
            frame_count: 0,
            step_count: 0,
            accumulator: 0.0,
            fixed_step: DEFAULT_FIXED_STEP,
            max_steps: 8,
            time_scale: 1.0,
            paused: false,
            fps: 0.0,
            fps_frames: 0,
            fps_window: 0.0,
        }
    }

    /// Size of one physics step in seconds. Non-positive values are ignored.
    pub fn with_fixed_step(mut self, step: f32) -> Self {
        if step > 0.0 && step.is_finite() {
            self.fixed_step = step;
        }
        self
    }

    /// Upper bound on steps released by a single frame.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Measure wall-clock time since the previous call and advance by it.
    ///
    /// Returns the number of fixed steps to run this frame.
    pub fn tick(&mut self) -> u32 {
        let now = Instant::now();
        let raw = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.advance(raw)
    }

    /// Advance by `frame_time` seconds of wall-clock time.
    ///
    /// Returns the number of fixed steps to run this frame.
    pub fn advance(&mut self, frame_time: f32) -> u32 {
        let frame_time = if frame_time.is_finite() {
            frame_time.clamp(0.0, MAX_FRAME_TIME)
        } else {
            0.0
        };

        self.frame_count += 1;
        self.fps_frames += 1;
        self.fps_window += frame_time;
        if self.fps_window >= 0.5 {
            self.fps = self.fps_frames as f32 / self.fps_window;
            self.fps_frames = 0;
            self.fps_window = 0.0;
        }

        if self.paused {
            self.delta = 0.0;
            return 0;
        }

        self.delta = frame_time * self.time_scale;
        self.elapsed += self.delta;
        self.accumulator += self.delta;

        let mut steps = 0;
        while self.accumulator >= self.fixed_step && steps < self.max_steps {
            self.accumulator -= self.fixed_step;
            steps += 1;
        }
        if steps == self.max_steps {
            // Drop the backlog instead of spiralling.
            self.accumulator = self.accumulator.min(self.fixed_step);
        }
        self.step_count += u64::from(steps);
        steps
    }

    /// Fraction of a step left in the accumulator, in `0.0..1.0`.
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.fixed_step
    }

    #[inline]
    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    /// Simulated seconds since start, excluding paused time.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Scaled duration of the last frame.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn delta_duration(&self) -> Duration {
        Duration::from_secs_f32(self.delta)
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Fixed steps released since start.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.step_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// `1.0` is real time. Negative values clamp to zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
