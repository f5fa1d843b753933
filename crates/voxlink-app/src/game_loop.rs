//! Fixed-timestep loop.
//!
//! Decouples simulation steps (fixed 30 Hz) from the rate the host loop runs
//! at, using an accumulator. Wall-clock measurement lives in
//! [`GameLoop::tick`]; [`GameLoop::advance`] takes an explicit frame time so
//! the stepping logic is deterministic under test.

use std::time::Instant;
use tracing::warn;

/// Fixed simulation timestep: 30 Hz.
pub const FIXED_DT: f64 = 1.0 / 30.0;

/// Frame time clamp. A longer stall is absorbed as slowdown instead of a
/// burst of catch-up steps.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Fixed-timestep loop state.
pub struct GameLoop {
    previous_time: Instant,
    accumulator: f64,
    total_sim_time: f64,
    frame_count: u64,
    update_count: u64,
}

impl GameLoop {
    /// Creates a loop starting from the current instant.
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            accumulator: 0.0,
            total_sim_time: 0.0,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Measures the time since the previous call and runs the due steps.
    /// See [`advance`](Self::advance).
    pub fn tick<E>(&mut self, step: impl FnMut(f64, f64) -> Result<(), E>) -> Result<f64, E> {
        let current_time = Instant::now();
        let frame_time = current_time
            .duration_since(self.previous_time)
            .as_secs_f64();
        self.previous_time = current_time;
        self.advance(frame_time, step)
    }

    /// Runs `step(FIXED_DT, total_sim_time)` zero or more times for
    /// `frame_time` seconds of elapsed time, then returns the interpolation
    /// alpha in `[0.0, 1.0)`. Stops at the first step error; the failed step
    /// is not counted.
    pub fn advance<E>(
        &mut self,
        frame_time: f64,
        mut step: impl FnMut(f64, f64) -> Result<(), E>,
    ) -> Result<f64, E> {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }

        self.accumulator += frame_time;
        self.frame_count += 1;

        while self.accumulator >= FIXED_DT {
            step(FIXED_DT, self.total_sim_time)?;
            self.total_sim_time += FIXED_DT;
            self.accumulator -= FIXED_DT;
            self.update_count += 1;
        }

        Ok(self.alpha())
    }

    /// Current interpolation alpha.
    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / FIXED_DT
        } else {
            0.0
        }
    }

    /// Number of `tick`/`advance` calls.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Number of simulation steps executed.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Total simulated time in seconds.
    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new()
    }
}
