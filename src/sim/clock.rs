//! Frame clock
//!
//! Owns the monotonically increasing frame id and elapsed simulated time, and
//! the fixed-timestep accumulator that turns variable render deltas into
//! whole simulation steps.

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_SUBSTEPS, SIM_DT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameClock {
    /// Frames simulated so far
    frame: u64,
    /// Simulated seconds
    elapsed: f64,
    /// Unsimulated render time carried between calls
    accumulator: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one frame of `dt` seconds, returning the new frame id
    pub fn advance(&mut self, dt: f32) -> u64 {
        self.frame += 1;
        self.elapsed += dt as f64;
        self.frame
    }

    /// Bank a render delta and return how many fixed steps to run now.
    ///
    /// Deltas are clamped to 0.1 s (NaN counts as 0) and at most
    /// [`MAX_SUBSTEPS`] steps are released per call to prevent a spiral of death.
    pub fn accumulate(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.max(0.0).min(0.1);
        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            steps += 1;
        }
        if steps == MAX_SUBSTEPS {
            // Drop the backlog rather than carry it into the next frame
            self.accumulator = self.accumulator.min(SIM_DT);
        }
        steps
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
