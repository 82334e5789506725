//! Simulation context
//!
//! Seeded RNG and trigonometric lookup tables, built once when the world is
//! created and passed around explicitly.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::consts::TRIG_TABLE_SIZE;
use crate::error::{KernelError, Result};

/// Random source and precomputed tables for one simulation
#[derive(Debug, Clone)]
pub struct SimContext {
    /// Run seed for reproducibility
    pub seed: u64,
    rng: Pcg32,
    sin_table: Vec<f32>,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        let step = std::f32::consts::TAU / TRIG_TABLE_SIZE as f32;
        let sin_table = (0..TRIG_TABLE_SIZE).map(|i| (i as f32 * step).sin()).collect();
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            sin_table,
        }
    }

    /// Restart the random sequence from the run seed
    pub fn reseed(&mut self) {
        self.rng = Pcg32::seed_from_u64(self.seed);
    }

    #[inline]
    fn table_index(angle: f32) -> usize {
        let turns = angle.rem_euclid(std::f32::consts::TAU) / std::f32::consts::TAU;
        (turns * TRIG_TABLE_SIZE as f32) as usize % TRIG_TABLE_SIZE
    }

    /// Table sine
    #[inline]
    pub fn sin(&self, angle: f32) -> f32 {
        self.sin_table[Self::table_index(angle)]
    }

    /// Table cosine (quarter-turn offset into the sine table)
    #[inline]
    pub fn cos(&self, angle: f32) -> f32 {
        let i = (Self::table_index(angle) + TRIG_TABLE_SIZE / 4) % TRIG_TABLE_SIZE;
        self.sin_table[i]
    }

    /// Unit vector for a heading
    #[inline]
    pub fn heading(&self, angle: f32) -> Vec2 {
        Vec2::new(self.cos(angle), self.sin(angle))
    }

    /// Uniform float in [min, max); returns `min` for an empty range
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Uniform angle in [0, 2π)
    pub fn angle(&mut self) -> f32 {
        self.range(0.0, std::f32::consts::TAU)
    }

    /// Random unit vector
    pub fn direction(&mut self) -> Vec2 {
        let angle = self.angle();
        self.heading(angle)
    }

    /// True with the given probability
    pub fn chance(&mut self, probability: f32) -> bool {
        self.rng.random::<f32>() < probability
    }

    /// Uniform point inside a `size` rectangle anchored at the origin
    pub fn point_in(&mut self, size: Vec2) -> Vec2 {
        Vec2::new(self.range(0.0, size.x), self.range(0.0, size.y))
    }

    /// Pick a random element; picking from an empty slice is a caller bug
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T> {
        if items.is_empty() {
            return Err(KernelError::EmptyCollection { what: "slice" });
        }
        let i = self.rng.random_range(0..items.len());
        Ok(&items[i])
    }
}
