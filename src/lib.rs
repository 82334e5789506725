//! Planetoid Rush - real-time simulation kernel for an asteroids-style arcade game
//!
//! Core modules:
//! - `sim`: Frame-driven simulation (entities, pools, spatial hash, scheduler, missions)
//! - `settings`: Data-driven tunables
//! - `error`: Precondition and configuration errors

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{KernelError, Result};
pub use settings::Settings;

use glam::Vec2;

/// Kernel configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one step per rendered frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// Entries in the sine/cosine lookup tables
    pub const TRIG_TABLE_SIZE: usize = 4096;

    /// Planetoids spawned by the first mission before scaling
    pub const BASE_PLANETOIDS: u32 = 4;
}

/// Wrap a position onto a torus of the given size
#[inline]
pub fn wrap_position(pos: Vec2, size: Vec2) -> Vec2 {
    Vec2::new(pos.x.rem_euclid(size.x), pos.y.rem_euclid(size.y))
}

/// Normalized angle to [0, 2π)
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    angle.rem_euclid(std::f32::consts::TAU)
}
