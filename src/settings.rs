//! Simulation tunables
//!
//! Read-only for the duration of a mission. Loaded from JSON when a file is
//! supplied, otherwise the defaults below are used.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

/// Largest spatial grid the kernel will allocate
pub const MAX_BUCKETS: usize = 1 << 20;

/// Numeric tunables consumed by the kernel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Play field ===
    pub field_width: f32,
    pub field_height: f32,
    /// Width of one spatial hash bucket
    pub bucket_span: f32,
    /// Instances retained per entity kind
    pub pool_capacity: usize,

    // === Players ===
    pub starting_lives: i32,
    pub ship_radius: f32,
    /// Thrust acceleration (units/s²)
    pub ship_thrust: f32,
    /// Turn rate (radians/s)
    pub ship_turn_rate: f32,
    pub ship_max_speed: f32,
    /// Velocity multiplier applied every frame
    pub ship_drag: f32,
    pub fire_cooldown_frames: u32,
    pub respawn_delay_frames: u32,

    // === Abilities ===
    pub max_energy: u32,
    pub shield_cost: u32,
    pub shield_frames: u32,
    pub hyperspace_cost: u32,
    pub hyperspace_cooldown_frames: u32,
    /// Base frames between energy ticks (scaled by player count)
    pub energy_regen_interval: u32,

    // === Projectiles ===
    pub bullet_speed: f32,
    pub bullet_radius: f32,
    pub bullet_ttl_frames: u32,

    // === Planetoids (large, medium, small) ===
    pub planetoid_radius: [f32; 3],
    pub planetoid_speed: f32,
    pub planetoid_points: [u64; 3],

    // === Saucers ===
    pub saucer_radius: f32,
    pub saucer_speed: f32,
    pub saucer_fire_interval: u32,
    pub saucer_spawn_interval: u32,
    pub saucer_points: u64,

    // === Explosions ===
    pub debris_count: u32,
    pub debris_life_frames: u32,
    pub debris_speed: f32,

    // === Missions ===
    /// Frames to let in-flight destructions settle before checking for a clear field
    pub settle_frames: u32,
    /// Base delay between a mission ending and the next one spawning
    pub transition_frames: u32,
    pub crossfade_frames: u32,

    // === Modes ===
    pub time_trial_frames: u32,
    pub survival_spawn_interval: u32,
    pub survival_advance_frames: u32,
    pub control_zone_radius: f32,
    /// Control gained per ship per frame inside the zone
    pub control_rate: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            field_width: 1000.0,
            field_height: 1000.0,
            bucket_span: 50.0,
            pool_capacity: 256,

            starting_lives: 3,
            ship_radius: 12.0,
            ship_thrust: 300.0,
            ship_turn_rate: 4.5,
            ship_max_speed: 360.0,
            ship_drag: 0.99,
            fire_cooldown_frames: 8,
            respawn_delay_frames: 120,

            max_energy: 100,
            shield_cost: 30,
            shield_frames: 180,
            hyperspace_cost: 20,
            hyperspace_cooldown_frames: 90,
            energy_regen_interval: 20,

            bullet_speed: 540.0,
            bullet_radius: 2.0,
            bullet_ttl_frames: 60,

            planetoid_radius: [40.0, 22.0, 12.0],
            planetoid_speed: 70.0,
            planetoid_points: [20, 50, 100],

            saucer_radius: 16.0,
            saucer_speed: 120.0,
            saucer_fire_interval: 90,
            saucer_spawn_interval: 600,
            saucer_points: 200,

            debris_count: 8,
            debris_life_frames: 30,
            debris_speed: 150.0,

            settle_frames: 10,
            transition_frames: 90,
            crossfade_frames: 60,

            time_trial_frames: 60 * 60 * 3,
            survival_spawn_interval: 240,
            survival_advance_frames: 1800,
            control_zone_radius: 120.0,
            control_rate: 0.002,
        }
    }
}

impl Settings {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject values the kernel cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.field_width.is_finite() && self.field_height.is_finite())
            || !(self.field_width > 0.0 && self.field_height > 0.0)
        {
            return Err(KernelError::InvalidSettings(format!(
                "field must have positive size, got {}x{}",
                self.field_width, self.field_height
            )));
        }
        if !(self.bucket_span > 0.0) {
            return Err(KernelError::InvalidSettings(format!(
                "bucket_span must be positive, got {}",
                self.bucket_span
            )));
        }
        let cols = (f64::from(self.field_width) / f64::from(self.bucket_span)).ceil();
        let rows = (f64::from(self.field_height) / f64::from(self.bucket_span)).ceil();
        if cols * rows > MAX_BUCKETS as f64 {
            return Err(KernelError::InvalidSettings(format!(
                "bucket_span {} makes a {cols}x{rows} grid, limit is {MAX_BUCKETS} buckets",
                self.bucket_span
            )));
        }
        if self.crossfade_frames == 0 {
            return Err(KernelError::InvalidSettings(
                "crossfade_frames must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Play field size as a vector
    pub fn field(&self) -> glam::Vec2 {
        glam::Vec2::new(self.field_width, self.field_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = Settings::from_json(r#"{ "bucket_span": 25.0, "starting_lives": 5 }"#)
            .expect("valid settings");
        assert_eq!(settings.bucket_span, 25.0);
        assert_eq!(settings.starting_lives, 5);
        assert_eq!(settings.field_width, Settings::default().field_width);
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let err = Settings::from_json(r#"{ "bucket_span": 1e-6 }"#).unwrap_err();
        assert!(matches!(err, KernelError::InvalidSettings(_)));
        let err = Settings::from_json(r#"{ "field_width": 1e9, "bucket_span": 1.0 }"#).unwrap_err();
        assert!(matches!(err, KernelError::InvalidSettings(_)));
        assert!(Settings::from_json(r#"{ "bucket_span": 2.0 }"#).is_ok());
    }

    #[test]
    fn test_rejects_zero_bucket_span() {
        let err = Settings::from_json(r#"{ "bucket_span": 0.0 }"#).unwrap_err();
        assert!(matches!(err, KernelError::InvalidSettings(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = Settings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, KernelError::Json(_)));
    }
}
