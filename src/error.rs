//! Kernel error type
//!
//! Only precondition violations are errors. Empty results (no neighbours,
//! nothing left to spawn) are plain empty iterators or no-ops.

use thiserror::Error;

use crate::sim::EntityKind;

/// Caller bugs and configuration mistakes detected by the kernel
#[derive(Debug, Error)]
pub enum KernelError {
    /// An animation whose step can never reach its target
    #[error("animation from {from} to {to} never advances (step {step})")]
    ZeroStep { from: f32, to: f32, step: f32 },

    /// A random pick (or similar) was asked of an empty collection
    #[error("cannot pick from empty {what}")]
    EmptyCollection { what: &'static str },

    /// Mission ids are 1-based and must exist in the mode's list
    #[error("mission {index} does not exist (mode has {len} missions)")]
    UnknownMission { index: usize, len: usize },

    #[error("game mode has no missions configured")]
    NoMissions,

    #[error("unknown game mode {0:?}")]
    UnknownMode(String),

    /// No pool factory was registered for this kind
    #[error("no pool factory registered for {0:?}")]
    UnregisteredKind(EntityKind),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KernelError>;
