//! Discrete simulation events
//!
//! Raised during a frame, handled by the active game mode, then published to
//! outside collaborators (HUD, audio, achievements).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{EntityId, EntityKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// An entity was destroyed in play (expiry does not count)
    EntityDestroyed {
        id: EntityId,
        kind: EntityKind,
        pos: Vec2,
    },
    /// A player's ship was destroyed; `lives` is what remains
    ShipLost { player: usize, lives: i32 },
    /// A player has no lives left
    PlayerLivesExhausted { player: usize },
    /// Command: move on to the next mission
    MissionAdvanceRequested,
    /// A mission's entities have spawned
    MissionStarted { index: usize, name: String },
    GameOver,
}
