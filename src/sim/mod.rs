//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (see [`context`])
//! - Stable iteration order (store buckets, sorted spatial queries)
//! - No rendering or platform dependencies

pub mod clock;
pub mod collision;
pub mod context;
pub mod entity;
pub mod event;
pub mod game;
pub mod mission;
pub mod mode;
pub mod pool;
pub mod reactions;
pub mod scheduler;
pub mod spatial;
pub mod store;
pub mod tick;
pub mod world;

pub use clock::FrameClock;
pub use collision::{CollisionRegistry, Reaction};
pub use context::SimContext;
pub use entity::{Entity, EntityId, EntityKind, Payload, PlanetoidSize};
pub use event::GameEvent;
pub use game::{Game, Hud};
pub use mission::{ColorScheme, Mission, MissionControl, SpawnPolicy};
pub use mode::{GameMode, ModeKind};
pub use pool::{Pool, PoolRegistry};
pub use scheduler::{ActionId, QueueStats, Scheduler};
pub use spatial::SpatialHash;
pub use store::EntityStore;
pub use world::{GamePhase, Player, PlayerInput, World};
