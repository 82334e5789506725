//! Entity model
//!
//! Every simulated object is an [`Entity`]: shared kinematics plus a payload
//! whose variant is the entity's kind. The kind drives store buckets, pool
//! selection and collision dispatch.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

/// Concrete entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Ship,
    Bullet,
    Planetoid,
    Saucer,
    Debris,
}

impl EntityKind {
    /// Number of kinds, for kind-indexed tables
    pub const COUNT: usize = 5;

    pub const ALL: [EntityKind; Self::COUNT] = [
        EntityKind::Ship,
        EntityKind::Bullet,
        EntityKind::Planetoid,
        EntityKind::Saucer,
        EntityKind::Debris,
    ];

    /// Dense index for kind-indexed tables
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ship => "ship",
            EntityKind::Bullet => "bullet",
            EntityKind::Planetoid => "planetoid",
            EntityKind::Saucer => "saucer",
            EntityKind::Debris => "debris",
        }
    }
}

new_key_type! {
    /// Handle to a live entity. Stale handles never resolve after destruction.
    pub struct EntityId;
}

/// Planetoid size class (large splits into medium, medium into small)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanetoidSize {
    Large,
    Medium,
    Small,
}

impl PlanetoidSize {
    /// Index into size-keyed settings arrays
    pub fn index(self) -> usize {
        match self {
            PlanetoidSize::Large => 0,
            PlanetoidSize::Medium => 1,
            PlanetoidSize::Small => 2,
        }
    }

    /// The size fragments take when this planetoid breaks
    pub fn split(self) -> Option<PlanetoidSize> {
        match self {
            PlanetoidSize::Large => Some(PlanetoidSize::Medium),
            PlanetoidSize::Medium => Some(PlanetoidSize::Small),
            PlanetoidSize::Small => None,
        }
    }
}

/// Per-ship state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipState {
    pub player: usize,
    pub fire_cooldown: u32,
    pub shielded: bool,
    /// Hyperspace unavailable until the cooldown action clears this
    pub hyperspace_locked: bool,
}

/// Per-bullet state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulletState {
    /// Owning player; `None` for saucer fire
    pub owner: Option<usize>,
    pub ttl: u32,
}

/// Per-planetoid state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetoidState {
    pub size: PlanetoidSize,
    /// Spin in radians/s
    pub spin: f32,
    /// Outline offsets for rendering; reused across pooled lifetimes
    pub outline: Vec<Vec2>,
}

/// Per-saucer state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaucerState {
    pub fire_cooldown: u32,
}

/// Per-debris state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebrisState {
    pub life: u32,
}

/// Kind-specific payload; the variant is the entity's kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    Ship(ShipState),
    Bullet(BulletState),
    Planetoid(PlanetoidState),
    Saucer(SaucerState),
    Debris(DebrisState),
}

/// A physical object in the play field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Heading in radians
    pub angle: f32,
    pub radius: f32,
    pub payload: Payload,
}

impl Entity {
    /// Fresh, zeroed instance of the given kind (pool factory output)
    pub fn blank(kind: EntityKind) -> Self {
        let payload = match kind {
            EntityKind::Ship => Payload::Ship(ShipState::default()),
            EntityKind::Bullet => Payload::Bullet(BulletState::default()),
            EntityKind::Planetoid => Payload::Planetoid(PlanetoidState {
                size: PlanetoidSize::Large,
                spin: 0.0,
                outline: Vec::with_capacity(12),
            }),
            EntityKind::Saucer => Payload::Saucer(SaucerState::default()),
            EntityKind::Debris => Payload::Debris(DebrisState::default()),
        };
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            angle: 0.0,
            radius: 0.0,
            payload,
        }
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        match self.payload {
            Payload::Ship(_) => EntityKind::Ship,
            Payload::Bullet(_) => EntityKind::Bullet,
            Payload::Planetoid(_) => EntityKind::Planetoid,
            Payload::Saucer(_) => EntityKind::Saucer,
            Payload::Debris(_) => EntityKind::Debris,
        }
    }

    /// Circle overlap test against another entity
    #[inline]
    pub fn overlaps(&self, other: &Entity) -> bool {
        let reach = self.radius + other.radius;
        self.pos.distance_squared(other.pos) <= reach * reach
    }

    pub fn ship(&self) -> Option<&ShipState> {
        match &self.payload {
            Payload::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn ship_mut(&mut self) -> Option<&mut ShipState> {
        match &mut self.payload {
            Payload::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn bullet(&self) -> Option<&BulletState> {
        match &self.payload {
            Payload::Bullet(bullet) => Some(bullet),
            _ => None,
        }
    }

    pub fn planetoid(&self) -> Option<&PlanetoidState> {
        match &self.payload {
            Payload::Planetoid(planetoid) => Some(planetoid),
            _ => None,
        }
    }
}
