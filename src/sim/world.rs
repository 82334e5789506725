//! World state
//!
//! Everything one simulation owns: settings, RNG/trig context, clock, entity
//! store, pools, spatial hash, players, mission cycle, phase and events. It is
//! the context every scheduled action receives.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::clock::FrameClock;
use super::context::SimContext;
use super::entity::{
    BulletState, DebrisState, Entity, EntityId, EntityKind, Payload, PlanetoidSize,
    PlanetoidState, SaucerState, ShipState,
};
use super::event::GameEvent;
use super::mission::{ColorScheme, MissionControl};
use super::pool::PoolRegistry;
use super::scheduler::{ActionId, Scheduler};
use super::spatial::SpatialHash;
use super::store::EntityStore;
use crate::error::Result;
use crate::settings::Settings;

/// Planetoids never spawn closer than this to a ship
const SAFE_SPAWN_DISTANCE: f32 = 150.0;
const SAFE_SPAWN_ATTEMPTS: u32 = 12;
/// Outline vertices per planetoid
const OUTLINE_POINTS: usize = 10;

/// Game flow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    NotStarted,
    Running,
    /// Between missions: next spawn and unlock are scheduled
    MissionTransition,
    Over,
}

/// Intent for one player, applied on the next frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub thrust: bool,
    /// Turn direction, -1 (left) to 1 (right)
    pub turn: f32,
    /// Held: fires whenever the cooldown allows
    pub fire: bool,
    /// One-shot
    pub shield: bool,
    /// One-shot
    pub hyperspace: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub index: usize,
    pub lives: i32,
    pub alive: bool,
    pub score: u64,
    pub energy: u32,
    pub ship: Option<EntityId>,
    pub input: PlayerInput,
    /// Pending shield expiry, cancelled when the shield is re-cast
    pub shield_expiry: Option<ActionId>,
}

impl Player {
    pub fn new(index: usize, lives: i32, energy: u32) -> Self {
        Self {
            index,
            lives,
            alive: false,
            score: 0,
            energy,
            ship: None,
            input: PlayerInput::default(),
            shield_expiry: None,
        }
    }

    /// Out of the game for good
    pub fn is_finished(&self) -> bool {
        !self.alive && self.lives <= 0
    }
}

/// Complete simulation state
#[derive(Debug)]
pub struct World {
    pub settings: Settings,
    pub ctx: SimContext,
    pub clock: FrameClock,
    pub store: EntityStore,
    pub pools: PoolRegistry,
    pub spatial: SpatialHash,
    pub players: Vec<Player>,
    pub missions: MissionControl,
    pub phase: GamePhase,
    /// Current (possibly mid-fade) palette
    pub palette: ColorScheme,
    /// Registered game-over check, queued when a player runs out of lives
    pub over_check: Option<ActionId>,
    /// Raised this frame, not yet handled
    pending: Vec<GameEvent>,
    /// Handled, waiting for collaborators
    published: Vec<GameEvent>,
    /// Entities on their way back to the pools
    reclaimed: Vec<Entity>,
    /// Reused id buffer for whole-store sweeps
    scratch: Vec<EntityId>,
}

impl World {
    pub fn new(settings: Settings, seed: u64) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            ctx: SimContext::new(seed),
            clock: FrameClock::new(),
            store: EntityStore::new(),
            pools: PoolRegistry::with_defaults(settings.pool_capacity),
            spatial: SpatialHash::new(settings.field(), settings.bucket_span),
            players: Vec::new(),
            missions: MissionControl::default(),
            phase: GamePhase::NotStarted,
            palette: ColorScheme::default(),
            over_check: None,
            pending: Vec::new(),
            published: Vec::new(),
            reclaimed: Vec::new(),
            scratch: Vec::new(),
            settings,
        })
    }

    /// Return every entity to its pool and seat `player_count` fresh players
    pub fn reset(&mut self, player_count: usize) {
        self.store.clear(&mut self.reclaimed);
        self.recycle();
        self.spatial.clear();
        self.clock.reset();
        self.ctx.reseed();
        self.players = (0..player_count)
            .map(|i| Player::new(i, self.settings.starting_lives, self.settings.max_energy))
            .collect();
        self.phase = GamePhase::NotStarted;
        self.palette = ColorScheme::default();
        self.over_check = None;
        self.pending.clear();
        self.published.clear();
    }

    fn recycle(&mut self) {
        for entity in self.reclaimed.drain(..) {
            self.pools.add(entity);
        }
    }

    // === Events ===

    pub fn emit(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    /// Take events raised since the last call
    pub fn take_pending(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn publish(&mut self, event: GameEvent) {
        self.published.push(event);
    }

    pub fn drain_published(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.published)
    }

    // === Sweeps ===

    /// Stage removals until [`end_sweep`](Self::end_sweep)
    pub fn begin_sweep(&mut self) {
        self.store.begin_sweep();
    }

    /// Apply staged removals and pool the removed entities
    pub fn end_sweep(&mut self) {
        self.store.end_sweep(&mut self.reclaimed);
        self.recycle();
    }

    /// Snapshot every live id (for sweeps that mutate the store)
    pub fn take_ids(&mut self) -> Vec<EntityId> {
        let mut ids = std::mem::take(&mut self.scratch);
        ids.clear();
        ids.extend(self.store.iter_all().map(|(id, _)| id));
        ids
    }

    /// Hand a buffer from [`take_ids`](Self::take_ids) back for reuse
    pub fn return_ids(&mut self, ids: Vec<EntityId>) {
        self.scratch = ids;
    }

    // === Lifecycle ===

    /// Take an instance from the pool, let `init` set it up and make it live
    pub fn spawn(&mut self, kind: EntityKind, init: impl FnOnce(&mut Entity)) -> Result<EntityId> {
        let mut entity = self.pools.get(kind)?;
        init(&mut entity);
        debug_assert_eq!(entity.kind(), kind, "spawn init changed the entity kind");
        Ok(self.store.add(entity))
    }

    /// Remove without raising an event (expiry, leaving the field)
    pub fn discard(&mut self, id: EntityId) {
        if let Some(entity) = self.store.remove(id) {
            self.pools.add(entity);
        }
    }

    /// Destroy an entity in play, raising `EntityDestroyed`.
    ///
    /// Ships also cost their player a life. Returns false if `id` was not live.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.store.get(id) else {
            return false;
        };
        let (kind, pos) = (entity.kind(), entity.pos);
        let pilot = entity.ship().map(|ship| ship.player);

        if let Some(entity) = self.store.remove(id) {
            self.pools.add(entity);
        }
        self.emit(GameEvent::EntityDestroyed { id, kind, pos });

        if let Some(index) = pilot {
            self.lose_ship(index);
        }
        true
    }

    fn lose_ship(&mut self, index: usize) {
        let Some(player) = self.players.get_mut(index) else {
            return;
        };
        player.alive = false;
        player.ship = None;
        player.lives -= 1;
        let lives = player.lives;
        log::debug!("Player {index} lost a ship ({lives} lives left)");
        self.emit(GameEvent::ShipLost {
            player: index,
            lives,
        });
        if lives <= 0 {
            self.emit(GameEvent::PlayerLivesExhausted { player: index });
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.store.get_mut(id)
    }

    // === Spawners ===

    /// Put a player's ship at the field centre, facing up
    pub fn spawn_ship(&mut self, index: usize) -> Result<Option<EntityId>> {
        if index >= self.players.len() {
            return Ok(None);
        }
        let count = self.players.len() as f32;
        let field = self.settings.field();
        // Spread multiple players across the middle row
        let x = field.x * (index as f32 + 1.0) / (count + 1.0);
        let pos = Vec2::new(x, field.y * 0.5);
        let radius = self.settings.ship_radius;

        let id = self.spawn(EntityKind::Ship, |e| {
            e.pos = pos;
            e.vel = Vec2::ZERO;
            e.angle = -std::f32::consts::FRAC_PI_2;
            e.radius = radius;
            e.payload = Payload::Ship(ShipState {
                player: index,
                fire_cooldown: 0,
                shielded: false,
                hyperspace_locked: false,
            });
        })?;
        let player = &mut self.players[index];
        player.ship = Some(id);
        player.alive = true;
        Ok(Some(id))
    }

    /// Bring a player back if they still have lives
    pub fn respawn(&mut self, index: usize) -> Result<()> {
        let eligible = self
            .players
            .get(index)
            .is_some_and(|p| !p.alive && p.lives > 0);
        if eligible && self.phase != GamePhase::Over {
            self.spawn_ship(index)?;
        }
        Ok(())
    }

    pub fn spawn_bullet(&mut self, pos: Vec2, vel: Vec2, owner: Option<usize>) -> Result<EntityId> {
        let (radius, ttl) = (self.settings.bullet_radius, self.settings.bullet_ttl_frames);
        self.spawn(EntityKind::Bullet, |e| {
            e.pos = pos;
            e.vel = vel;
            e.angle = vel.y.atan2(vel.x);
            e.radius = radius;
            e.payload = Payload::Bullet(BulletState { owner, ttl });
        })
    }

    pub fn spawn_planetoid(&mut self, size: PlanetoidSize, pos: Vec2, vel: Vec2) -> Result<EntityId> {
        let radius = self.settings.planetoid_radius[size.index()];
        let mut entity = self.pools.get(EntityKind::Planetoid)?;
        entity.pos = pos;
        entity.vel = vel;
        entity.angle = self.ctx.angle();
        entity.radius = radius;

        // Reuse the pooled outline allocation when there is one
        let placeholder = Payload::Debris(DebrisState::default());
        let mut outline = match std::mem::replace(&mut entity.payload, placeholder) {
            Payload::Planetoid(state) => state.outline,
            _ => Vec::with_capacity(OUTLINE_POINTS),
        };
        outline.clear();
        for i in 0..OUTLINE_POINTS {
            let theta = i as f32 * std::f32::consts::TAU / OUTLINE_POINTS as f32;
            let r = radius * self.ctx.range(0.75, 1.1);
            outline.push(self.ctx.heading(theta) * r);
        }
        let spin = self.ctx.range(-1.0, 1.0);
        entity.payload = Payload::Planetoid(PlanetoidState { size, spin, outline });
        Ok(self.store.add(entity))
    }

    /// Large planetoid at a random point away from every ship
    pub fn spawn_planetoid_safe(&mut self, size: PlanetoidSize) -> Result<EntityId> {
        let field = self.settings.field();
        let mut pos = self.ctx.point_in(field);
        for _ in 0..SAFE_SPAWN_ATTEMPTS {
            let clear = self
                .store
                .iter(EntityKind::Ship)
                .all(|(_, ship)| ship.pos.distance(pos) >= SAFE_SPAWN_DISTANCE);
            if clear {
                break;
            }
            pos = self.ctx.point_in(field);
        }
        let vel = self.ctx.direction() * self.settings.planetoid_speed;
        self.spawn_planetoid(size, pos, vel)
    }

    pub fn spawn_saucer(&mut self, pos: Vec2, vel: Vec2) -> Result<EntityId> {
        let (radius, cooldown) = (self.settings.saucer_radius, self.settings.saucer_fire_interval);
        self.spawn(EntityKind::Saucer, |e| {
            e.pos = pos;
            e.vel = vel;
            e.angle = 0.0;
            e.radius = radius;
            e.payload = Payload::Saucer(SaucerState {
                fire_cooldown: cooldown,
            });
        })
    }

    /// Saucer entering from the left or right edge at a random height
    pub fn spawn_saucer_random(&mut self) -> Result<EntityId> {
        let field = self.settings.field();
        let from_left = self.ctx.chance(0.5);
        let y = self.ctx.range(0.0, field.y);
        let radius = self.settings.saucer_radius;
        let (x, dir) = if from_left { (-radius, 1.0) } else { (field.x + radius, -1.0) };
        let drift = self.ctx.range(-0.3, 0.3);
        let vel = Vec2::new(dir, drift).normalize() * self.settings.saucer_speed;
        self.spawn_saucer(Vec2::new(x, y), vel)
    }

    /// Scatter debris from an explosion
    pub fn spawn_debris(&mut self, center: Vec2, count: u32) -> Result<()> {
        let (life, speed) = (self.settings.debris_life_frames, self.settings.debris_speed);
        for _ in 0..count {
            let dir = self.ctx.direction();
            let vel = dir * speed * self.ctx.range(0.3, 1.0);
            self.spawn(EntityKind::Debris, |e| {
                e.pos = center;
                e.vel = vel;
                e.angle = 0.0;
                e.radius = 1.0;
                e.payload = Payload::Debris(DebrisState { life });
            })?;
        }
        Ok(())
    }

    // === Gameplay helpers ===

    /// Destroy a planetoid, split it into fragments and credit `scorer`
    pub fn shatter(&mut self, id: EntityId, scorer: Option<usize>) -> Result<()> {
        let Some(entity) = self.store.get(id) else {
            return Ok(());
        };
        let Some(planetoid) = entity.planetoid() else {
            return Ok(());
        };
        let (size, pos, vel) = (planetoid.size, entity.pos, entity.vel);

        let points = self.settings.planetoid_points[size.index()];
        self.destroy(id);
        self.award(scorer, points);
        self.spawn_debris(pos, self.settings.debris_count / 2)?;

        if let Some(fragment) = size.split() {
            let speed = self.settings.planetoid_speed * 1.5;
            for _ in 0..2 {
                let dir = self.ctx.direction();
                self.spawn_planetoid(fragment, pos, vel * 0.5 + dir * speed)?;
            }
        }
        Ok(())
    }

    /// Destroy a saucer with an explosion and credit `scorer`
    pub fn blast_saucer(&mut self, id: EntityId, scorer: Option<usize>) -> Result<()> {
        let Some(pos) = self.store.get(id).map(|e| e.pos) else {
            return Ok(());
        };
        let points = self.settings.saucer_points;
        self.destroy(id);
        self.award(scorer, points);
        self.spawn_debris(pos, self.settings.debris_count)
    }

    /// Destroy a ship with an explosion
    pub fn wreck_ship(&mut self, id: EntityId) -> Result<()> {
        let Some(pos) = self.store.get(id).map(|e| e.pos) else {
            return Ok(());
        };
        self.destroy(id);
        self.spawn_debris(pos, self.settings.debris_count)
    }

    pub fn award(&mut self, player: Option<usize>, points: u64) {
        if let Some(player) = player.and_then(|i| self.players.get_mut(i)) {
            player.score += points;
        }
    }

    /// Ship of a player, if it is live
    pub fn ship_of(&self, player: usize) -> Option<EntityId> {
        self.players
            .get(player)
            .and_then(|p| p.ship)
            .filter(|id| self.store.is_live(*id))
    }

    pub fn all_players_finished(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(Player::is_finished)
    }

    /// Ship count alive right now (used by interval suppliers)
    pub fn living_players(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    pub fn set_input(&mut self, player: usize, input: PlayerInput) {
        if let Some(p) = self.players.get_mut(player) {
            p.input = input;
        }
    }
}

/// Registered action: end the game once every player is finished
pub fn register_over_check(world: &mut World, sched: &mut Scheduler<World>) {
    let id = sched.register(|w: &mut World, _| {
        if w.phase != GamePhase::Over && w.all_players_finished() {
            log::info!("All players out of lives, game over at frame {}", w.clock.frame());
            w.phase = GamePhase::Over;
            w.emit(GameEvent::GameOver);
        }
    });
    world.over_check = Some(id);
}
