//! Game modes
//!
//! A mode supplies the mission list and reacts to frame hooks and events.
//! The classic reactions are free functions so other modes can build on them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, EntityKind, PlanetoidSize};
use super::event::GameEvent;
use super::mission::{ColorScheme, Mission, SpawnPolicy, next_mission};
use super::scheduler::Scheduler;
use super::world::{GamePhase, World};
use crate::consts::BASE_PLANETOIDS;
use crate::error::{KernelError, Result};
use crate::settings::Settings;

/// Behavior of one game mode
pub trait GameMode: fmt::Debug {
    fn kind(&self) -> ModeKind;

    /// Ordered missions this mode cycles through
    fn missions(&self, settings: &Settings) -> Vec<Mission> {
        classic_missions(settings)
    }

    /// Mode-specific setup once the world is reset and ships are placed
    fn start_do(&mut self, _world: &mut World, _sched: &mut Scheduler<World>) -> Result<()> {
        Ok(())
    }

    /// Per-frame hook, run after the scheduler
    fn do_loop(&mut self, _world: &mut World, _sched: &mut Scheduler<World>) {}

    fn handle_event(&mut self, world: &mut World, sched: &mut Scheduler<World>, event: &GameEvent) {
        handle_classic_event(world, sched, event);
    }

    /// Mode-specific progress in 0..1 for the HUD (time left, zone control)
    fn progress(&self) -> Option<f32> {
        None
    }
}

/// Available modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeKind {
    Classic,
    TimeTrial,
    Survival,
    AreaControl,
}

impl ModeKind {
    pub const ALL: [ModeKind; 4] = [
        ModeKind::Classic,
        ModeKind::TimeTrial,
        ModeKind::Survival,
        ModeKind::AreaControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeKind::Classic => "classic",
            ModeKind::TimeTrial => "time-trial",
            ModeKind::Survival => "survival",
            ModeKind::AreaControl => "area-control",
        }
    }

    pub fn build(self, settings: &Settings) -> Box<dyn GameMode> {
        match self {
            ModeKind::Classic => Box::new(Classic),
            ModeKind::TimeTrial => Box::new(TimeTrial::new(settings.time_trial_frames)),
            ModeKind::Survival => Box::new(Survival),
            ModeKind::AreaControl => Box::new(AreaControl::default()),
        }
    }
}

impl FromStr for ModeKind {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        ModeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| KernelError::UnknownMode(s.to_string()))
    }
}

// === Classic behavior ===

const DEEP_SPACE: ColorScheme = ColorScheme::new([0.0, 0.0, 0.02], [0.9, 0.9, 1.0], [0.4, 0.8, 1.0]);
const DUST: ColorScheme = ColorScheme::new([0.05, 0.03, 0.0], [1.0, 0.9, 0.7], [1.0, 0.6, 0.2]);
const RAID: ColorScheme = ColorScheme::new([0.0, 0.04, 0.02], [0.7, 1.0, 0.8], [0.2, 1.0, 0.4]);
const RED_GIANT: ColorScheme = ColorScheme::new([0.12, 0.0, 0.0], [1.0, 0.8, 0.8], [1.0, 0.2, 0.1]);

/// Default mission cycle
pub fn classic_missions(_settings: &Settings) -> Vec<Mission> {
    vec![
        Mission::new(
            "First Contact",
            SpawnPolicy::Planetoids { count: BASE_PLANETOIDS },
            DEEP_SPACE,
            1.0,
        ),
        Mission::new(
            "Rubble Belt",
            SpawnPolicy::Planetoids { count: BASE_PLANETOIDS + 2 },
            DUST,
            1.25,
        ),
        Mission::new(
            "Saucer Raid",
            SpawnPolicy::Mixed { planetoids: BASE_PLANETOIDS, saucers: 1 },
            RAID,
            1.5,
        )
        .with_hooks(saucer_raid_init, saucer_raid_dispose),
        Mission::new(
            "Red Giant",
            SpawnPolicy::Planetoids { count: BASE_PLANETOIDS + 4 },
            RED_GIANT,
            2.0,
        ),
    ]
}

fn saucer_raid_init(world: &mut World, sched: &mut Scheduler<World>) {
    let task = sched.every_n(world.settings.saucer_spawn_interval, |w, _| {
        if w.phase != GamePhase::Running {
            return;
        }
        if let Err(err) = w.spawn_saucer_random() {
            log::error!("Saucer reinforcement failed: {err}");
        }
    });
    world.missions.own_task(task);
}

/// Surviving saucers leave with the raid
fn saucer_raid_dispose(world: &mut World, _sched: &mut Scheduler<World>) {
    let saucers = world.store.ids(EntityKind::Saucer).to_vec();
    log::debug!("Saucer raid over, {} saucers withdraw", saucers.len());
    for id in saucers {
        world.discard(id);
    }
}

/// Shared reactions: clearing the target kind advances, lost ships respawn,
/// exhausted players trigger the game-over check
pub fn handle_classic_event(world: &mut World, sched: &mut Scheduler<World>, event: &GameEvent) {
    match *event {
        GameEvent::EntityDestroyed { kind, .. } => {
            if world.missions.current_target() != Some(kind) {
                return;
            }
            // Let destructions already in flight finish before looking
            sched.defer(world.settings.settle_frames, move |w, s| {
                if w.missions.current_target() == Some(kind) && w.store.is_empty(kind) {
                    log::info!("Mission {} cleared", w.missions.current_index());
                    next_mission(w, s);
                }
            });
        }
        GameEvent::ShipLost { player, lives } if lives > 0 => {
            sched.defer(world.settings.respawn_delay_frames, move |w, _| {
                if let Err(err) = w.respawn(player) {
                    log::error!("Respawn of player {player} failed: {err}");
                }
            });
        }
        GameEvent::PlayerLivesExhausted { player } => {
            log::debug!("Player {player} is out of lives");
            if let Some(check) = world.over_check {
                sched.next_frame_action(check);
            }
        }
        GameEvent::MissionAdvanceRequested => next_mission(world, sched),
        _ => {}
    }
}

// === Modes ===

/// Clear the field to advance; play until every life is gone
#[derive(Debug, Default)]
pub struct Classic;

impl GameMode for Classic {
    fn kind(&self) -> ModeKind {
        ModeKind::Classic
    }
}

/// Classic against a frame countdown
#[derive(Debug)]
pub struct TimeTrial {
    total: u32,
    remaining: u32,
}

impl TimeTrial {
    pub fn new(frames: u32) -> Self {
        Self {
            total: frames.max(1),
            remaining: frames.max(1),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl GameMode for TimeTrial {
    fn kind(&self) -> ModeKind {
        ModeKind::TimeTrial
    }

    fn start_do(&mut self, world: &mut World, _sched: &mut Scheduler<World>) -> Result<()> {
        self.total = world.settings.time_trial_frames.max(1);
        self.remaining = self.total;
        Ok(())
    }

    fn do_loop(&mut self, world: &mut World, _sched: &mut Scheduler<World>) {
        if matches!(world.phase, GamePhase::NotStarted | GamePhase::Over) {
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            log::info!("Time is up at frame {}", world.clock.frame());
            world.phase = GamePhase::Over;
            world.emit(GameEvent::GameOver);
        }
    }

    fn progress(&self) -> Option<f32> {
        Some(self.remaining as f32 / self.total as f32)
    }
}

/// Planetoids keep arriving; missions advance on a timer instead of a clear field
#[derive(Debug, Default)]
pub struct Survival;

/// Frames between survival spawns: shorter with more players and harder missions
pub fn survival_interval(world: &World) -> u32 {
    let scale = world.missions.current().map_or(1.0, |m| m.scale);
    let crowd = 1.0 + 0.5 * world.players.len().saturating_sub(1) as f32;
    let base = world.settings.survival_spawn_interval as f32;
    (base / (scale * crowd)).round().max(1.0) as u32
}

impl GameMode for Survival {
    fn kind(&self) -> ModeKind {
        ModeKind::Survival
    }

    fn missions(&self, _settings: &Settings) -> Vec<Mission> {
        [
            ("Holdout", DEEP_SPACE, 1.0),
            ("Meteor Storm", DUST, 1.5),
            ("Last Stand", RED_GIANT, 2.0),
        ]
        .into_iter()
        .map(|(name, colors, scale)| {
            Mission::new(name, SpawnPolicy::Empty, colors, scale).with_target(None)
        })
        .collect()
    }

    fn start_do(&mut self, world: &mut World, sched: &mut Scheduler<World>) -> Result<()> {
        let first = survival_interval(world);
        sched.every(first, survival_interval, |w, _| {
            if w.phase != GamePhase::Running {
                return;
            }
            if let Err(err) = w.spawn_planetoid_safe(PlanetoidSize::Large) {
                log::error!("Survival spawn failed: {err}");
            }
        });
        sched.every_n(world.settings.survival_advance_frames, |w, _| {
            if w.phase == GamePhase::Running {
                w.emit(GameEvent::MissionAdvanceRequested);
            }
        });
        Ok(())
    }
}

/// Hold the centre zone to advance
#[derive(Debug, Default)]
pub struct AreaControl {
    control: f32,
    /// Reused zone query buffer
    nearby: Vec<EntityId>,
}

impl AreaControl {
    pub fn control(&self) -> f32 {
        self.control
    }
}

impl GameMode for AreaControl {
    fn kind(&self) -> ModeKind {
        ModeKind::AreaControl
    }

    fn missions(&self, settings: &Settings) -> Vec<Mission> {
        classic_missions(settings)
            .into_iter()
            .filter(|m| m.init.is_none())
            .map(|m| m.with_target(None))
            .collect()
    }

    fn start_do(&mut self, _world: &mut World, _sched: &mut Scheduler<World>) -> Result<()> {
        self.control = 0.0;
        Ok(())
    }

    fn do_loop(&mut self, world: &mut World, _sched: &mut Scheduler<World>) {
        if world.phase != GamePhase::Running {
            return;
        }
        let center = world.settings.field() * 0.5;
        let radius = world.settings.control_zone_radius;
        world.spatial.query(center, radius, &mut self.nearby);
        let holders = self
            .nearby
            .iter()
            .filter_map(|&id| world.store.get(id))
            .filter(|e| e.kind() == EntityKind::Ship && e.pos.distance(center) <= radius + e.radius)
            .count();
        if holders == 0 {
            return;
        }
        self.control = (self.control + world.settings.control_rate * holders as f32).min(1.0);
        if self.control >= 1.0 {
            log::info!("Zone captured at frame {}", world.clock.frame());
            self.control = 0.0;
            world.emit(GameEvent::MissionAdvanceRequested);
        }
    }

    fn progress(&self) -> Option<f32> {
        Some(self.control)
    }
}
