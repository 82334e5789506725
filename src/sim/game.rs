//! Frame driver
//!
//! `Game` ties the world to its scheduler, collision table and mode, and runs
//! one frame in a fixed order:
//! clock, scheduler, mode hook, inputs, motion, spatial rebuild, collisions,
//! events.

use serde::{Deserialize, Serialize};

use super::collision::CollisionRegistry;
use super::event::GameEvent;
use super::mission::{ColorScheme, MissionControl, next_mission};
use super::mode::{GameMode, ModeKind};
use super::reactions::default_registry;
use super::scheduler::{QueueStats, Scheduler};
use super::tick::{apply_inputs, integrate};
use super::world::{GamePhase, PlayerInput, World, register_over_check};
use crate::consts::SIM_DT;
use crate::error::Result;
use crate::settings::Settings;

/// Snapshot for the HUD and other outside readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hud {
    pub frame: u64,
    pub phase: GamePhase,
    pub mission_index: usize,
    pub mission_name: String,
    pub scale: f32,
    pub palette: ColorScheme,
    pub scores: Vec<u64>,
    pub lives: Vec<i32>,
    pub energy: Vec<u32>,
    /// Mode-specific meter (time left, zone control)
    pub progress: Option<f32>,
}

/// A running game
#[derive(Debug)]
pub struct Game {
    world: World,
    scheduler: Scheduler<World>,
    collisions: CollisionRegistry,
    mode: Box<dyn GameMode>,
}

impl Game {
    pub fn new(settings: Settings, seed: u64, kind: ModeKind) -> Result<Self> {
        let mode = kind.build(&settings);
        let missions = MissionControl::new(mode.missions(&settings))?;
        let mut world = World::new(settings, seed)?;
        world.missions = missions;
        log::info!(
            "Created {} game with {} missions (seed {seed})",
            kind.as_str(),
            world.missions.len()
        );
        Ok(Self {
            world,
            scheduler: Scheduler::new(),
            collisions: default_registry(),
            mode,
        })
    }

    /// Start from the first mission
    pub fn start(&mut self, player_count: usize) -> Result<()> {
        self.start_at(player_count, 1)
    }

    /// Start from a chosen 1-based mission
    pub fn start_at(&mut self, player_count: usize, mission: usize) -> Result<()> {
        self.world.missions.get(mission)?;

        self.scheduler = Scheduler::new();
        self.world.reset(player_count.max(1));
        self.world.missions.reset();
        self.world.missions.start_from(mission)?;
        self.world.phase = GamePhase::Running;

        let (world, sched) = (&mut self.world, &mut self.scheduler);
        register_over_check(world, sched);
        start_energy_regen(world, sched);
        for index in 0..world.players.len() {
            world.spawn_ship(index)?;
        }
        self.mode.start_do(world, sched)?;
        log::info!(
            "Starting {} with {} players at mission {mission}",
            self.mode.kind().as_str(),
            world.players.len()
        );
        next_mission(world, sched);
        Ok(())
    }

    pub fn set_input(&mut self, player: usize, input: PlayerInput) {
        self.world.set_input(player, input);
    }

    /// Queue a mission advance, handled with next frame's events
    pub fn request_mission_advance(&mut self) {
        self.world.emit(GameEvent::MissionAdvanceRequested);
    }

    /// Run one fixed frame of `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if self.world.phase == GamePhase::NotStarted {
            return;
        }
        let (world, sched) = (&mut self.world, &mut self.scheduler);
        world.clock.advance(dt);
        sched.tick(world);
        self.mode.do_loop(world, sched);

        if world.phase != GamePhase::Over {
            apply_inputs(world, sched, dt);
        }
        integrate(world, dt);
        world.spatial.rebuild(&world.store);
        self.collisions.dispatch(world);
        self.handle_events();
    }

    /// Bank a render delta and run as many fixed frames as it covers
    pub fn advance(&mut self, dt: f32) -> u32 {
        let steps = self.world.clock.accumulate(dt);
        for _ in 0..steps {
            self.tick(SIM_DT);
        }
        steps
    }

    /// Let the mode react to this frame's events, then publish them.
    /// Events raised while handling are handled in the same frame.
    fn handle_events(&mut self) {
        loop {
            let events = self.world.take_pending();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.mode.handle_event(&mut self.world, &mut self.scheduler, &event);
                self.world.publish(event);
            }
        }
    }

    /// Events published since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.drain_published()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn mode(&self) -> &dyn GameMode {
        self.mode.as_ref()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.scheduler.stats()
    }

    pub fn hud(&self) -> Hud {
        let world = &self.world;
        let mission = world.missions.current();
        Hud {
            frame: world.clock.frame(),
            phase: world.phase,
            mission_index: world.missions.current_index(),
            mission_name: mission.map(|m| m.name.clone()).unwrap_or_default(),
            scale: mission.map_or(1.0, |m| m.scale),
            palette: world.palette,
            scores: world.players.iter().map(|p| p.score).collect(),
            lives: world.players.iter().map(|p| p.lives).collect(),
            energy: world.players.iter().map(|p| p.energy).collect(),
            progress: self.mode.progress(),
        }
    }
}

/// Frames between energy ticks; shared pressure grows with the player count
fn energy_interval(world: &World) -> u32 {
    let crowd = 1.0 + 0.5 * world.living_players().saturating_sub(1) as f32;
    (world.settings.energy_regen_interval as f32 * crowd).round().max(1.0) as u32
}

fn start_energy_regen(world: &mut World, sched: &mut Scheduler<World>) {
    let first = energy_interval(world);
    sched.every(first, energy_interval, |w, _| {
        let max = w.settings.max_energy;
        for player in w.players.iter_mut().filter(|p| p.alive) {
            player.energy = (player.energy + 1).min(max);
        }
    });
}
