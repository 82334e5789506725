//! Missions and mission cycling
//!
//! A mode owns an ordered list of missions. Exactly one is active; advancing
//! wraps around the list (ids are 1-based). Only one transition may be in
//! flight: `next_mission` is ignored until the scheduled unlock fires.

use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, PlanetoidSize};
use super::event::GameEvent;
use super::scheduler::{ActionId, Scheduler};
use super::world::{GamePhase, World};
use crate::error::{KernelError, Result};

/// RGB triple in 0..1
pub type Rgb = [f32; 3];

/// Palette handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub background: Rgb,
    pub foreground: Rgb,
    pub accent: Rgb,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            background: [0.0, 0.0, 0.0],
            foreground: [1.0, 1.0, 1.0],
            accent: [1.0, 1.0, 1.0],
        }
    }
}

impl ColorScheme {
    pub const fn new(background: Rgb, foreground: Rgb, accent: Rgb) -> Self {
        Self {
            background,
            foreground,
            accent,
        }
    }

    /// Linear blend, `t` = 0 gives `self`, 1 gives `other`
    pub fn lerp(&self, other: &ColorScheme, t: f32) -> ColorScheme {
        let mix = |a: Rgb, b: Rgb| -> Rgb {
            [
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
            ]
        };
        ColorScheme {
            background: mix(self.background, other.background),
            foreground: mix(self.foreground, other.foreground),
            accent: mix(self.accent, other.accent),
        }
    }
}

/// What a mission puts on the field when it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnPolicy {
    /// Nothing up front; the mode or init hook spawns over time
    Empty,
    Planetoids { count: u32 },
    Saucers { count: u32 },
    Mixed { planetoids: u32, saucers: u32 },
}

/// Mission start/stop hook
pub type MissionHook = fn(&mut World, &mut Scheduler<World>);

/// One themed wave within a mode
#[derive(Debug, Clone)]
pub struct Mission {
    pub name: String,
    pub spawn: SpawnPolicy,
    pub colors: ColorScheme,
    /// Difficulty multiplier for spawn counts and transition delay
    pub scale: f32,
    /// Kind whose extinction completes the mission
    pub target: Option<EntityKind>,
    pub init: Option<MissionHook>,
    pub dispose: Option<MissionHook>,
}

impl Mission {
    pub fn new(name: impl Into<String>, spawn: SpawnPolicy, colors: ColorScheme, scale: f32) -> Self {
        Self {
            name: name.into(),
            spawn,
            colors,
            scale,
            target: Some(EntityKind::Planetoid),
            init: None,
            dispose: None,
        }
    }

    pub fn with_target(mut self, target: Option<EntityKind>) -> Self {
        self.target = target;
        self
    }

    pub fn with_hooks(mut self, init: MissionHook, dispose: MissionHook) -> Self {
        self.init = Some(init);
        self.dispose = Some(dispose);
        self
    }
}

/// Mission cycle state
#[derive(Debug, Default)]
pub struct MissionControl {
    missions: Vec<Mission>,
    /// Active mission, 1-based; 0 before the first spawn
    current: usize,
    /// Mission the first transition moves to (0 means 1)
    first: usize,
    /// A transition is in flight
    scheduled: bool,
    /// Actions owned by the active mission, cancelled on dispose
    tasks: Vec<ActionId>,
}

impl MissionControl {
    pub fn new(missions: Vec<Mission>) -> Result<Self> {
        if missions.is_empty() {
            return Err(KernelError::NoMissions);
        }
        Ok(Self {
            missions,
            ..Default::default()
        })
    }

    /// Mission by 1-based id
    pub fn get(&self, index: usize) -> Result<&Mission> {
        index
            .checked_sub(1)
            .and_then(|i| self.missions.get(i))
            .ok_or(KernelError::UnknownMission {
                index,
                len: self.missions.len(),
            })
    }

    pub fn current(&self) -> Option<&Mission> {
        self.get(self.current).ok()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Id the next transition will move to
    pub fn next_index(&self) -> usize {
        if self.current == 0 {
            return self.first.max(1);
        }
        self.current % self.missions.len().max(1) + 1
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    /// Kind whose extinction ends the active mission
    pub fn current_target(&self) -> Option<EntityKind> {
        self.current().and_then(|m| m.target)
    }

    /// Make `index` the mission the next transition starts
    pub fn start_from(&mut self, index: usize) -> Result<()> {
        self.get(index)?;
        self.current = 0;
        self.first = index;
        Ok(())
    }

    /// Forget progress so the cycle starts over from mission 1
    pub fn reset(&mut self) {
        self.current = 0;
        self.first = 0;
        self.scheduled = false;
        self.tasks.clear();
    }

    /// Tie an action's lifetime to the active mission
    pub fn own_task(&mut self, id: ActionId) {
        self.tasks.push(id);
    }
}

/// Frames between a mission ending and the next one spawning
pub fn spawn_delay(base_frames: u32, scale: f32, players: usize) -> u32 {
    let crowd = 1.0 + 0.5 * players.saturating_sub(1) as f32;
    (base_frames as f32 * scale * crowd).round().max(1.0) as u32
}

/// Move to the next mission. Ignored while a transition is already in flight.
pub fn next_mission(world: &mut World, sched: &mut Scheduler<World>) {
    if world.missions.scheduled || world.phase == GamePhase::Over {
        return;
    }
    world.missions.scheduled = true;
    world.phase = GamePhase::MissionTransition;

    // Dispose of the outgoing mission
    if let Some(dispose) = world.missions.current().and_then(|m| m.dispose) {
        dispose(world, sched);
    }
    for task in std::mem::take(&mut world.missions.tasks) {
        sched.cancel(task);
    }

    let next = world.missions.next_index();
    let mission = match world.missions.get(next) {
        Ok(mission) => mission,
        Err(err) => {
            log::error!("Cannot advance mission: {err}");
            world.missions.scheduled = false;
            world.phase = GamePhase::Running;
            return;
        }
    };
    let (name, scale, colors) = (mission.name.clone(), mission.scale, mission.colors);
    let delay = spawn_delay(
        world.settings.transition_frames,
        scale,
        world.players.len(),
    );
    log::info!("Mission {next} ({name}) in {delay} frames");

    sched.defer(delay, move |w, s| spawn_mission(w, s, next));
    sched.defer(delay, |w, _| {
        w.missions.scheduled = false;
        if w.phase == GamePhase::MissionTransition {
            w.phase = GamePhase::Running;
        }
    });

    let from = world.palette;
    let fade = sched.animate(0.0, 1.0, world.settings.crossfade_frames, move |w, t| {
        w.palette = from.lerp(&colors, t);
    });
    if let Err(err) = fade {
        log::warn!("Skipping palette cross-fade: {err}");
        world.palette = colors;
    }
}

/// Make mission `index` active and put its entities on the field
pub fn spawn_mission(world: &mut World, sched: &mut Scheduler<World>, index: usize) {
    if world.phase == GamePhase::Over {
        return;
    }
    let Ok(mission) = world.missions.get(index) else {
        log::error!("Mission {index} vanished before spawning");
        return;
    };
    let (name, spawn, scale, init) = (mission.name.clone(), mission.spawn, mission.scale, mission.init);
    world.missions.current = index;

    let scaled = |count: u32| (count as f32 * scale).round() as u32;
    let (planetoids, saucers) = match spawn {
        SpawnPolicy::Empty => (0, 0),
        SpawnPolicy::Planetoids { count } => (scaled(count), 0),
        SpawnPolicy::Saucers { count } => (0, count),
        SpawnPolicy::Mixed { planetoids, saucers } => (scaled(planetoids), saucers),
    };
    log::debug!("Spawning mission {index}: {planetoids} planetoids, {saucers} saucers");
    for _ in 0..planetoids {
        if let Err(err) = world.spawn_planetoid_safe(PlanetoidSize::Large) {
            log::error!("Planetoid spawn failed: {err}");
        }
    }
    for _ in 0..saucers {
        if let Err(err) = world.spawn_saucer_random() {
            log::error!("Saucer spawn failed: {err}");
        }
    }
    if let Some(init) = init {
        init(world, sched);
    }
    world.emit(GameEvent::MissionStarted { index, name });
}
