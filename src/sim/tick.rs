//! Per-frame entity update
//!
//! Player intents first, then motion for everything: wrap-around, bullet and
//! debris expiry, saucers leaving the field and saucer fire.

use glam::Vec2;

use super::entity::{EntityId, EntityKind, Payload};
use super::scheduler::Scheduler;
use super::world::World;
use crate::wrap_position;

/// Apply every player's latest intent to their ship.
///
/// Shield and hyperspace are one-shot and cleared once seen, even when the
/// player has no ship or not enough energy.
pub fn apply_inputs(world: &mut World, sched: &mut Scheduler<World>, dt: f32) {
    for index in 0..world.players.len() {
        let input = world.players[index].input;
        world.players[index].input.shield = false;
        world.players[index].input.hyperspace = false;

        let Some(ship) = world.ship_of(index) else {
            continue;
        };
        steer(world, ship, input.turn, input.thrust, dt);
        if let Some(state) = world.entity_mut(ship).and_then(|e| e.ship_mut()) {
            state.fire_cooldown = state.fire_cooldown.saturating_sub(1);
        }
        if input.fire {
            fire(world, ship);
        }
        if input.shield {
            raise_shield(world, sched, index, ship);
        }
        if input.hyperspace {
            hyperspace(world, sched, index, ship);
        }
    }
}

fn steer(world: &mut World, ship: EntityId, turn: f32, thrust: bool, dt: f32) {
    let settings = &world.settings;
    let Some(e) = world.store.get_mut(ship) else {
        return;
    };
    let turn = turn.clamp(-1.0, 1.0) * settings.ship_turn_rate * dt;
    e.angle = crate::normalize_angle(e.angle + turn);
    if thrust {
        e.vel += world.ctx.heading(e.angle) * settings.ship_thrust * dt;
    }
    e.vel = (e.vel * settings.ship_drag).clamp_length_max(settings.ship_max_speed);
}

fn fire(world: &mut World, ship: EntityId) {
    let Some(e) = world.store.get_mut(ship) else {
        return;
    };
    let (pos, vel, angle, radius) = (e.pos, e.vel, e.angle, e.radius);
    let Some(state) = e.ship_mut() else {
        return;
    };
    if state.fire_cooldown > 0 {
        return;
    }
    state.fire_cooldown = world.settings.fire_cooldown_frames;
    let player = state.player;

    let dir = world.ctx.heading(angle);
    let muzzle = pos + dir * radius;
    let velocity = vel + dir * world.settings.bullet_speed;
    if let Err(err) = world.spawn_bullet(muzzle, velocity, Some(player)) {
        log::error!("Player {player} could not fire: {err}");
    }
}

/// Spend energy on a shield; re-casting restarts the timer
fn raise_shield(world: &mut World, sched: &mut Scheduler<World>, index: usize, ship: EntityId) {
    let cost = world.settings.shield_cost;
    if world.players[index].energy < cost {
        return;
    }
    let Some(state) = world.entity_mut(ship).and_then(|e| e.ship_mut()) else {
        return;
    };
    state.shielded = true;

    let player = &mut world.players[index];
    player.energy -= cost;
    if let Some(previous) = player.shield_expiry.take() {
        sched.cancel(previous);
    }
    let expiry = sched.defer(world.settings.shield_frames, move |w, _| {
        if let Some(state) = w.entity_mut(ship).and_then(|e| e.ship_mut()) {
            state.shielded = false;
        }
        if let Some(player) = w.players.get_mut(index) {
            player.shield_expiry = None;
        }
    });
    world.players[index].shield_expiry = Some(expiry);
}

/// Jump to a random spot, then lock the drive for the cooldown
fn hyperspace(world: &mut World, sched: &mut Scheduler<World>, index: usize, ship: EntityId) {
    let cost = world.settings.hyperspace_cost;
    let locked = world
        .entity(ship)
        .and_then(|e| e.ship())
        .is_none_or(|s| s.hyperspace_locked);
    if locked || world.players[index].energy < cost {
        return;
    }
    world.players[index].energy -= cost;

    let destination = world.ctx.point_in(world.settings.field());
    if let Some(e) = world.entity_mut(ship) {
        e.pos = destination;
        e.vel = Vec2::ZERO;
        if let Some(state) = e.ship_mut() {
            state.hyperspace_locked = true;
        }
    }
    log::debug!("Player {index} jumped to {destination}");
    sched.defer(world.settings.hyperspace_cooldown_frames, move |w, _| {
        if let Some(state) = w.entity_mut(ship).and_then(|e| e.ship_mut()) {
            state.hyperspace_locked = false;
        }
    });
}

/// Move every entity one step and retire what expired or left the field
pub fn integrate(world: &mut World, dt: f32) {
    let field = world.settings.field();
    let fire_interval = world.settings.saucer_fire_interval;
    let ids = world.take_ids();
    let mut expired = Vec::new();
    let mut volleys = Vec::new();

    for &id in &ids {
        let Some(e) = world.store.get_mut(id) else {
            continue;
        };
        e.pos += e.vel * dt;
        match &mut e.payload {
            Payload::Bullet(bullet) => {
                bullet.ttl = bullet.ttl.saturating_sub(1);
                if bullet.ttl == 0 {
                    expired.push(id);
                }
            }
            Payload::Debris(debris) => {
                debris.life = debris.life.saturating_sub(1);
                if debris.life == 0 {
                    expired.push(id);
                }
            }
            Payload::Planetoid(planetoid) => {
                e.angle = crate::normalize_angle(e.angle + planetoid.spin * dt);
            }
            Payload::Saucer(saucer) => {
                // Saucers cross once horizontally and are gone
                let leaving = (e.pos.x < -e.radius && e.vel.x < 0.0)
                    || (e.pos.x > field.x + e.radius && e.vel.x > 0.0);
                if leaving {
                    expired.push(id);
                    continue;
                }
                saucer.fire_cooldown = saucer.fire_cooldown.saturating_sub(1);
                if saucer.fire_cooldown == 0 {
                    saucer.fire_cooldown = fire_interval;
                    volleys.push((e.pos, e.radius));
                }
                e.pos.y = e.pos.y.rem_euclid(field.y);
                continue;
            }
            Payload::Ship(_) => {}
        }
        e.pos = wrap_position(e.pos, field);
    }
    world.return_ids(ids);

    world.begin_sweep();
    for id in expired {
        world.discard(id);
    }
    world.end_sweep();

    for (pos, radius) in volleys {
        saucer_fire(world, pos, radius);
    }
}

/// Saucers aim at the nearest ship, or anywhere when there is none
fn saucer_fire(world: &mut World, pos: Vec2, radius: f32) {
    let target = world
        .store
        .iter(EntityKind::Ship)
        .map(|(_, ship)| ship.pos)
        .min_by(|a, b| a.distance_squared(pos).total_cmp(&b.distance_squared(pos)));
    let dir = match target {
        Some(target) => (target - pos).normalize_or(Vec2::X),
        None => world.ctx.direction(),
    };
    let muzzle = pos + dir * (radius + world.settings.bullet_radius + 1.0);
    let velocity = dir * world.settings.bullet_speed * 0.5;
    if let Err(err) = world.spawn_bullet(muzzle, velocity, None) {
        log::error!("Saucer could not fire: {err}");
    }
}
