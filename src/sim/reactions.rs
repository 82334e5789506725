//! Gameplay collision reactions
//!
//! Every reaction runs inside the dispatch sweep: destroyed entities stay in
//! their buckets until the sweep closes, but no longer resolve.

use super::collision::CollisionRegistry;
use super::entity::{EntityId, EntityKind};
use super::world::World;

/// Registry with every gameplay reaction installed
pub fn default_registry() -> CollisionRegistry {
    let mut registry = CollisionRegistry::new();
    registry.register(EntityKind::Bullet, EntityKind::Planetoid, bullet_planetoid);
    registry.register(EntityKind::Ship, EntityKind::Planetoid, ship_planetoid);
    registry.register(EntityKind::Bullet, EntityKind::Saucer, bullet_saucer);
    registry.register(EntityKind::Ship, EntityKind::Saucer, ship_saucer);
    registry.register(EntityKind::Bullet, EntityKind::Ship, bullet_ship);
    registry
}

fn bullet_owner(world: &World, bullet: EntityId) -> Option<usize> {
    world.entity(bullet).and_then(|e| e.bullet()).and_then(|b| b.owner)
}

fn is_shielded(world: &World, ship: EntityId) -> bool {
    world
        .entity(ship)
        .and_then(|e| e.ship())
        .is_some_and(|s| s.shielded)
}

/// Bullet breaks the planetoid; the shooter scores
pub fn bullet_planetoid(world: &mut World, bullet: EntityId, planetoid: EntityId) {
    let scorer = bullet_owner(world, bullet);
    world.discard(bullet);
    if let Err(err) = world.shatter(planetoid, scorer) {
        log::error!("Planetoid break-up failed: {err}");
    }
}

/// Ramming a planetoid wrecks the ship and breaks the planetoid, unless shielded
pub fn ship_planetoid(world: &mut World, ship: EntityId, planetoid: EntityId) {
    if is_shielded(world, ship) {
        return;
    }
    let result = world
        .wreck_ship(ship)
        .and_then(|()| world.shatter(planetoid, None));
    if let Err(err) = result {
        log::error!("Ship/planetoid collision failed: {err}");
    }
}

/// Player fire downs saucers; saucers don't shoot each other
pub fn bullet_saucer(world: &mut World, bullet: EntityId, saucer: EntityId) {
    let Some(owner) = bullet_owner(world, bullet) else {
        return;
    };
    world.discard(bullet);
    if let Err(err) = world.blast_saucer(saucer, Some(owner)) {
        log::error!("Saucer destruction failed: {err}");
    }
}

/// Ship and saucer collide. A shield protects the ship and still downs the saucer.
pub fn ship_saucer(world: &mut World, ship: EntityId, saucer: EntityId) {
    let pilot = world.entity(ship).and_then(|e| e.ship()).map(|s| s.player);
    let mut result = world.blast_saucer(saucer, pilot);
    if !is_shielded(world, ship) {
        result = result.and_then(|()| world.wreck_ship(ship));
    }
    if let Err(err) = result {
        log::error!("Ship/saucer collision failed: {err}");
    }
}

/// Saucer fire hits a ship; player bullets pass through ships
pub fn bullet_ship(world: &mut World, bullet: EntityId, ship: EntityId) {
    if bullet_owner(world, bullet).is_some() {
        return;
    }
    world.discard(bullet);
    if is_shielded(world, ship) {
        return;
    }
    if let Err(err) = world.wreck_ship(ship) {
        log::error!("Ship destruction failed: {err}");
    }
}
