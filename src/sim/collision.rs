//! Collision dispatch
//!
//! Reactions are registered per kind pair. Each frame the spatial hash yields
//! nearby candidates, a circle test confirms contact, and the pair's reaction
//! runs inside a store sweep so destruction never invalidates the walk.

use super::entity::{EntityId, EntityKind};
use super::world::World;

/// Reaction to contact between an entity of the first kind and one of the second
pub type Reaction = fn(&mut World, EntityId, EntityId);

/// Kind-pair reaction table
#[derive(Debug, Default)]
pub struct CollisionRegistry {
    table: [[Option<Reaction>; EntityKind::COUNT]; EntityKind::COUNT],
    /// Registered pairs, walked in registration order
    order: Vec<(EntityKind, EntityKind)>,
    /// Confirmed contacts for the current frame
    candidates: Vec<(EntityId, EntityId, Reaction)>,
    /// Reused proximity query buffer
    nearby: Vec<EntityId>,
}

impl CollisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the reaction for `first` touching `second`.
    ///
    /// The reaction receives ids in that order.
    pub fn register(&mut self, first: EntityKind, second: EntityKind, reaction: Reaction) {
        let slot = &mut self.table[first.index()][second.index()];
        if slot.is_none() {
            self.order.push((first, second));
        }
        *slot = Some(reaction);
    }

    pub fn reaction(&self, first: EntityKind, second: EntityKind) -> Option<Reaction> {
        self.table[first.index()][second.index()]
    }

    /// Registered kind pairs in dispatch order
    pub fn pairs(&self) -> &[(EntityKind, EntityKind)] {
        &self.order
    }

    /// Find every touching pair of registered kinds and run its reaction.
    ///
    /// The spatial hash must be current. Pairs whose entity was destroyed by
    /// an earlier reaction this frame are skipped. Returns the number of
    /// reactions run.
    pub fn dispatch(&mut self, world: &mut World) -> usize {
        self.candidates.clear();
        for &(first, second) in &self.order {
            let Some(reaction) = self.table[first.index()][second.index()] else {
                continue;
            };
            for &id in world.store.ids(first) {
                let Some(entity) = world.store.get(id) else {
                    continue;
                };
                world.spatial.query(entity.pos, entity.radius, &mut self.nearby);
                for &other_id in &self.nearby {
                    // Same-kind pairs are reported once, from the lower id
                    if other_id == id || (first == second && other_id < id) {
                        continue;
                    }
                    let Some(other) = world.store.get(other_id) else {
                        continue;
                    };
                    if other.kind() == second && entity.overlaps(other) {
                        self.candidates.push((id, other_id, reaction));
                    }
                }
            }
        }

        world.begin_sweep();
        let mut fired = 0;
        for &(a, b, reaction) in &self.candidates {
            if world.store.is_live(a) && world.store.is_live(b) {
                reaction(world, a, b);
                fired += 1;
            }
        }
        world.end_sweep();
        fired
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::settings::Settings;
    use crate::sim::entity::PlanetoidSize;
    use crate::wrap_position;

    fn noop(_: &mut World, _: EntityId, _: EntityId) {}

    fn destroy_both(world: &mut World, a: EntityId, b: EntityId) {
        world.destroy(a);
        world.destroy(b);
    }

    fn world() -> World {
        let mut world = World::new(Settings::default(), 5).expect("valid settings");
        world.reset(1);
        world
    }

    fn brute_force(world: &World, first: EntityKind, second: EntityKind) -> usize {
        let mut count = 0;
        world.store.for_each_type_pair(first, second, |a, b| {
            if let (Some(a), Some(b)) = (world.store.get(a), world.store.get(b)) {
                if a.overlaps(b) {
                    count += 1;
                }
            }
        });
        count
    }

    #[test]
    fn test_register_keeps_first_order() {
        let mut registry = CollisionRegistry::new();
        registry.register(EntityKind::Bullet, EntityKind::Planetoid, noop);
        registry.register(EntityKind::Ship, EntityKind::Saucer, noop);
        registry.register(EntityKind::Bullet, EntityKind::Planetoid, destroy_both);
        assert_eq!(
            registry.pairs(),
            &[
                (EntityKind::Bullet, EntityKind::Planetoid),
                (EntityKind::Ship, EntityKind::Saucer)
            ]
        );
        assert!(registry.reaction(EntityKind::Planetoid, EntityKind::Bullet).is_none());
    }

    #[test]
    fn test_destroyed_entity_skipped() {
        let mut w = world();
        let center = Vec2::new(500.0, 500.0);
        let target = w
            .spawn_planetoid(PlanetoidSize::Large, center, Vec2::ZERO)
            .expect("spawn");
        w.spawn_bullet(center, Vec2::ZERO, Some(0)).expect("spawn");
        w.spawn_bullet(center + Vec2::X, Vec2::ZERO, Some(0)).expect("spawn");
        w.spatial.rebuild(&w.store);

        let mut registry = CollisionRegistry::new();
        registry.register(EntityKind::Bullet, EntityKind::Planetoid, destroy_both);
        // Both bullets touch the planetoid, only the first one gets it
        assert_eq!(registry.dispatch(&mut w), 1);
        assert!(!w.store.is_live(target));
        assert_eq!(w.store.len(EntityKind::Bullet), 1);
    }

    #[test]
    fn test_same_kind_pair_once() {
        let mut w = world();
        let pos = Vec2::new(300.0, 300.0);
        for _ in 0..3 {
            w.spawn_planetoid(PlanetoidSize::Small, pos, Vec2::ZERO).expect("spawn");
        }
        w.spatial.rebuild(&w.store);
        let mut registry = CollisionRegistry::new();
        registry.register(EntityKind::Planetoid, EntityKind::Planetoid, noop);
        assert_eq!(registry.dispatch(&mut w), 3);
    }

    fn discard_first(world: &mut World, a: EntityId, _: EntityId) {
        world.discard(a);
    }

    #[test]
    fn test_sweeping_entity_clears_only_what_it_touches() {
        let mut w = world();
        let field = w.settings.field();
        let radius = w.settings.planetoid_radius[2];

        // 50 non-overlapping planetoids
        let mut placed: Vec<Vec2> = Vec::new();
        while placed.len() < 50 {
            let pos = w.ctx.point_in(field);
            if placed.iter().all(|p| p.distance(pos) > radius * 2.0) {
                w.spawn_planetoid(PlanetoidSize::Small, pos, Vec2::ZERO).expect("spawn");
                placed.push(pos);
            }
        }
        // One probe crossing the field left to right
        let probe = w
            .spawn_saucer(Vec2::new(0.0, 480.0), Vec2::new(field.x / 200.0, 0.0))
            .expect("spawn");

        let mut registry = CollisionRegistry::new();
        registry.register(EntityKind::Planetoid, EntityKind::Saucer, discard_first);

        for _ in 0..200 {
            if let Some(e) = w.entity_mut(probe) {
                e.pos += e.vel;
            }
            w.spatial.rebuild(&w.store);
            let before = w.store.len(EntityKind::Planetoid);
            let touching = brute_force(&w, EntityKind::Planetoid, EntityKind::Saucer);
            registry.dispatch(&mut w);
            assert_eq!(before - w.store.len(EntityKind::Planetoid), touching);
        }
    }

    #[test]
    fn test_dispatch_matches_brute_force() {
        let mut w = world();
        let field = w.settings.field();
        for _ in 0..50 {
            let pos = w.ctx.point_in(field);
            let vel = w.ctx.direction() * w.ctx.range(20.0, 200.0);
            w.spawn_planetoid(PlanetoidSize::Medium, pos, vel).expect("spawn");
        }
        w.spawn_ship(0).expect("spawn");
        if let Some(ship) = w.ship_of(0).and_then(|id| w.entity_mut(id)) {
            ship.vel = Vec2::new(130.0, -70.0);
        }

        let mut registry = CollisionRegistry::new();
        registry.register(EntityKind::Planetoid, EntityKind::Ship, noop);
        registry.register(EntityKind::Planetoid, EntityKind::Planetoid, noop);

        let dt = crate::consts::SIM_DT;
        let mut total = 0;
        for _ in 0..200 {
            let ids = w.take_ids();
            for &id in &ids {
                if let Some(e) = w.store.get_mut(id) {
                    e.pos = wrap_position(e.pos + e.vel * dt, field);
                }
            }
            w.return_ids(ids);
            w.spatial.rebuild(&w.store);

            let expected = brute_force(&w, EntityKind::Planetoid, EntityKind::Ship)
                + brute_force(&w, EntityKind::Planetoid, EntityKind::Planetoid);
            let fired = registry.dispatch(&mut w);
            assert_eq!(fired, expected);
            total += fired;
        }
        assert!(total > 0, "scenario should produce some contacts");
    }
}
