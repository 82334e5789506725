//! Spatial partitioning for collision broad phase
//!
//! Uniform grid over the play field. Rebuilt from scratch every frame since
//! fast entities can cross several buckets per step.

use glam::Vec2;

use super::entity::EntityId;
use super::store::EntityStore;

/// Grid-based spatial hash.
///
/// Each entity is filed in every bucket its bounding square touches, at most
/// once per bucket. Queries scan the buckets under the query square and
/// report each distinct entity once.
#[derive(Debug)]
pub struct SpatialHash {
    /// Bucket width in world units
    span: f32,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<EntityId>>,
    /// Reused query buffer
    scratch: Vec<EntityId>,
}

impl SpatialHash {
    /// Create a grid covering `field` with square buckets of `span` units
    pub fn new(field: Vec2, span: f32) -> Self {
        let cols = (field.x / span).ceil().max(1.0) as usize;
        let rows = (field.y / span).ceil().max(1.0) as usize;
        Self {
            span,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
            scratch: Vec::new(),
        }
    }

    pub fn span(&self) -> f32 {
        self.span
    }

    /// Grid dimensions in buckets (columns, rows)
    pub fn dims(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Convert world coordinates to bucket coordinates, clamped to the grid
    #[inline]
    pub fn bucket_of(&self, pos: Vec2) -> (usize, usize) {
        let col = (pos.x / self.span).floor().clamp(0.0, (self.cols - 1) as f32) as usize;
        let row = (pos.y / self.span).floor().clamp(0.0, (self.rows - 1) as f32) as usize;
        (col, row)
    }

    /// Inclusive bucket rectangle covered by a square of half-width `radius`
    #[inline]
    fn bucket_rect(&self, pos: Vec2, radius: f32) -> ((usize, usize), (usize, usize)) {
        let r = Vec2::splat(radius.max(0.0));
        (self.bucket_of(pos - r), self.bucket_of(pos + r))
    }

    /// Empty every bucket, keeping allocations
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// File one entity under every bucket its bounding square overlaps
    pub fn insert(&mut self, id: EntityId, pos: Vec2, radius: f32) {
        let ((c0, r0), (c1, r1)) = self.bucket_rect(pos, radius);
        for row in r0..=r1 {
            for col in c0..=c1 {
                self.buckets[row * self.cols + col].push(id);
            }
        }
    }

    /// Clear and repopulate from the store's live entities
    pub fn rebuild(&mut self, store: &EntityStore) {
        self.clear();
        for (id, entity) in store.iter_all() {
            self.insert(id, entity.pos, entity.radius);
        }
    }

    /// Collect distinct entities filed in the buckets under the query square.
    ///
    /// `out` is cleared first and comes back sorted by id.
    pub fn query(&self, pos: Vec2, radius: f32, out: &mut Vec<EntityId>) {
        out.clear();
        let ((c0, r0), (c1, r1)) = self.bucket_rect(pos, radius);
        for row in r0..=r1 {
            for col in c0..=c1 {
                out.extend_from_slice(&self.buckets[row * self.cols + col]);
            }
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Call `action(id, neighbor)` for every entity near `id`, itself included.
    ///
    /// Does nothing when `id` is not live in `store`.
    pub fn for_each_nearby(
        &mut self,
        store: &EntityStore,
        id: EntityId,
        mut action: impl FnMut(EntityId, EntityId),
    ) {
        let Some(entity) = store.get(id) else {
            return;
        };
        let mut scratch = std::mem::take(&mut self.scratch);
        self.query(entity.pos, entity.radius, &mut scratch);
        for &neighbor in &scratch {
            action(id, neighbor);
        }
        self.scratch = scratch;
    }

    /// Entity count in a bucket (for debugging/visualization)
    pub fn bucket_len(&self, col: usize, row: usize) -> usize {
        self.buckets
            .get(row * self.cols + col)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::{Entity, EntityKind};

    fn spawn(store: &mut EntityStore, pos: Vec2, radius: f32) -> EntityId {
        let mut entity = Entity::blank(EntityKind::Planetoid);
        entity.pos = pos;
        entity.radius = radius;
        store.add(entity)
    }

    fn neighbours(grid: &mut SpatialHash, store: &EntityStore, id: EntityId) -> Vec<EntityId> {
        let mut found = Vec::new();
        grid.for_each_nearby(store, id, |_, n| found.push(n));
        found
    }

    #[test]
    fn test_same_position_reported() {
        let mut store = EntityStore::new();
        let a = spawn(&mut store, Vec2::new(120.0, 120.0), 5.0);
        let b = spawn(&mut store, Vec2::new(120.0, 120.0), 5.0);
        let mut grid = SpatialHash::new(Vec2::new(1000.0, 1000.0), 50.0);
        grid.rebuild(&store);

        let found = neighbours(&mut grid, &store, a);
        assert!(found.contains(&b));
        // Self is reported too; filtering is the caller's job
        assert!(found.contains(&a));
    }

    #[test]
    fn test_far_entities_not_reported() {
        let mut store = EntityStore::new();
        let a = spawn(&mut store, Vec2::new(25.0, 25.0), 5.0);
        let b = spawn(&mut store, Vec2::new(25.0 + 50.0 * 3.0, 25.0), 5.0);
        let mut grid = SpatialHash::new(Vec2::new(1000.0, 1000.0), 50.0);
        grid.rebuild(&store);

        assert!(!neighbours(&mut grid, &store, a).contains(&b));
        assert!(!neighbours(&mut grid, &store, b).contains(&a));
    }

    #[test]
    fn test_straddling_entity_reported_once() {
        let mut store = EntityStore::new();
        // Sits on the corner of four buckets
        let big = spawn(&mut store, Vec2::new(100.0, 100.0), 30.0);
        let probe = spawn(&mut store, Vec2::new(110.0, 110.0), 40.0);
        let mut grid = SpatialHash::new(Vec2::new(1000.0, 1000.0), 50.0);
        grid.rebuild(&store);

        assert_eq!(grid.bucket_len(1, 1), 2);
        let found = neighbours(&mut grid, &store, probe);
        assert_eq!(found.iter().filter(|&&n| n == big).count(), 1);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_large_entity_found_from_small_neighbour() {
        let mut store = EntityStore::new();
        let big = spawn(&mut store, Vec2::new(200.0, 200.0), 90.0);
        let small = spawn(&mut store, Vec2::new(280.0, 200.0), 2.0);
        let mut grid = SpatialHash::new(Vec2::new(1000.0, 1000.0), 50.0);
        grid.rebuild(&store);

        assert!(neighbours(&mut grid, &store, small).contains(&big));
    }

    #[test]
    fn test_out_of_field_positions_clamp() {
        let grid = SpatialHash::new(Vec2::new(100.0, 100.0), 50.0);
        assert_eq!(grid.bucket_of(Vec2::new(-10.0, 500.0)), (0, 1));
        assert_eq!(grid.dims(), (2, 2));
    }

    #[test]
    fn test_rebuild_drops_stale_entries() {
        let mut store = EntityStore::new();
        let a = spawn(&mut store, Vec2::new(10.0, 10.0), 1.0);
        let b = spawn(&mut store, Vec2::new(12.0, 10.0), 1.0);
        let mut grid = SpatialHash::new(Vec2::new(100.0, 100.0), 50.0);
        grid.rebuild(&store);
        store.remove(b);
        grid.rebuild(&store);
        assert_eq!(neighbours(&mut grid, &store, a), vec![a]);
    }
}
