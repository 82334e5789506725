//! Entity store
//!
//! Typed multi-set of live entities. Entities live in a slot map addressed
//! by generational [`EntityId`]s; each kind has a dense bucket of ids with a
//! back-index in the slot, giving O(1) add/remove and O(k) per-kind
//! iteration.
//!
//! A sweep (`begin_sweep` .. `end_sweep`) stages removals so callers can
//! destroy entities while walking buckets. Staged entities are already
//! considered dead by every query.

use slotmap::SlotMap;

use super::entity::{Entity, EntityId, EntityKind};

#[derive(Debug)]
struct Slot {
    entity: Entity,
    /// Bucket the entity was filed under when added
    kind: EntityKind,
    /// Position inside that bucket
    bucket_pos: usize,
    staged: bool,
}

/// Live entity container keyed by kind
#[derive(Debug, Default)]
pub struct EntityStore {
    slots: SlotMap<EntityId, Slot>,
    buckets: [Vec<EntityId>; EntityKind::COUNT],
    staged: Vec<EntityId>,
    sweeping: bool,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity into its kind's bucket
    pub fn add(&mut self, entity: Entity) -> EntityId {
        let kind = entity.kind();
        let bucket = &mut self.buckets[kind.index()];
        let id = self.slots.insert(Slot {
            entity,
            kind,
            bucket_pos: bucket.len(),
            staged: false,
        });
        bucket.push(id);
        id
    }

    /// Remove an entity. Returns it immediately outside a sweep; inside a
    /// sweep the removal is staged and `None` is returned. No-op if absent.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        if !self.is_live(id) {
            return None;
        }
        if self.sweeping {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.staged = true;
            }
            self.staged.push(id);
            return None;
        }
        self.take(id)
    }

    /// Unlink a slot from its bucket and free it
    fn take(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.remove(id)?;
        let bucket = &mut self.buckets[slot.kind.index()];
        let removed = bucket.swap_remove(slot.bucket_pos);
        debug_assert_eq!(removed, id);
        if let Some(&moved) = bucket.get(slot.bucket_pos) {
            if let Some(moved_slot) = self.slots.get_mut(moved) {
                moved_slot.bucket_pos = slot.bucket_pos;
            }
        }
        Some(slot.entity)
    }

    /// Open a sweep: removals are staged until [`end_sweep`](Self::end_sweep)
    pub fn begin_sweep(&mut self) {
        self.sweeping = true;
    }

    /// Close a sweep, applying staged removals. Removed entities are appended to `out`.
    pub fn end_sweep(&mut self, out: &mut Vec<Entity>) {
        self.sweeping = false;
        let staged = std::mem::take(&mut self.staged);
        for id in &staged {
            if let Some(entity) = self.take(*id) {
                out.push(entity);
            }
        }
        // Keep the allocation for the next sweep
        self.staged = staged;
        self.staged.clear();
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping
    }

    /// True while the entity is present and not staged for removal
    pub fn is_live(&self, id: EntityId) -> bool {
        self.slots.get(id).is_some_and(|slot| !slot.staged)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id)
            .filter(|slot| !slot.staged)
            .map(|slot| &slot.entity)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id)
            .filter(|slot| !slot.staged)
            .map(|slot| &mut slot.entity)
    }

    /// Kind of a live entity
    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.slots
            .get(id)
            .filter(|slot| !slot.staged)
            .map(|slot| slot.kind)
    }

    /// Raw bucket contents, including entities staged for removal
    pub fn ids(&self, kind: EntityKind) -> &[EntityId] {
        &self.buckets[kind.index()]
    }

    /// Live entities of one kind
    pub fn iter(&self, kind: EntityKind) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.buckets[kind.index()]
            .iter()
            .filter_map(move |&id| self.get(id).map(|e| (id, e)))
    }

    /// Every live entity, kind by kind
    pub fn iter_all(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        EntityKind::ALL.into_iter().flat_map(move |kind| self.iter(kind))
    }

    /// Live entity count of one kind
    pub fn len(&self, kind: EntityKind) -> usize {
        let staged = self
            .staged
            .iter()
            .filter(|id| self.slots.get(**id).is_some_and(|slot| slot.kind == kind))
            .count();
        self.buckets[kind.index()].len() - staged
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum::<usize>() - self.staged.len()
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }

    /// Invoke `action` for every pair drawn from the two kinds.
    ///
    /// Same kind: each unordered pair once, never an entity with itself.
    /// Different kinds: every ordered (a, b) with a of `first`, b of `second`.
    pub fn for_each_type_pair(
        &self,
        first: EntityKind,
        second: EntityKind,
        mut action: impl FnMut(EntityId, EntityId),
    ) {
        let live = |id: &&EntityId| self.is_live(**id);
        let a_ids = &self.buckets[first.index()];
        if first == second {
            for (i, a) in a_ids.iter().enumerate().filter(|(_, id)| self.is_live(**id)) {
                for b in a_ids[i + 1..].iter().filter(live) {
                    action(*a, *b);
                }
            }
        } else {
            let b_ids = &self.buckets[second.index()];
            for a in a_ids.iter().filter(live) {
                for b in b_ids.iter().filter(live) {
                    action(*a, *b);
                }
            }
        }
    }

    /// Remove every entity, returning them for pooling. Old handles stay
    /// dead after their slots are reused.
    pub fn clear(&mut self, out: &mut Vec<Entity>) {
        out.extend(self.slots.drain().map(|(_, slot)| slot.entity));
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.staged.clear();
        self.sweeping = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store_with(kind: EntityKind, n: usize) -> (EntityStore, Vec<EntityId>) {
        let mut store = EntityStore::new();
        let ids = (0..n).map(|_| store.add(Entity::blank(kind))).collect();
        (store, ids)
    }

    #[test]
    fn test_add_files_under_kind() {
        let mut store = EntityStore::new();
        let id = store.add(Entity::blank(EntityKind::Saucer));
        for kind in EntityKind::ALL {
            let expected = usize::from(kind == EntityKind::Saucer);
            assert_eq!(store.ids(kind).iter().filter(|&&i| i == id).count(), expected);
        }
        assert!(store.remove(id).is_some());
        for kind in EntityKind::ALL {
            assert!(!store.ids(kind).contains(&id));
        }
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let (mut store, ids) = store_with(EntityKind::Bullet, 2);
        assert!(store.remove(ids[0]).is_some());
        assert!(store.remove(ids[0]).is_none());
        assert_eq!(store.len(EntityKind::Bullet), 1);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let (mut store, ids) = store_with(EntityKind::Bullet, 1);
        store.remove(ids[0]);
        let fresh = store.add(Entity::blank(EntityKind::Bullet));
        assert_ne!(fresh, ids[0]);
        assert!(!store.is_live(ids[0]));
        assert!(store.get(ids[0]).is_none());
        assert!(store.is_live(fresh));
    }

    #[test]
    fn test_swap_remove_keeps_back_index() {
        let (mut store, ids) = store_with(EntityKind::Debris, 4);
        store.remove(ids[0]);
        // The moved id must still be removable
        assert!(store.remove(ids[3]).is_some());
        assert_eq!(store.len(EntityKind::Debris), 2);
        assert!(store.is_live(ids[1]) && store.is_live(ids[2]));
    }

    #[test]
    fn test_sweep_stages_removals() {
        let (mut store, ids) = store_with(EntityKind::Planetoid, 3);
        store.begin_sweep();
        assert!(store.remove(ids[1]).is_none());
        assert!(!store.is_live(ids[1]));
        assert_eq!(store.ids(EntityKind::Planetoid).len(), 3);
        assert_eq!(store.len(EntityKind::Planetoid), 2);
        assert_eq!(store.iter(EntityKind::Planetoid).count(), 2);

        let mut removed = Vec::new();
        store.end_sweep(&mut removed);
        assert_eq!(removed.len(), 1);
        assert_eq!(store.ids(EntityKind::Planetoid).len(), 2);
    }

    #[test]
    fn test_cross_kind_pairs() {
        let mut store = EntityStore::new();
        for _ in 0..3 {
            store.add(Entity::blank(EntityKind::Bullet));
        }
        for _ in 0..4 {
            store.add(Entity::blank(EntityKind::Planetoid));
        }
        let mut count = 0;
        store.for_each_type_pair(EntityKind::Bullet, EntityKind::Planetoid, |a, b| {
            assert_eq!(store.kind_of(a), Some(EntityKind::Bullet));
            assert_eq!(store.kind_of(b), Some(EntityKind::Planetoid));
            count += 1;
        });
        assert_eq!(count, 12);
    }

    #[test]
    fn test_clear_empties_every_bucket() {
        let (mut store, ids) = store_with(EntityKind::Ship, 3);
        let mut out = Vec::new();
        store.clear(&mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(store.total(), 0);
        assert!(ids.iter().all(|id| !store.is_live(*id)));
        let fresh = store.add(Entity::blank(EntityKind::Ship));
        assert!(!ids.contains(&fresh));
    }

    proptest! {
        /// Same-kind pairing visits k(k-1)/2 distinct unordered pairs, no self pairs
        #[test]
        fn prop_self_pairs_exact(k in 0usize..40) {
            let (store, _) = store_with(EntityKind::Planetoid, k);
            let mut seen = std::collections::HashSet::new();
            let mut calls = 0usize;
            store.for_each_type_pair(EntityKind::Planetoid, EntityKind::Planetoid, |a, b| {
                calls += 1;
                assert_ne!(a, b);
                assert!(seen.insert((a.min(b), a.max(b))));
            });
            prop_assert_eq!(calls, k * k.saturating_sub(1) / 2);
        }
    }
}
