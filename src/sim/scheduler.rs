//! Frame-frequency callback engine
//!
//! Four queues advanced once per frame, always in this order:
//!
//! 1. Animated: every frame with an interpolated value until the target is reached
//! 2. Deferred: once after N frames
//! 3. Periodic: every N frames forever, N re-queried after each firing
//! 4. Next-frame: once on the following frame, deduplicated per action
//!
//! Actions live in a slot map and queues hold [`ActionId`]s. One-shot closures
//! are freed after firing; registered actions stay in the map and can be
//! queued again and again. Cancelling bumps the slot's epoch so every queued
//! entry for that action goes stale at once.
//!
//! A panicking action unwinds out of [`Scheduler::tick`]. Entries already
//! handled that frame keep their state, the rest stay queued, and the
//! action itself returns to its slot unless it was a one-shot.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use slotmap::{SlotMap, new_key_type};

use crate::error::{KernelError, Result};

/// Scheduled work. Receives the simulation context and the scheduler itself
/// so it can queue follow-up work.
pub type Action<C> = Box<dyn FnMut(&mut C, &mut Scheduler<C>)>;
/// Supplies the next periodic countdown in frames
pub type IntervalFn<C> = Box<dyn FnMut(&C) -> u32>;
/// Receives the interpolated value of an animation
pub type Consumer<C> = Box<dyn FnMut(&mut C, f32)>;

new_key_type! {
    /// Handle to an action held by the scheduler
    pub struct ActionId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifetime {
    /// Freed after it fires
    OneShot,
    /// Kept until unregistered; may be queued repeatedly
    Registered,
    /// Owned by a periodic entry, freed on cancel
    Periodic,
}

struct Slot<C> {
    /// Bumped on cancel to invalidate queued entries
    epoch: u32,
    lifetime: Lifetime,
    /// `None` while the action is running
    action: Option<Action<C>>,
}

/// Queue entry reference: action plus the epoch it was queued under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    id: ActionId,
    epoch: u32,
}

struct Deferred {
    ticket: Ticket,
    remaining: u32,
}

struct Periodic<C> {
    ticket: Ticket,
    remaining: u32,
    interval: IntervalFn<C>,
}

struct Animated<C> {
    current: f32,
    target: f32,
    step: f32,
    consumer: Consumer<C>,
}

impl<C> Animated<C> {
    /// Advance one step and feed the consumer. Returns false once finished.
    fn fire(&mut self, ctx: &mut C) -> bool {
        let next = self.current + self.step;
        let done = if self.step > 0.0 {
            next >= self.target
        } else {
            next <= self.target
        };
        self.current = if done { self.target } else { next };
        (self.consumer)(ctx, self.current);
        !done
    }
}

/// Queue sizes, for HUD/debugging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub animated: usize,
    pub deferred: usize,
    pub periodic: usize,
    pub next_frame: usize,
}

/// Deferred / periodic / animated / next-frame scheduler over context `C`
pub struct Scheduler<C> {
    slots: SlotMap<ActionId, Slot<C>>,
    animated: Vec<Animated<C>>,
    deferred: Vec<Deferred>,
    /// Deferred entries that reached zero and have not run yet
    ready: VecDeque<Ticket>,
    periodic: Vec<Periodic<C>>,
    next_frame: VecDeque<Ticket>,
    /// Bumped by [`clear`](Self::clear) so a running phase stops walking its queue
    clears: u32,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
            animated: Vec::new(),
            deferred: Vec::new(),
            ready: VecDeque::new(),
            periodic: Vec::new(),
            next_frame: VecDeque::new(),
            clears: 0,
        }
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("slots", &self.slots.len())
            .field("queues", &self.stats())
            .finish()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    // === Slots ===

    fn insert(&mut self, action: Action<C>, lifetime: Lifetime) -> ActionId {
        self.slots.insert(Slot {
            epoch: 0,
            lifetime,
            action: Some(action),
        })
    }

    fn ticket(&self, id: ActionId) -> Option<Ticket> {
        self.slots.get(id).map(|slot| Ticket {
            id,
            epoch: slot.epoch,
        })
    }

    fn is_current(slots: &SlotMap<ActionId, Slot<C>>, ticket: Ticket) -> bool {
        slots
            .get(ticket.id)
            .is_some_and(|slot| slot.epoch == ticket.epoch)
    }

    /// True while the action is still held by the scheduler
    pub fn is_live(&self, id: ActionId) -> bool {
        self.slots.contains_key(id)
    }

    /// Run a queued action if its ticket is still current
    fn fire(&mut self, ticket: Ticket, ctx: &mut C) {
        if !Self::is_current(&self.slots, ticket) {
            return;
        }
        let Some(slot) = self.slots.get_mut(ticket.id) else {
            return;
        };
        // Already running further up the stack
        let Some(mut action) = slot.action.take() else {
            return;
        };
        let one_shot = slot.lifetime == Lifetime::OneShot;
        if one_shot {
            self.slots.remove(ticket.id);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(ctx, self)));

        if !one_shot {
            if let Some(slot) = self.slots.get_mut(ticket.id) {
                slot.action = Some(action);
            }
        }
        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }

    // === Scheduling ===

    /// Keep an action in the arena so it can be queued repeatedly
    pub fn register(&mut self, action: impl FnMut(&mut C, &mut Scheduler<C>) + 'static) -> ActionId {
        self.insert(Box::new(action), Lifetime::Registered)
    }

    /// Drop a registered action and every queued entry for it
    pub fn unregister(&mut self, id: ActionId) {
        self.slots.remove(id);
    }

    /// Run `action` once after `frames` frames (0 behaves like 1)
    pub fn defer(
        &mut self,
        frames: u32,
        action: impl FnMut(&mut C, &mut Scheduler<C>) + 'static,
    ) -> ActionId {
        let id = self.insert(Box::new(action), Lifetime::OneShot);
        self.defer_action(frames, id);
        id
    }

    /// Queue an existing action to run after `frames` frames
    pub fn defer_action(&mut self, frames: u32, id: ActionId) {
        if let Some(ticket) = self.ticket(id) {
            self.deferred.push(Deferred {
                ticket,
                remaining: frames,
            });
        }
    }

    /// Run `action` every time the countdown expires. The first countdown is
    /// `first` frames; later ones come from `interval` (minimum 1).
    pub fn every(
        &mut self,
        first: u32,
        interval: impl FnMut(&C) -> u32 + 'static,
        action: impl FnMut(&mut C, &mut Scheduler<C>) + 'static,
    ) -> ActionId {
        let id = self.insert(Box::new(action), Lifetime::Periodic);
        if let Some(ticket) = self.ticket(id) {
            self.periodic.push(Periodic {
                ticket,
                remaining: first.max(1),
                interval: Box::new(interval),
            });
        }
        id
    }

    /// Periodic action with a fixed interval
    pub fn every_n(
        &mut self,
        frames: u32,
        action: impl FnMut(&mut C, &mut Scheduler<C>) + 'static,
    ) -> ActionId {
        self.every(frames, move |_| frames, action)
    }

    /// Run `action` once on the next frame
    pub fn next_frame(&mut self, action: impl FnMut(&mut C, &mut Scheduler<C>) + 'static) -> ActionId {
        let id = self.insert(Box::new(action), Lifetime::OneShot);
        self.next_frame_action(id);
        id
    }

    /// Queue an existing action for the next frame; a second queueing before
    /// it fires is ignored
    pub fn next_frame_action(&mut self, id: ActionId) {
        if let Some(ticket) = self.ticket(id) {
            if !self.next_frame.contains(&ticket) {
                self.next_frame.push_back(ticket);
            }
        }
    }

    /// Feed `consumer` a value moving from `from` to `to` over `frames` frames
    pub fn animate(
        &mut self,
        from: f32,
        to: f32,
        frames: u32,
        consumer: impl FnMut(&mut C, f32) + 'static,
    ) -> Result<()> {
        let step = if frames == 0 { 0.0 } else { (to - from) / frames as f32 };
        self.animate_by(from, to, step, consumer)
    }

    /// Feed `consumer` a value moving from `from` to `to` by `step` per frame
    pub fn animate_by(
        &mut self,
        from: f32,
        to: f32,
        step: f32,
        consumer: impl FnMut(&mut C, f32) + 'static,
    ) -> Result<()> {
        if !step.is_finite() || step == 0.0 || (to - from) * step < 0.0 {
            return Err(KernelError::ZeroStep { from, to, step });
        }
        self.animated.push(Animated {
            current: from,
            target: to,
            step,
            consumer: Box::new(consumer),
        });
        Ok(())
    }

    /// Remove pending deferred, periodic and next-frame entries for an action.
    ///
    /// One-shot and periodic actions are freed; registered actions stay
    /// registered. Animations cannot be cancelled individually.
    pub fn cancel(&mut self, id: ActionId) {
        let Some(slot) = self.slots.get_mut(id) else {
            return;
        };
        if slot.lifetime == Lifetime::Registered {
            slot.epoch = slot.epoch.wrapping_add(1);
        } else {
            self.slots.remove(id);
        }
    }

    /// Drop every queue. Registered actions survive but lose their pending entries.
    pub fn clear(&mut self) {
        self.animated.clear();
        self.deferred.clear();
        self.ready.clear();
        self.periodic.clear();
        self.next_frame.clear();
        self.clears = self.clears.wrapping_add(1);
        let ids: Vec<ActionId> = self.slots.keys().collect();
        for id in ids {
            self.cancel(id);
        }
    }

    pub fn stats(&self) -> QueueStats {
        let current = |t: Ticket| Self::is_current(&self.slots, t);
        QueueStats {
            animated: self.animated.len(),
            deferred: self.deferred.iter().filter(|d| current(d.ticket)).count()
                + self.ready.iter().filter(|t| current(**t)).count(),
            periodic: self.periodic.iter().filter(|p| current(p.ticket)).count(),
            next_frame: self.next_frame.iter().filter(|t| current(**t)).count(),
        }
    }

    // === Frame ===

    /// Advance every queue by one frame
    pub fn tick(&mut self, ctx: &mut C) {
        self.tick_animated(ctx);
        self.tick_deferred(ctx);
        self.tick_periodic(ctx);
        self.tick_next_frame(ctx);
    }

    fn tick_animated(&mut self, ctx: &mut C) {
        self.animated.retain_mut(|anim| anim.fire(ctx));
    }

    fn tick_deferred(&mut self, ctx: &mut C) {
        let slots = &self.slots;
        let ready = &mut self.ready;
        self.deferred.retain_mut(|entry| {
            if !Self::is_current(slots, entry.ticket) {
                return false;
            }
            entry.remaining = entry.remaining.saturating_sub(1);
            if entry.remaining == 0 {
                ready.push_back(entry.ticket);
                false
            } else {
                true
            }
        });

        // New deferrals from these actions land in `self.deferred` for later frames
        while let Some(ticket) = self.ready.pop_front() {
            self.fire(ticket, ctx);
        }
    }

    fn tick_periodic(&mut self, ctx: &mut C) {
        let clears = self.clears;
        // Periodic actions added while firing start counting next frame
        let count = self.periodic.len();
        for i in 0..count {
            if self.clears != clears {
                return;
            }
            let entry = &mut self.periodic[i];
            if !Self::is_current(&self.slots, entry.ticket) {
                continue;
            }
            entry.remaining = entry.remaining.saturating_sub(1);
            if entry.remaining > 0 {
                continue;
            }
            let ticket = entry.ticket;
            self.fire(ticket, ctx);
            if self.clears != clears || !Self::is_current(&self.slots, ticket) {
                continue;
            }
            let entry = &mut self.periodic[i];
            entry.remaining = (entry.interval)(&*ctx).max(1);
        }
        let slots = &self.slots;
        self.periodic.retain(|entry| Self::is_current(slots, entry.ticket));
    }

    fn tick_next_frame(&mut self, ctx: &mut C) {
        let clears = self.clears;
        // Entries queued during this phase wait for the next frame
        let count = self.next_frame.len();
        for _ in 0..count {
            if self.clears != clears {
                return;
            }
            let Some(ticket) = self.next_frame.pop_front() else {
                return;
            };
            self.fire(ticket, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal context: an execution log
    #[derive(Default)]
    struct Log(Vec<String>);

    fn push(ctx: &mut Log, s: impl Into<String>) {
        ctx.0.push(s.into());
    }

    #[test]
    fn test_phase_order() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();

        sched.next_frame(|ctx, _| push(ctx, "next"));
        sched.every_n(1, |ctx, _| push(ctx, "periodic"));
        sched.defer(1, |ctx, _| push(ctx, "deferred"));
        sched
            .animate(0.0, 1.0, 2, |ctx, v| push(ctx, format!("anim {v}")))
            .expect("valid animation");

        sched.tick(&mut log);
        assert_eq!(log.0, vec!["anim 0.5", "deferred", "periodic", "next"]);
        let stats = sched.stats();
        assert_eq!(stats.deferred, 0);
        assert_eq!(stats.periodic, 1);
        assert_eq!(stats.next_frame, 0);

        sched.tick(&mut log);
        assert_eq!(&log.0[4..], &["anim 1", "periodic"]);
        assert_eq!(sched.stats().animated, 0);
    }

    #[test]
    fn test_deferred_counts_frames() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        sched.defer(3, |ctx, _| push(ctx, "fired"));
        sched.tick(&mut log);
        sched.tick(&mut log);
        assert!(log.0.is_empty());
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["fired"]);
        sched.tick(&mut log);
        assert_eq!(log.0.len(), 1);
    }

    #[test]
    fn test_deferred_can_defer_again() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        sched.defer(1, |ctx, s| {
            push(ctx, "first");
            s.defer(1, |ctx, _| push(ctx, "second"));
        });
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["first"]);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["first", "second"]);
    }

    #[test]
    fn test_periodic_interval_supplier() {
        #[derive(Default)]
        struct Ctx {
            fired: Vec<u32>,
            frame: u32,
            interval: u32,
        }
        let mut sched: Scheduler<Ctx> = Scheduler::new();
        let mut ctx = Ctx {
            interval: 2,
            ..Default::default()
        };
        sched.every(1, |c: &Ctx| c.interval, |c, _| {
            let frame = c.frame;
            c.fired.push(frame);
            c.interval = 3;
        });
        for frame in 1..=8 {
            ctx.frame = frame;
            sched.tick(&mut ctx);
        }
        assert_eq!(ctx.fired, vec![1, 4, 7]);
    }

    #[test]
    fn test_cancel_pending_entries() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        let deferred = sched.defer(2, |ctx, _| push(ctx, "deferred"));
        let periodic = sched.every_n(1, |ctx, _| push(ctx, "periodic"));
        let next = sched.next_frame(|ctx, _| push(ctx, "next"));
        sched.cancel(deferred);
        sched.cancel(periodic);
        sched.cancel(next);
        sched.tick(&mut log);
        sched.tick(&mut log);
        assert!(log.0.is_empty());
        assert!(!sched.is_live(deferred));
        assert_eq!(sched.stats(), QueueStats::default());
    }

    #[test]
    fn test_cancel_from_inside_action() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        let target: Rc<Cell<Option<ActionId>>> = Rc::new(Cell::new(None));
        let handle = Rc::clone(&target);
        // Armed first, so it fires first in the same frame
        sched.defer(1, move |_, s| {
            if let Some(id) = handle.get() {
                s.cancel(id);
            }
        });
        let victim = sched.defer(1, |ctx, _| push(ctx, "victim"));
        target.set(Some(victim));
        sched.tick(&mut log);
        assert!(log.0.is_empty());
    }

    #[test]
    fn test_next_frame_dedup() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        let id = sched.register(|ctx, _| push(ctx, "check"));
        sched.next_frame_action(id);
        sched.next_frame_action(id);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["check"]);
        // Registered actions can be queued again after firing
        sched.next_frame_action(id);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["check", "check"]);
    }

    #[test]
    fn test_next_frame_requeue_waits_a_frame() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        sched.next_frame(|ctx, s| {
            push(ctx, "a");
            s.next_frame(|ctx, _| push(ctx, "b"));
        });
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["a"]);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["a", "b"]);
    }

    #[test]
    fn test_registered_cancel_keeps_registration() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        let id = sched.register(|ctx, _| push(ctx, "run"));
        sched.defer_action(1, id);
        sched.cancel(id);
        sched.tick(&mut log);
        assert!(log.0.is_empty());
        assert!(sched.is_live(id));
        sched.defer_action(1, id);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["run"]);
        sched.unregister(id);
        assert!(!sched.is_live(id));
    }

    #[test]
    fn test_zero_step_animation_rejected() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        assert!(matches!(
            sched.animate(1.0, 1.0, 10, |_, _| {}),
            Err(KernelError::ZeroStep { .. })
        ));
        assert!(sched.animate(0.0, 1.0, 0, |_, _| {}).is_err());
        assert!(sched.animate_by(0.0, 1.0, -0.1, |_, _| {}).is_err());
        assert_eq!(sched.stats().animated, 0);
    }

    #[test]
    fn test_descending_animation_reaches_target() {
        let mut sched: Scheduler<Vec<f32>> = Scheduler::new();
        let mut values = Vec::new();
        sched
            .animate_by(1.0, 0.0, -0.4, |ctx: &mut Vec<f32>, v| ctx.push(v))
            .expect("valid animation");
        for _ in 0..5 {
            sched.tick(&mut values);
        }
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], 0.0);
    }

    /// Run one frame, reporting whether an action panicked
    fn tick_catching(sched: &mut Scheduler<Log>, log: &mut Log) -> bool {
        panic::catch_unwind(AssertUnwindSafe(|| sched.tick(log))).is_err()
    }

    #[test]
    fn test_periodic_survives_panicking_neighbour() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        sched.every_n(1, |ctx, _| push(ctx, "regen"));
        let mut armed = true;
        sched.every_n(1, move |ctx, _| {
            if std::mem::take(&mut armed) {
                panic!("check failed");
            }
            push(ctx, "check");
        });

        assert!(tick_catching(&mut sched, &mut log));
        assert_eq!(log.0, vec!["regen"]);
        assert_eq!(sched.stats().periodic, 2);

        sched.tick(&mut log);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["regen", "regen", "check", "regen", "check"]);
    }

    #[test]
    fn test_deferred_ready_entries_run_after_panic() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        sched.defer(1, |_, _| panic!("spawn failed"));
        sched.defer(1, |ctx, _| push(ctx, "unlock"));

        assert!(tick_catching(&mut sched, &mut log));
        assert!(log.0.is_empty());
        assert_eq!(sched.stats().deferred, 1);

        sched.tick(&mut log);
        assert_eq!(log.0, vec!["unlock"]);
        assert_eq!(sched.stats(), QueueStats::default());
    }

    #[test]
    fn test_registered_action_kept_after_panic() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        let mut armed = true;
        let id = sched.register(move |ctx, _| {
            if std::mem::take(&mut armed) {
                panic!("over check failed");
            }
            push(ctx, "over");
        });
        sched.next_frame_action(id);
        sched.next_frame(|ctx, _| push(ctx, "after"));

        assert!(tick_catching(&mut sched, &mut log));
        assert!(sched.is_live(id));
        assert_eq!(sched.stats().next_frame, 1);

        sched.next_frame_action(id);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["after", "over"]);
    }

    #[test]
    fn test_self_cancelling_periodic_skips_interval() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        let own: Rc<Cell<Option<ActionId>>> = Rc::new(Cell::new(None));
        let handle = Rc::clone(&own);
        let id = sched.every(
            1,
            |_| panic!("interval asked after cancel"),
            move |ctx, s| {
                push(ctx, "once");
                if let Some(id) = handle.get() {
                    s.cancel(id);
                }
            },
        );
        own.set(Some(id));
        sched.tick(&mut log);
        sched.tick(&mut log);
        assert_eq!(log.0, vec!["once"]);
        assert!(!sched.is_live(id));
        assert_eq!(sched.stats().periodic, 0);
    }

    #[test]
    fn test_clear_drops_queues() {
        let mut sched: Scheduler<Log> = Scheduler::new();
        let mut log = Log::default();
        let registered = sched.register(|ctx, _| push(ctx, "registered"));
        sched.defer_action(1, registered);
        sched.every_n(1, |ctx, _| push(ctx, "periodic"));
        sched.animate(0.0, 1.0, 5, |ctx, _| push(ctx, "anim")).expect("valid");
        sched.clear();
        sched.tick(&mut log);
        assert!(log.0.is_empty());
        assert!(sched.is_live(registered));
    }
}
