//! Reactive Runtime
//!
//! The runtime is the context object that connects reads, writes and
//! effects. It owns every piece of mutable global state the engine needs:
//!
//! - the target registry: raw object identity → (key → [`Dep`]);
//! - the tracking state (effect stack, `should_track` flag and its stack);
//! - the wrapper identity maps, one per variant;
//! - the job queue and the active effect-scope stack.
//!
//! # How It Works
//!
//! 1. When an effect reads through a wrapper, the wrapper calls
//!    [`track`], which finds (or creates) the dep for `(target, key)` and
//!    subscribes the running effect to it.
//!
//! 2. When a wrapper writes, it calls [`trigger`] (or [`trigger_batch`] for
//!    a multi-event mutation). The runtime resolves the affected deps from
//!    the operation and the target's shape, merges their subscribers into
//!    one de-duplicated batch, and delivers it:
//!    a. derived-value effects first, then ordinary effects;
//!    b. the running effect is skipped unless it allows recursion;
//!    c. effects with a scheduler are handed to it, others re-run inline.
//!
//!    Ordinary effects reached through an invalidated derived value join the
//!    batch that invalidated it, so an effect reading both a source and a
//!    value derived from it still runs once per trigger.
//!
//! # Threading
//!
//! A runtime is single-threaded. Each thread gets its own default instance,
//! reached with [`Runtime::with`]. Registry entries are keyed by object
//! identity and removed when the raw object is dropped.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::{TrackingState, MAX_MARKER_BITS};
use super::dep::Dep;
use super::effect::{DerivedKind, EffectId, ReactiveEffect};
use super::operations::{
    DebugInfo, DebugTarget, Invalidation, TrackKey, TrackOp, TriggerEvent, TriggerOp,
};
use super::scheduler::JobQueue;
use super::scope::EffectScope;
use crate::observe::{IdentityKey, IdentityMaps, Variant};
use crate::value::{Obj, ObjectId, PropKey, ShapeKind};

type KeyToDep = IndexMap<TrackKey, Dep>;

/// Engine state for one thread.
pub struct Runtime {
    targets: RefCell<HashMap<ObjectId, KeyToDep>>,
    pub(crate) tracking: TrackingState,
    pub(crate) identity: RefCell<IdentityMaps>,
    pub(crate) jobs: JobQueue,
    pub(crate) scopes: RefCell<Vec<EffectScope>>,
    /// One collector per open derived-invalidation pass.
    cascade: RefCell<Vec<Vec<Delivery>>>,
    /// Registry entries of dropped objects, removed on the next access.
    stale_targets: RefCell<Vec<ObjectId>>,
    /// Identity entries of dropped wrappers, removed on the next lookup.
    stale_wrappers: RefCell<Vec<(Variant, IdentityKey)>>,
}

/// An effect waiting to be re-run or handed to its scheduler.
struct Delivery {
    effect: ReactiveEffect,
    invalidation: Invalidation,
    /// Only built when the effect has an `on_trigger` hook.
    info: Option<DebugInfo>,
}

impl Delivery {
    fn new(
        effect: &ReactiveEffect,
        invalidation: Invalidation,
        info: impl FnOnce() -> DebugInfo,
    ) -> Self {
        Self {
            effect: effect.clone(),
            invalidation,
            info: effect.on_trigger().map(|_| info()),
        }
    }
}

/// An open derived-invalidation pass. Closing it yields the ordinary
/// effects nested triggers reached while it was open.
struct Cascade<'a> {
    rt: &'a Runtime,
    open: bool,
}

impl<'a> Cascade<'a> {
    fn open(rt: &'a Runtime) -> Self {
        rt.cascade.borrow_mut().push(Vec::new());
        Self { rt, open: true }
    }

    fn close(mut self) -> Vec<Delivery> {
        self.open = false;
        self.rt.cascade.borrow_mut().pop().unwrap_or_default()
    }
}

impl Drop for Cascade<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Ok(mut stack) = self.rt.cascade.try_borrow_mut() {
                stack.pop();
            }
        }
    }
}

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

impl Runtime {
    fn new() -> Self {
        Self {
            targets: RefCell::new(HashMap::new()),
            tracking: TrackingState::new(),
            identity: RefCell::new(IdentityMaps::default()),
            jobs: JobQueue::new(),
            scopes: RefCell::new(Vec::new()),
            cascade: RefCell::new(Vec::new()),
            stale_targets: RefCell::new(Vec::new()),
            stale_wrappers: RefCell::new(Vec::new()),
        }
    }

    /// Run `f` against this thread's runtime.
    pub fn with<R>(f: impl FnOnce(&Runtime) -> R) -> R {
        RUNTIME.with(f)
    }

    /// Like [`with`](Self::with), but returns `None` while the thread's
    /// runtime is being torn down.
    pub(crate) fn try_with<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
        RUNTIME.try_with(f).ok()
    }

    /// Drop the registry entry of a raw object that no longer exists. When
    /// the registry is borrowed, the removal waits for the next access.
    pub(crate) fn forget_target(id: ObjectId) {
        Self::try_with(|rt| {
            let removed = match rt.targets.try_borrow_mut() {
                Ok(mut targets) => targets.remove(&id),
                Err(_) => {
                    rt.stale_targets.borrow_mut().push(id);
                    None
                }
            };
            // Deps may own the last handle to effects whose closures own
            // other objects; release them outside the borrow.
            drop(removed);
        });
    }

    fn purge_stale_targets(&self) {
        let stale = std::mem::take(&mut *self.stale_targets.borrow_mut());
        if stale.is_empty() {
            return;
        }
        let Ok(mut targets) = self.targets.try_borrow_mut() else {
            self.stale_targets.borrow_mut().extend(stale);
            return;
        };
        let removed: Vec<KeyToDep> = stale.iter().filter_map(|id| targets.remove(id)).collect();
        drop(targets);
        drop(removed);
    }

    /// Drop the identity entry of a wrapper being destroyed. When the maps
    /// are borrowed, the removal waits for the next lookup.
    pub(crate) fn forget_wrapper(variant: Variant, key: IdentityKey) {
        Self::try_with(|rt| match rt.identity.try_borrow_mut() {
            Ok(mut maps) => maps.forget(variant, key),
            Err(_) => rt.stale_wrappers.borrow_mut().push((variant, key)),
        });
    }

    pub(crate) fn purge_stale_wrappers(&self) {
        let stale = std::mem::take(&mut *self.stale_wrappers.borrow_mut());
        if stale.is_empty() {
            return;
        }
        match self.identity.try_borrow_mut() {
            Ok(mut maps) => {
                for (variant, key) in stale {
                    maps.forget(variant, key);
                }
            }
            Err(_) => self.stale_wrappers.borrow_mut().extend(stale),
        }
    }

    /// Number of deps registered for a target.
    pub fn dep_count(&self, target: &Obj) -> usize {
        self.purge_stale_targets();
        self.targets
            .borrow()
            .get(&target.id())
            .map_or(0, IndexMap::len)
    }

    /// The dep for `(target, key)`, if one was ever created.
    pub fn dep(&self, target: &Obj, key: &TrackKey) -> Option<Dep> {
        self.purge_stale_targets();
        self.targets
            .borrow()
            .get(&target.id())
            .and_then(|deps| deps.get(key).cloned())
    }

    /// Record a read of `(target, key)` by the running effect.
    pub fn track(&self, target: &Obj, op: TrackOp, key: TrackKey) {
        if !self.tracking.is_tracking() {
            return;
        }
        self.purge_stale_targets();

        let dep = self
            .targets
            .borrow_mut()
            .entry(target.id())
            .or_default()
            .entry(key.clone())
            .or_default()
            .clone();

        self.track_effects(&dep, || {
            DebugInfo::track(DebugTarget::Object(target.clone()), op, Some(key))
        });
    }

    /// Subscribe the running effect to `dep`.
    pub(crate) fn track_effects(&self, dep: &Dep, info: impl FnOnce() -> DebugInfo) {
        let Some(effect) = self.tracking.active_effect() else {
            return;
        };

        let should_track = if self.tracking.depth() <= MAX_MARKER_BITS {
            let bit = self.tracking.track_op_bit();
            if dep.new_tracked(bit) {
                false
            } else {
                dep.mark_new_tracked(bit);
                !dep.was_tracked(bit)
            }
        } else {
            !dep.contains(&effect)
        };

        if should_track {
            dep.insert(effect.clone());
            effect.push_dep(dep);

            let info = info();
            tracing::trace!(effect = effect.id().raw(), op = ?info.op, key = ?info.key, "track");
            if let Some(hook) = effect.on_track() {
                hook(&info.for_effect(effect.id()));
            }
        }
    }

    /// Report one write to `target`.
    pub fn trigger(&self, target: &Obj, event: TriggerEvent) {
        self.trigger_batch(target, std::slice::from_ref(&event));
    }

    /// Report several writes of one logical mutation. Every affected effect
    /// is delivered exactly once.
    pub fn trigger_batch(&self, target: &Obj, events: &[TriggerEvent]) {
        if events.is_empty() {
            return;
        }
        if !self.tracking.should_trigger() {
            tracing::trace!(object = ?target, events = events.len(), "trigger discarded");
            return;
        }
        self.purge_stale_targets();
        let kind = target.kind();

        // (dep, index of the first event that reached it)
        let deps: SmallVec<[(Dep, usize); 4]> = {
            let targets = self.targets.borrow();
            let Some(key_to_dep) = targets.get(&target.id()) else {
                return;
            };
            let mut deps = SmallVec::new();
            for (index, event) in events.iter().enumerate() {
                for dep in affected_deps(key_to_dep, kind, event) {
                    deps.push((dep, index));
                }
            }
            deps
        };

        let mut effects: IndexMap<EffectId, (ReactiveEffect, usize)> = IndexMap::new();
        for (dep, index) in &deps {
            for effect in dep.subscribers() {
                effects.entry(effect.id()).or_insert((effect, *index));
            }
        }

        tracing::trace!(
            object = ?target,
            events = events.len(),
            effects = effects.len(),
            "trigger"
        );

        let batch: Vec<_> = effects.into_values().collect();
        self.trigger_effects(&batch, Invalidation::Upstream, |index| {
            DebugInfo::trigger(DebugTarget::Object(target.clone()), &events[index])
        });
    }

    /// Deliver a trigger on a standalone dep (boxed and derived values).
    pub(crate) fn trigger_dep(
        &self,
        dep: &Dep,
        invalidation: Invalidation,
        info: impl Fn() -> DebugInfo,
    ) {
        if !self.tracking.should_trigger() {
            return;
        }
        let batch: Vec<_> = dep.subscribers().into_iter().map(|e| (e, 0)).collect();
        self.trigger_effects(&batch, invalidation, |_| info());
    }

    fn trigger_effects(
        &self,
        batch: &[(ReactiveEffect, usize)],
        invalidation: Invalidation,
        info: impl Fn(usize) -> DebugInfo,
    ) {
        let cascade = Cascade::open(self);
        for (effect, index) in batch.iter().filter(|(e, _)| e.derived().is_some()) {
            self.deliver(Delivery::new(effect, invalidation, || info(*index)));
        }

        let mut pending: IndexMap<EffectId, Delivery> = IndexMap::new();
        for delivery in cascade.close() {
            pending.entry(delivery.effect.id()).or_insert(delivery);
        }
        for (effect, index) in batch.iter().filter(|(e, _)| e.derived().is_none()) {
            pending
                .entry(effect.id())
                .or_insert_with(|| Delivery::new(effect, invalidation, || info(*index)));
        }

        // Inside an outer derived pass: hand everything to that batch.
        if let Some(outer) = self.cascade.borrow_mut().last_mut() {
            outer.extend(pending.into_values());
            return;
        }

        for delivery in pending.into_values() {
            self.deliver(delivery);
        }
    }

    fn deliver(&self, delivery: Delivery) {
        let Delivery {
            effect,
            invalidation,
            info,
        } = delivery;
        if self.tracking.is_active(effect.id()) && !effect.allows_recurse() {
            return;
        }

        if let (Some(hook), Some(info)) = (effect.on_trigger(), info) {
            hook(&info.for_effect(effect.id()));
        }

        match effect.scheduler() {
            Some(scheduler) => scheduler(&effect, invalidation),
            None => {
                effect.run();
            }
        }
    }

    /// Synchronously propagate a deferred derived value's invalidation to
    /// the deferred derived values subscribed to `dep`.
    pub(crate) fn propagate_deferred(&self, dep: &Dep) {
        for effect in dep.subscribers() {
            if effect.derived() == Some(DerivedKind::Deferred) {
                if let Some(scheduler) = effect.scheduler() {
                    scheduler(&effect, Invalidation::Computed);
                }
            }
        }
    }
}

/// The deps of one target affected by one write.
fn affected_deps(key_to_dep: &KeyToDep, kind: ShapeKind, event: &TriggerEvent) -> Vec<Dep> {
    let mut deps = Vec::new();

    if event.op == TriggerOp::Clear {
        deps.extend(key_to_dep.values().cloned());
        return deps;
    }

    let is_list = kind == ShapeKind::List;
    let is_map = kind == ShapeKind::Map;

    if is_list && event.key.as_ref().is_some_and(TrackKey::is_length) {
        let new_len = event
            .new_value
            .as_ref()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        for (key, dep) in key_to_dep {
            let beyond = key.index().is_some_and(|i| i as f64 >= new_len);
            if key.is_length() || beyond {
                deps.push(dep.clone());
            }
        }
        return deps;
    }

    let mut push = |key: &TrackKey| {
        if let Some(dep) = key_to_dep.get(key) {
            deps.push(dep.clone());
        }
    };

    if let Some(key) = &event.key {
        push(key);
    }

    match event.op {
        TriggerOp::Add => {
            if !is_list {
                push(&TrackKey::Iterate);
                if is_map {
                    push(&TrackKey::MapKeyIterate);
                }
            } else if event.key.as_ref().and_then(TrackKey::index).is_some() {
                push(&TrackKey::Prop(PropKey::length()));
            }
        }
        TriggerOp::Delete => {
            if !is_list {
                push(&TrackKey::Iterate);
                if is_map {
                    push(&TrackKey::MapKeyIterate);
                }
            }
        }
        TriggerOp::Set => {
            if is_map {
                push(&TrackKey::Iterate);
            }
        }
        TriggerOp::Clear => {}
    }

    deps
}

/// Record a read of `(target, key)` by the running effect.
pub fn track(target: &Obj, op: TrackOp, key: TrackKey) {
    Runtime::with(|rt| rt.track(target, op, key));
}

/// Report one write to `target`.
pub fn trigger(target: &Obj, event: TriggerEvent) {
    Runtime::with(|rt| rt.trigger(target, event));
}

/// Report several writes of one logical mutation as one batch.
pub fn trigger_batch(target: &Obj, events: &[TriggerEvent]) {
    Runtime::with(|rt| rt.trigger_batch(target, events));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::{effect, effect_with, stop, EffectOptions, Runner};
    use crate::value::Value;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn counter() -> Rc<Cell<i32>> {
        Rc::new(Cell::new(0))
    }

    fn bump(c: &Rc<Cell<i32>>) {
        c.set(c.get() + 1);
    }

    #[test]
    fn track_outside_effect_is_a_no_op() {
        let obj = Obj::record();
        track(&obj, TrackOp::Get, TrackKey::prop("a"));
        assert_eq!(Runtime::with(|rt| rt.dep_count(&obj)), 0);
    }

    #[test]
    fn trigger_reruns_subscribed_effect() {
        let obj = Obj::record();
        let runs = counter();

        let _runner = {
            let (obj, runs) = (obj.clone(), runs.clone());
            effect(move || {
                track(&obj, TrackOp::Get, TrackKey::prop("a"));
                bump(&runs);
            })
        };
        assert_eq!(runs.get(), 1);

        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        assert_eq!(runs.get(), 2);

        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("b")));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn batch_delivers_each_effect_once() {
        let obj = Obj::record();
        let runs = counter();

        let _runner = {
            let (obj, runs) = (obj.clone(), runs.clone());
            effect(move || {
                track(&obj, TrackOp::Get, TrackKey::prop("a"));
                track(&obj, TrackOp::Get, TrackKey::prop("b"));
                bump(&runs);
            })
        };

        trigger_batch(
            &obj,
            &[
                TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")),
                TriggerEvent::new(TriggerOp::Set, TrackKey::prop("b")),
            ],
        );
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn conditional_reads_leave_stale_deps() {
        let obj = Obj::record();
        let use_a = Rc::new(Cell::new(true));
        let runs = counter();

        let _runner = {
            let (obj, use_a, runs) = (obj.clone(), use_a.clone(), runs.clone());
            effect(move || {
                let key = if use_a.get() { "a" } else { "b" };
                track(&obj, TrackOp::Get, TrackKey::prop(key));
                bump(&runs);
            })
        };

        use_a.set(false);
        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        assert_eq!(runs.get(), 2);

        // Now subscribed to "b" only.
        let dep_a = Runtime::with(|rt| rt.dep(&obj, &TrackKey::prop("a"))).unwrap();
        let dep_b = Runtime::with(|rt| rt.dep(&obj, &TrackKey::prop("b"))).unwrap();
        assert!(dep_a.is_empty());
        assert_eq!(dep_b.len(), 1);

        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        assert_eq!(runs.get(), 2);
        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("b")));
        assert_eq!(runs.get(), 3);
    }

    /// Run `f` inside `depth` nested effects, keeping them alive in `keep`.
    fn nested(depth: usize, f: Rc<dyn Fn()>, keep: Rc<RefCell<Vec<Runner>>>) {
        if depth == 0 {
            f();
            return;
        }
        let runner = {
            let keep = keep.clone();
            effect(move || nested(depth - 1, f.clone(), keep.clone()))
        };
        keep.borrow_mut().push(runner);
    }

    #[test]
    fn deep_nesting_falls_back_to_full_cleanup() {
        let obj = Obj::record();
        let use_a = Rc::new(Cell::new(true));
        let runs = counter();

        let runner = {
            let (obj, use_a, runs) = (obj.clone(), use_a.clone(), runs.clone());
            effect(move || {
                let key = if use_a.get() { "a" } else { "b" };
                track(&obj, TrackOp::Get, TrackKey::prop(key));
                bump(&runs);
            })
        };
        assert_eq!(runs.get(), 1);

        // Re-run it below more effects than there are marker bits.
        use_a.set(false);
        let depth_seen = Rc::new(Cell::new(0));
        let keep = Rc::new(RefCell::new(Vec::new()));
        {
            let (effect, depth_seen) = (runner.effect().clone(), depth_seen.clone());
            nested(
                MAX_MARKER_BITS as usize + 1,
                Rc::new(move || {
                    depth_seen.set(Runtime::with(|rt| rt.tracking.depth()));
                    effect.run();
                }),
                keep.clone(),
            );
        }
        assert!(depth_seen.get() > MAX_MARKER_BITS);
        assert_eq!(keep.borrow().len(), MAX_MARKER_BITS as usize + 1);
        assert_eq!(runs.get(), 2);
        assert_eq!(runner.effect().dependency_count(), 1);

        let dep_a = Runtime::with(|rt| rt.dep(&obj, &TrackKey::prop("a"))).unwrap();
        assert!(dep_a.is_empty());

        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        assert_eq!(runs.get(), 2);
        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("b")));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn paused_triggers_are_discarded() {
        let obj = Obj::record();
        let runs = counter();
        let _runner = {
            let (obj, runs) = (obj.clone(), runs.clone());
            effect(move || {
                track(&obj, TrackOp::Get, TrackKey::prop("a"));
                bump(&runs);
            })
        };

        crate::reactive::without_triggers(|| {
            trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        });
        assert_eq!(runs.get(), 1);

        // Nothing was queued while paused.
        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("b")));
        assert_eq!(runs.get(), 1);
        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn forgetting_a_borrowed_registry_waits_for_the_next_access() {
        let obj = Obj::record();
        let id = obj.id();
        let runner = {
            let obj = obj.clone();
            effect(move || track(&obj, TrackOp::Get, TrackKey::prop("a")))
        };
        stop(&runner);
        drop(runner);

        Runtime::with(|rt| {
            let _held = rt.targets.borrow();
            drop(obj);
        });
        assert!(Runtime::with(|rt| rt.targets.borrow().contains_key(&id)));

        Runtime::with(|rt| rt.dep_count(&Obj::record()));
        assert!(!Runtime::with(|rt| rt.targets.borrow().contains_key(&id)));
    }

    #[test]
    fn length_write_reaches_truncated_indices() {
        let list = Obj::list([1, 2, 3]);
        let tail_runs = counter();
        let head_runs = counter();

        let _tail = {
            let (list, runs) = (list.clone(), tail_runs.clone());
            effect(move || {
                track(&list, TrackOp::Get, TrackKey::prop(2usize));
                bump(&runs);
            })
        };
        let _head = {
            let (list, runs) = (list.clone(), head_runs.clone());
            effect(move || {
                track(&list, TrackOp::Get, TrackKey::prop(0usize));
                bump(&runs);
            })
        };

        trigger(
            &list,
            TriggerEvent::new(TriggerOp::Set, TrackKey::Prop(PropKey::length()))
                .with_values(Some(Value::from(1)), Some(Value::from(3))),
        );
        assert_eq!(tail_runs.get(), 2);
        assert_eq!(head_runs.get(), 1);
    }

    #[test]
    fn add_on_map_reaches_both_iteration_keys() {
        let map = Obj::map();
        let runs = counter();

        let _runner = {
            let (map, runs) = (map.clone(), runs.clone());
            effect(move || {
                track(&map, TrackOp::Iterate, TrackKey::MapKeyIterate);
                bump(&runs);
            })
        };

        trigger(&map, TriggerEvent::new(TriggerOp::Add, TrackKey::entry("k")));
        assert_eq!(runs.get(), 2);

        // A value-only write does not change the key set.
        trigger(&map, TriggerEvent::new(TriggerOp::Set, TrackKey::entry("k")));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn scheduler_replaces_inline_run() {
        let obj = Obj::record();
        let runs = counter();
        let scheduled = counter();

        let runner = {
            let (obj, runs) = (obj.clone(), runs.clone());
            let scheduled = scheduled.clone();
            effect_with(
                move || {
                    track(&obj, TrackOp::Get, TrackKey::prop("a"));
                    bump(&runs);
                },
                EffectOptions::new().scheduler(move |_, invalidation| {
                    assert_eq!(invalidation, Invalidation::Upstream);
                    bump(&scheduled);
                }),
            )
        };

        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 1);

        stop(&runner);
        trigger(&obj, TriggerEvent::new(TriggerOp::Set, TrackKey::prop("a")));
        assert_eq!(scheduled.get(), 1);
    }

    #[test]
    fn dropping_target_forgets_its_deps() {
        let obj = Obj::record();
        let id = obj.id();
        let runner = {
            let obj = obj.clone();
            effect(move || track(&obj, TrackOp::Get, TrackKey::prop("a")))
        };
        assert!(Runtime::with(|rt| rt.targets.borrow().contains_key(&id)));

        stop(&runner);
        drop(runner);
        drop(obj);
        assert!(!Runtime::with(|rt| rt.targets.borrow().contains_key(&id)));
    }
}
