//! Effect Implementation
//!
//! An effect is a computation that re-runs whenever something it read
//! changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless lazy)
//!    to establish initial dependencies.
//!
//! 2. Every read made during the run subscribes the effect to the
//!    [`Dep`] for that location.
//!
//! 3. When a write triggers one of those deps, the effect is handed to its
//!    scheduler, or re-runs inline when it has none.
//!
//! 4. Each run reconciles the subscriptions: deps read this time are kept,
//!    deps read last time but not this time are left. See
//!    [`Dep`](super::Dep) for the marker scheme.
//!
//! # Reentrancy
//!
//! An effect that is already on the effect stack is not re-entered; the
//! nested `run` returns `Undefined` without calling the function. A trigger
//! caused by the running effect's own write skips that effect unless it opted
//! into `allow_recurse`.
//!
//! # Stopping
//!
//! Stopping is permanent. A stopped effect is removed from every dep it
//! belongs to, and later runs call the raw function without tracking.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::context::ReactiveContext;
use super::dep::{Dep, WeakDep};
use super::operations::{DebuggerEvent, Invalidation};
use super::scope::{record_effect_scope, EffectScope};
use crate::value::Value;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Re-run strategy replacing direct re-execution.
pub type Scheduler = Rc<dyn Fn(&ReactiveEffect, Invalidation)>;

/// Hook receiving track or trigger debugger events.
pub type DebugHook = Rc<dyn Fn(&DebuggerEvent)>;

/// What kind of derived value owns an effect, if any.
///
/// Derived-value effects run before ordinary effects in a trigger batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
    /// Invalidated and propagated synchronously.
    Eager,
    /// Notifies ordinary subscribers from a queued job.
    Deferred,
}

struct EffectInner {
    id: EffectId,
    f: Box<dyn Fn() -> Value>,
    scheduler: Option<Scheduler>,
    active: Cell<bool>,
    /// Deps this effect is subscribed to, in first-read order.
    deps: RefCell<Vec<WeakDep>>,
    allow_recurse: Cell<bool>,
    derived: Cell<Option<DerivedKind>>,
    /// `stop` was requested while the effect was running.
    defer_stop: Cell<bool>,
    on_track: RefCell<Option<DebugHook>>,
    on_trigger: RefCell<Option<DebugHook>>,
    on_stop: RefCell<Option<Rc<dyn Fn()>>>,
}

/// A tracked computation.
///
/// Cloning produces another handle to the same effect.
#[derive(Clone)]
pub struct ReactiveEffect(Rc<EffectInner>);

impl ReactiveEffect {
    /// Create an effect and record it in the active effect scope.
    ///
    /// The function is not run.
    pub fn new<F>(f: F, scheduler: Option<Scheduler>) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        let effect = Self(Rc::new(EffectInner {
            id: EffectId::next(),
            f: Box::new(f),
            scheduler,
            active: Cell::new(true),
            deps: RefCell::new(Vec::new()),
            allow_recurse: Cell::new(false),
            derived: Cell::new(None),
            defer_stop: Cell::new(false),
            on_track: RefCell::new(None),
            on_trigger: RefCell::new(None),
            on_stop: RefCell::new(None),
        }));
        record_effect_scope(&effect, None);
        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &ReactiveEffect) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub fn allows_recurse(&self) -> bool {
        self.0.allow_recurse.get()
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.0.allow_recurse.set(allow);
    }

    pub fn derived(&self) -> Option<DerivedKind> {
        self.0.derived.get()
    }

    pub(crate) fn set_derived(&self, kind: DerivedKind) {
        self.0.derived.set(Some(kind));
    }

    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.0.scheduler.as_ref()
    }

    pub fn set_on_track(&self, hook: Option<DebugHook>) {
        *self.0.on_track.borrow_mut() = hook;
    }

    pub fn set_on_trigger(&self, hook: Option<DebugHook>) {
        *self.0.on_trigger.borrow_mut() = hook;
    }

    pub fn set_on_stop(&self, hook: Option<Rc<dyn Fn()>>) {
        *self.0.on_stop.borrow_mut() = hook;
    }

    pub(crate) fn on_track(&self) -> Option<DebugHook> {
        self.0.on_track.borrow().clone()
    }

    pub(crate) fn on_trigger(&self) -> Option<DebugHook> {
        self.0.on_trigger.borrow().clone()
    }

    /// Number of deps the effect is currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.0
            .deps
            .borrow()
            .iter()
            .filter(|dep| dep.upgrade().is_some())
            .count()
    }

    /// Run the effect function, tracking its reads.
    ///
    /// Returns `Undefined` without running when the effect is already on the
    /// effect stack.
    pub fn run(&self) -> Value {
        if !self.is_active() {
            return (self.0.f)();
        }

        if super::Runtime::with(|rt| rt.tracking.is_running(self.id())) {
            return Value::Undefined;
        }

        tracing::trace!(effect = self.0.id.0, "effect run");
        let _ctx = ReactiveContext::enter(self);
        (self.0.f)()
    }

    /// Permanently deactivate the effect and leave every dep.
    ///
    /// Stopping a running effect takes effect when its run finishes.
    pub fn stop(&self) {
        if super::Runtime::with(|rt| rt.tracking.is_running(self.id())) {
            self.0.defer_stop.set(true);
            return;
        }

        if self.0.active.get() {
            self.cleanup();
            let on_stop = self.0.on_stop.borrow().clone();
            if let Some(on_stop) = on_stop {
                on_stop();
            }
            self.0.active.set(false);
            tracing::trace!(effect = self.0.id.0, "effect stopped");
        }
    }

    pub(crate) fn take_deferred_stop(&self) -> bool {
        self.0.defer_stop.replace(false)
    }

    pub(crate) fn push_dep(&self, dep: &Dep) {
        self.0.deps.borrow_mut().push(dep.downgrade());
    }

    /// Leave every dep.
    pub(crate) fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.0.deps.borrow_mut());
        for dep in deps.iter().filter_map(WeakDep::upgrade) {
            dep.remove(self.id());
        }
    }

    /// Mark every current dep as tracked before this run.
    pub(crate) fn init_dep_markers(&self, bit: u32) {
        for dep in self.0.deps.borrow().iter().filter_map(WeakDep::upgrade) {
            dep.mark_was_tracked(bit);
        }
    }

    /// Drop subscriptions that were tracked before this run but not during
    /// it, then clear this run's bit.
    pub(crate) fn finalize_dep_markers(&self, bit: u32) {
        let deps = std::mem::take(&mut *self.0.deps.borrow_mut());
        let mut kept = Vec::with_capacity(deps.len());
        for weak in deps {
            let Some(dep) = weak.upgrade() else {
                continue;
            };
            if dep.was_tracked(bit) && !dep.new_tracked(bit) {
                dep.remove(self.id());
            } else {
                kept.push(weak);
            }
            dep.clear_bit(bit);
        }

        // Reads during finalization cannot happen, but keep anything that
        // was pushed meanwhile.
        let mut deps = self.0.deps.borrow_mut();
        kept.append(&mut deps);
        *deps = kept;
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.0.id)
            .field("active", &self.is_active())
            .field("deps", &self.dependency_count())
            .field("derived", &self.derived())
            .finish()
    }
}

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    pub scheduler: Option<Scheduler>,
    pub allow_recurse: bool,
    pub on_track: Option<DebugHook>,
    pub on_trigger: Option<DebugHook>,
    pub on_stop: Option<Rc<dyn Fn()>>,
    /// Scope to record the effect in, besides the active one.
    pub scope: Option<EffectScope>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&ReactiveEffect, Invalidation) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(hook));
        self
    }

    pub fn scope(mut self, scope: &EffectScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }
}

/// Handle returned by [`effect`]; runs or exposes the underlying effect.
#[derive(Clone, Debug)]
pub struct Runner {
    effect: ReactiveEffect,
}

impl Runner {
    /// Force a re-run.
    pub fn run(&self) {
        self.effect.run();
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }
}

/// Register `f` as an effect and run it once.
pub fn effect(f: impl Fn() + 'static) -> Runner {
    effect_with(f, EffectOptions::default())
}

/// Register `f` as an effect with options.
pub fn effect_with(f: impl Fn() + 'static, options: EffectOptions) -> Runner {
    let effect = ReactiveEffect::new(
        move || {
            f();
            Value::Undefined
        },
        options.scheduler,
    );
    effect.set_allow_recurse(options.allow_recurse);
    effect.set_on_track(options.on_track);
    effect.set_on_trigger(options.on_trigger);
    effect.set_on_stop(options.on_stop);
    if let Some(scope) = &options.scope {
        record_effect_scope(&effect, Some(scope));
    }

    if !options.lazy {
        effect.run();
    }
    Runner { effect }
}

/// Permanently stop the effect behind `runner`.
pub fn stop(runner: &Runner) {
    runner.effect.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
