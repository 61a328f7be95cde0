//! Effect Scopes
//!
//! A scope collects the effects (and nested scopes) created while it is
//! running so they can be stopped together. Scopes also hold dispose
//! callbacks registered with [`on_scope_dispose`].
//!
//! A non-detached scope created while another scope is active becomes its
//! child and is stopped with it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::ReactiveEffect;
use super::runtime::Runtime;
use crate::diagnostics::{warn, Warning};

struct ScopeInner {
    active: Cell<bool>,
    effects: RefCell<Vec<ReactiveEffect>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    scopes: RefCell<Vec<EffectScope>>,
    parent: RefCell<Weak<ScopeInner>>,
}

/// A group of effects stopped together.
#[derive(Clone)]
pub struct EffectScope(Rc<ScopeInner>);

impl EffectScope {
    /// Create a scope. Unless `detached`, it is attached to the active scope.
    pub fn new(detached: bool) -> Self {
        let scope = Self(Rc::new(ScopeInner {
            active: Cell::new(true),
            effects: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            scopes: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
        }));

        if !detached {
            if let Some(parent) = get_current_scope() {
                *scope.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
                parent.0.scopes.borrow_mut().push(scope.clone());
            }
        }
        scope
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of effects recorded in this scope.
    pub fn effect_count(&self) -> usize {
        self.0.effects.borrow().len()
    }

    /// Run `f` with this scope active.
    ///
    /// Returns `None`, with a diagnostic, when the scope has been stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            warn(Warning::InactiveScope);
            return None;
        }
        let _active = ScopeGuard::enter(self);
        Some(f())
    }

    /// Make this scope the active one until [`off`](Self::off).
    pub fn on(&self) {
        Runtime::with(|rt| rt.scopes.borrow_mut().push(self.clone()));
    }

    pub fn off(&self) {
        let popped = Runtime::with(|rt| rt.scopes.borrow_mut().pop());
        if let Some(popped) = popped {
            debug_assert!(popped.ptr_eq(self), "EffectScope::off out of order");
        }
    }

    /// Stop every collected effect, run dispose callbacks, stop child
    /// scopes, and detach from the parent.
    pub fn stop(&self) {
        self.stop_inner(false);
    }

    fn stop_inner(&self, from_parent: bool) {
        if !self.is_active() {
            return;
        }

        let effects = std::mem::take(&mut *self.0.effects.borrow_mut());
        for effect in &effects {
            effect.stop();
        }

        let cleanups = std::mem::take(&mut *self.0.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }

        let scopes = std::mem::take(&mut *self.0.scopes.borrow_mut());
        for scope in &scopes {
            scope.stop_inner(true);
        }

        if !from_parent {
            let parent = self.0.parent.borrow().upgrade();
            if let Some(parent) = parent {
                parent
                    .scopes
                    .borrow_mut()
                    .retain(|child| !Rc::ptr_eq(&child.0, &self.0));
            }
        }

        self.0.active.set(false);
        tracing::debug!(
            effects = effects.len(),
            children = scopes.len(),
            "effect scope stopped"
        );
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("effects", &self.effect_count())
            .field("scopes", &self.0.scopes.borrow().len())
            .finish()
    }
}

struct ScopeGuard(EffectScope);

impl ScopeGuard {
    fn enter(scope: &EffectScope) -> Self {
        scope.on();
        Self(scope.clone())
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.0.off();
    }
}

/// Create an effect scope.
pub fn effect_scope(detached: bool) -> EffectScope {
    EffectScope::new(detached)
}

/// The innermost running scope.
pub fn get_current_scope() -> Option<EffectScope> {
    Runtime::with(|rt| rt.scopes.borrow().last().cloned())
}

/// Register a callback run when the active scope stops.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    match get_current_scope() {
        Some(scope) => scope.0.cleanups.borrow_mut().push(Box::new(f)),
        None => warn(Warning::NoActiveScope),
    }
}

/// Record `effect` in `scope`, or in the active scope when `None`.
pub(crate) fn record_effect_scope(effect: &ReactiveEffect, scope: Option<&EffectScope>) {
    let scope = match scope {
        Some(scope) => Some(scope.clone()),
        None => get_current_scope(),
    };
    if let Some(scope) = scope.filter(EffectScope::is_active) {
        let mut effects = scope.0.effects.borrow_mut();
        if !effects.iter().any(|e| e.ptr_eq(effect)) {
            effects.push(effect.clone());
        }
    }
}
