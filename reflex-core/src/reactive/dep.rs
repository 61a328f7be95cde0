//! Dependency Sets
//!
//! A [`Dep`] is the set of effects subscribed to one observable location.
//! Besides the subscribers it carries two generation bitmasks used during a
//! single effect run:
//!
//! - `w` ("was tracked"): the running effect was subscribed before this run.
//! - `n` ("newly tracked"): the running effect read this location during this
//!   run.
//!
//! Each nesting level of effect runs owns one bit, so nested runs mark the
//! same set independently. After a run, a set that was tracked but not newly
//! tracked is stale and the effect leaves it; everything else is kept. This
//! replaces "unsubscribe everything, then resubscribe" with work proportional
//! to the dependencies that actually changed.
//!
//! Deps are owned by the target registry (or by a boxed value). Effects only
//! hold [`WeakDep`] back-references.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::effect::{EffectId, ReactiveEffect};

struct DepInner {
    w: Cell<u32>,
    n: Cell<u32>,
    subscribers: RefCell<IndexMap<EffectId, ReactiveEffect>>,
}

/// A set of subscribed effects for one location.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            w: Cell::new(0),
            n: Cell::new(0),
            subscribers: RefCell::new(IndexMap::new()),
        }))
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, effect: &ReactiveEffect) -> bool {
        self.0.subscribers.borrow().contains_key(&effect.id())
    }

    pub(crate) fn insert(&self, effect: ReactiveEffect) {
        self.0.subscribers.borrow_mut().insert(effect.id(), effect);
    }

    pub(crate) fn remove(&self, id: EffectId) {
        // Drop the handle outside the borrow; it may release the last owner
        // of objects whose teardown touches other deps.
        let removed = self.0.subscribers.borrow_mut().shift_remove(&id);
        drop(removed);
    }

    /// Subscribers in subscription order.
    pub(crate) fn subscribers(&self) -> Vec<ReactiveEffect> {
        self.0.subscribers.borrow().values().cloned().collect()
    }

    pub(crate) fn was_tracked(&self, bit: u32) -> bool {
        self.0.w.get() & bit != 0
    }

    pub(crate) fn new_tracked(&self, bit: u32) -> bool {
        self.0.n.get() & bit != 0
    }

    pub(crate) fn mark_was_tracked(&self, bit: u32) {
        self.0.w.set(self.0.w.get() | bit);
    }

    pub(crate) fn mark_new_tracked(&self, bit: u32) {
        self.0.n.set(self.0.n.get() | bit);
    }

    pub(crate) fn clear_bit(&self, bit: u32) {
        self.0.w.set(self.0.w.get() & !bit);
        self.0.n.set(self.0.n.get() & !bit);
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.len())
            .field("w", &self.0.w.get())
            .field("n", &self.0.n.get())
            .finish()
    }
}

/// Non-owning back-reference from an effect to a dep.
#[derive(Clone)]
pub(crate) struct WeakDep(Weak<DepInner>);

impl WeakDep {
    pub fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(Dep)
    }

    pub fn points_to(&self, dep: &Dep) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&dep.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_per_bit() {
        let dep = Dep::new();
        dep.mark_was_tracked(1 << 1);
        dep.mark_new_tracked(1 << 2);

        assert!(dep.was_tracked(1 << 1));
        assert!(!dep.was_tracked(1 << 2));
        assert!(dep.new_tracked(1 << 2));

        dep.clear_bit(1 << 1);
        assert!(!dep.was_tracked(1 << 1));
        assert!(dep.new_tracked(1 << 2));
    }

    #[test]
    fn weak_dep_does_not_keep_dep_alive() {
        let dep = Dep::new();
        let weak = dep.downgrade();
        assert!(weak.points_to(&dep));
        drop(dep);
        assert!(weak.upgrade().is_none());
    }
}
