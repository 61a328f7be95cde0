//! Derived values with deferred notification.
//!
//! A deferred computed is invalidated synchronously like [`Computed`], but
//! its ordinary subscribers are notified from one queued job per burst of
//! upstream writes, and only when the recomputed value differs from the
//! value before the burst. Deferred computeds chained on this one are
//! invalidated synchronously, so reading them mid-burst is never stale.
//!
//! [`Computed`]: super::Computed

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::{track_ref_value, trigger_ref_value, AnyRef, RefLike};
use crate::diagnostics::{warn, Warning};
use crate::reactive::{
    queue_job, Dep, DerivedKind, Invalidation, ReactiveEffect, Runtime, Scheduler,
};
use crate::value::{has_changed, Value};

struct DeferredInner {
    effect: ReactiveEffect,
    dep: Dep,
    value: RefCell<Value>,
    dirty: Cell<bool>,
    /// Set when an upstream deferred computed invalidated us synchronously.
    compare_target: RefCell<Option<Value>>,
    scheduled: Cell<bool>,
}

impl DeferredInner {
    fn addr(&self) -> usize {
        self as *const Self as *const () as usize
    }

    fn current(&self) -> Value {
        if self.dirty.replace(false) {
            let value = self.effect.run();
            *self.value.borrow_mut() = value;
        }
        self.value.borrow().clone()
    }

    fn schedule(self: &Rc<Self>, invalidation: Invalidation) {
        if !self.dep.is_empty() {
            if invalidation == Invalidation::Computed {
                *self.compare_target.borrow_mut() = Some(self.value.borrow().clone());
            } else if !self.scheduled.replace(true) {
                let compare = self
                    .compare_target
                    .borrow_mut()
                    .take()
                    .unwrap_or_else(|| self.value.borrow().clone());
                let weak = Rc::downgrade(self);
                queue_job(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.notify(&compare);
                    }
                });
            }
            Runtime::with(|rt| rt.propagate_deferred(&self.dep));
        }
        self.dirty.set(true);
    }

    fn notify(&self, compare: &Value) {
        if self.effect.is_active() {
            let value = self.current();
            if has_changed(&value, compare) {
                trigger_ref_value(&self.dep, self.addr(), Some(value));
            }
        }
        self.scheduled.set(false);
    }
}

impl RefLike for DeferredInner {
    fn get(&self) -> Value {
        track_ref_value(&self.dep, self.addr());
        self.current()
    }

    fn set(&self, _value: Value) {
        warn(Warning::ComputedReadonly);
    }

    fn is_readonly(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "DeferredComputed"
    }
}

impl Drop for DeferredInner {
    fn drop(&mut self) {
        let effect = self.effect.clone();
        Runtime::try_with(move |_| effect.stop());
    }
}

/// A read-only derived value whose subscribers are notified from the job
/// queue.
#[derive(Clone)]
pub struct DeferredComputed(Rc<DeferredInner>);

impl DeferredComputed {
    pub fn new(getter: impl Fn() -> Value + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<DeferredInner>| {
            let weak = weak.clone();
            let scheduler: Scheduler = Rc::new(move |_: &ReactiveEffect, invalidation: Invalidation| {
                if let Some(inner) = weak.upgrade() {
                    inner.schedule(invalidation);
                }
            });
            let effect = ReactiveEffect::new(getter, Some(scheduler));
            effect.set_derived(DerivedKind::Deferred);
            DeferredInner {
                effect,
                dep: Dep::new(),
                value: RefCell::new(Value::Undefined),
                dirty: Cell::new(true),
                compare_target: RefCell::new(None),
                scheduled: Cell::new(false),
            }
        });
        Self(inner)
    }

    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.0.effect
    }
}

impl fmt::Debug for DeferredComputed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredComputed")
            .field("dirty", &self.0.dirty.get())
            .field("scheduled", &self.0.scheduled.get())
            .finish()
    }
}

impl From<DeferredComputed> for AnyRef {
    fn from(c: DeferredComputed) -> Self {
        AnyRef::new(c.0)
    }
}

impl From<DeferredComputed> for Value {
    fn from(c: DeferredComputed) -> Self {
        Value::Ref(c.into())
    }
}

/// Shorthand for [`DeferredComputed::new`].
pub fn deferred_computed(getter: impl Fn() -> Value + 'static) -> DeferredComputed {
    DeferredComputed::new(getter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, flush_jobs};
    use crate::refs::Ref;

    fn as_num(v: Value) -> f64 {
        v.as_f64().unwrap_or_default()
    }

    #[test]
    fn subscribers_run_once_per_flush() {
        let src = Ref::new(0);
        let c = {
            let src = src.clone();
            deferred_computed(move || src.get())
        };
        let runs = Rc::new(Cell::new(0));
        let _runner = {
            let (c, runs) = (c.clone(), runs.clone());
            effect(move || {
                c.get();
                runs.set(runs.get() + 1);
            })
        };

        src.set(1);
        src.set(2);
        src.set(3);
        assert_eq!(runs.get(), 1);
        flush_jobs();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unchanged_results_do_not_notify() {
        let src = Ref::new(0);
        let c = {
            let src = src.clone();
            deferred_computed(move || src.get())
        };
        let runs = Rc::new(Cell::new(0));
        let _runner = {
            let (c, runs) = (c.clone(), runs.clone());
            effect(move || {
                c.get();
                runs.set(runs.get() + 1);
            })
        };

        src.set(1);
        src.set(0);
        flush_jobs();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn chained_values_are_fresh_before_the_flush() {
        let src = Ref::new(1);
        let c1 = {
            let src = src.clone();
            deferred_computed(move || src.get())
        };
        let c2 = {
            let c1 = c1.clone();
            deferred_computed(move || Value::from(as_num(c1.get()) * 10.0))
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _runner = {
            let (c2, seen) = (c2.clone(), seen.clone());
            effect(move || seen.borrow_mut().push(c2.get()))
        };

        src.set(2);
        assert_eq!(c2.get(), Value::from(20));
        flush_jobs();
        assert_eq!(*seen.borrow(), vec![Value::from(10), Value::from(20)]);
    }
}
