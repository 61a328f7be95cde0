//! Lazily recomputed derived values.
//!
//! A computed value owns an effect running its getter. The effect never
//! re-runs on its own: its scheduler only marks the value dirty and
//! notifies the computed's subscribers. The next read recomputes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::{track_ref_value, trigger_ref_value, AnyRef, RefLike};
use crate::diagnostics::{warn, Warning};
use crate::reactive::{
    DebugHook, DebuggerEvent, Dep, DerivedKind, Invalidation, ReactiveEffect, Runtime, Scheduler,
};
use crate::value::Value;

struct ComputedInner {
    effect: ReactiveEffect,
    dep: Dep,
    value: RefCell<Value>,
    dirty: Cell<bool>,
    setter: Option<Box<dyn Fn(Value)>>,
}

impl ComputedInner {
    fn addr(&self) -> usize {
        self as *const Self as *const () as usize
    }

    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            trigger_ref_value(&self.dep, self.addr(), None);
        }
    }
}

/// Marks the value dirty again if the getter unwinds.
struct DirtyOnUnwind<'a>(&'a Cell<bool>);

impl Drop for DirtyOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set(true);
        }
    }
}

impl RefLike for ComputedInner {
    fn get(&self) -> Value {
        track_ref_value(&self.dep, self.addr());
        if self.dirty.replace(false) {
            let _guard = DirtyOnUnwind(&self.dirty);
            let value = self.effect.run();
            *self.value.borrow_mut() = value;
        }
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        match &self.setter {
            Some(setter) => setter(value),
            None => warn(Warning::ComputedReadonly),
        }
    }

    fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }

    fn kind(&self) -> &'static str {
        "Computed"
    }
}

impl Drop for ComputedInner {
    fn drop(&mut self) {
        let effect = self.effect.clone();
        Runtime::try_with(move |_| effect.stop());
    }
}

/// Debug hooks for a computed value's effect.
#[derive(Clone, Default)]
pub struct ComputedOptions {
    pub on_track: Option<DebugHook>,
    pub on_trigger: Option<DebugHook>,
}

impl ComputedOptions {
    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }
}

/// A cached derived value.
#[derive(Clone)]
pub struct Computed(Rc<ComputedInner>);

impl Computed {
    /// A read-only computed value.
    pub fn new(getter: impl Fn() -> Value + 'static) -> Self {
        Self::build(Box::new(getter), None, ComputedOptions::default())
    }

    /// A writable computed value. Writes are handed to `setter`.
    pub fn with_setter(
        getter: impl Fn() -> Value + 'static,
        setter: impl Fn(Value) + 'static,
    ) -> Self {
        Self::build(Box::new(getter), Some(Box::new(setter)), ComputedOptions::default())
    }

    pub fn with_options(getter: impl Fn() -> Value + 'static, options: ComputedOptions) -> Self {
        Self::build(Box::new(getter), None, options)
    }

    fn build(
        getter: Box<dyn Fn() -> Value>,
        setter: Option<Box<dyn Fn(Value)>>,
        options: ComputedOptions,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner>| {
            let weak = weak.clone();
            let scheduler: Scheduler = Rc::new(move |_: &ReactiveEffect, _: Invalidation| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });
            let effect = ReactiveEffect::new(getter, Some(scheduler));
            effect.set_derived(DerivedKind::Eager);
            effect.set_on_track(options.on_track);
            effect.set_on_trigger(options.on_trigger);
            ComputedInner {
                effect,
                dep: Dep::new(),
                value: RefCell::new(Value::Undefined),
                dirty: Cell::new(true),
                setter,
            }
        });
        Self(inner)
    }

    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }

    /// Whether the next read recomputes.
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn is_readonly(&self) -> bool {
        self.0.is_readonly()
    }

    /// The effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect {
        &self.0.effect
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.0.dirty.get())
            .field("value", &self.0.value.borrow())
            .finish()
    }
}

impl From<Computed> for AnyRef {
    fn from(c: Computed) -> Self {
        AnyRef::new(c.0)
    }
}

impl From<Computed> for Value {
    fn from(c: Computed) -> Self {
        Value::Ref(c.into())
    }
}

/// Shorthand for [`Computed::new`].
pub fn computed(getter: impl Fn() -> Value + 'static) -> Computed {
    Computed::new(getter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::take_warnings;
    use crate::observe::reactive;
    use crate::reactive::effect;
    use crate::refs::Ref;
    use serde_json::json;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn counter() -> Rc<Cell<i32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn computes_lazily_and_caches() {
        let state = reactive(json!({"a": 1})).into_reactive().unwrap();
        let calls = counter();
        let double = {
            let (state, calls) = (state.clone(), calls.clone());
            computed(move || {
                calls.set(calls.get() + 1);
                Value::from(state.get("a").as_f64().unwrap_or_default() * 2.0)
            })
        };
        assert_eq!(calls.get(), 0);

        assert_eq!(double.get(), Value::from(2));
        assert_eq!(double.get(), Value::from(2));
        assert_eq!(calls.get(), 1);

        state.set("a", 2);
        assert_eq!(calls.get(), 1);
        assert!(double.is_dirty());
        assert_eq!(double.get(), Value::from(4));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn effects_reading_a_computed_rerun_on_change() {
        let count = Ref::new(1);
        let plus_one = {
            let count = count.clone();
            computed(move || Value::from(count.get().as_f64().unwrap_or_default() + 1.0))
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _runner = {
            let (plus_one, seen) = (plus_one.clone(), seen.clone());
            effect(move || seen.borrow_mut().push(plus_one.get()))
        };

        count.set(5);
        assert_eq!(*seen.borrow(), vec![Value::from(2), Value::from(6)]);
    }

    #[test]
    fn reading_a_source_and_its_computed_runs_once_per_write() {
        let src = Ref::new(1);
        let doubled = {
            let src = src.clone();
            computed(move || Value::from(src.get().as_f64().unwrap_or_default() * 2.0))
        };
        let quadrupled = {
            let doubled = doubled.clone();
            computed(move || Value::from(doubled.get().as_f64().unwrap_or_default() * 2.0))
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _runner = {
            let (src, doubled, quadrupled, seen) =
                (src.clone(), doubled.clone(), quadrupled.clone(), seen.clone());
            effect(move || {
                seen.borrow_mut()
                    .push((src.get(), doubled.get(), quadrupled.get()));
            })
        };

        src.set(2);
        assert_eq!(
            *seen.borrow(),
            vec![
                (Value::from(1), Value::from(2), Value::from(4)),
                (Value::from(2), Value::from(4), Value::from(8)),
            ]
        );
    }

    #[test]
    fn writes_without_a_setter_warn() {
        let c = computed(|| Value::from(1));
        take_warnings();
        c.set(2);
        assert_eq!(take_warnings(), vec![Warning::ComputedReadonly]);
        assert!(c.is_readonly());
    }

    #[test]
    fn writable_computed_forwards_to_setter() {
        let source = Ref::new(1);
        let c = {
            let (get_src, set_src) = (source.clone(), source.clone());
            Computed::with_setter(move || get_src.get(), move |v| set_src.set(v))
        };
        c.set(10);
        assert_eq!(source.get(), Value::from(10));
        assert_eq!(c.get(), Value::from(10));
    }

    #[test]
    fn a_panicking_getter_leaves_the_value_dirty() {
        let fail = Rc::new(Cell::new(true));
        let c = {
            let fail = fail.clone();
            computed(move || {
                if fail.get() {
                    panic!("getter failed");
                }
                Value::from(1)
            })
        };

        let result = catch_unwind(AssertUnwindSafe(|| c.get()));
        assert!(result.is_err());
        assert!(c.is_dirty());

        fail.set(false);
        assert_eq!(c.get(), Value::from(1));
    }
}
