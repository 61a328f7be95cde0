//! Boxed and derived values.
//!
//! A ref is a single observable value. Reading it tracks the ref's own
//! dependency set; writing a changed value triggers it. Every kind of ref
//! implements [`RefLike`] and can be stored in a [`Value`] as an [`AnyRef`]:
//!
//! - [`Ref`]: a mutable box, deep (objects are wrapped on the way in) or
//!   shallow;
//! - [`CustomRef`]: user-supplied get/set with explicit track/trigger;
//! - [`ObjectRef`]: a property of an object, viewed as a ref;
//! - [`Computed`]: a lazily recomputed derived value;
//! - [`DeferredComputed`]: a derived value that notifies ordinary
//!   subscribers from a queued job, and only when its value changed.

mod computed;
mod custom;
mod deferred;
mod object_ref;
mod ref_impl;

pub use computed::{computed, Computed, ComputedOptions};
pub use custom::{custom_ref, CustomRef, RefHandle};
pub use deferred::{deferred_computed, DeferredComputed};
pub use object_ref::{proxy_refs, to_ref, to_refs, ObjectRef, RefsView};
pub use ref_impl::{make_ref, shallow_ref, trigger_ref, Ref};

use std::fmt;
use std::rc::Rc;

use crate::reactive::{
    DebugInfo, DebugTarget, Dep, Invalidation, Runtime, TrackKey, TrackOp, TriggerEvent,
    TriggerOp,
};
use crate::value::{PropKey, Value};

/// A single observable value.
pub trait RefLike {
    /// Read the value, tracking the read.
    fn get(&self) -> Value;

    /// Write the value. Read-only refs report a diagnostic instead.
    fn set(&self, value: Value);

    fn is_readonly(&self) -> bool {
        false
    }

    fn is_shallow(&self) -> bool {
        false
    }

    /// Type name for `Debug`.
    fn kind(&self) -> &'static str;
}

/// A type-erased ref handle. Equality is identity.
#[derive(Clone)]
pub struct AnyRef(Rc<dyn RefLike>);

impl AnyRef {
    pub fn new(inner: Rc<dyn RefLike>) -> Self {
        Self(inner)
    }

    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }

    pub fn is_readonly(&self) -> bool {
        self.0.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.is_shallow()
    }

    /// Address of the shared ref state.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &AnyRef) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for AnyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.0.kind(), self.addr())
    }
}

/// Whether `value` is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The value inside a ref, or the value itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

fn value_key() -> TrackKey {
    TrackKey::Prop(PropKey::from("value"))
}

/// Track a read of a ref's dep by the running effect.
pub(crate) fn track_ref_value(dep: &Dep, addr: usize) {
    Runtime::with(|rt| {
        if rt.tracking.is_tracking() {
            rt.track_effects(dep, || {
                DebugInfo::track(DebugTarget::Ref(addr), TrackOp::Get, Some(value_key()))
            });
        }
    });
}

/// Trigger a ref's dep.
pub(crate) fn trigger_ref_value(dep: &Dep, addr: usize, new_value: Option<Value>) {
    trigger_ref_value_with(dep, addr, new_value, Invalidation::Upstream);
}

pub(crate) fn trigger_ref_value_with(
    dep: &Dep,
    addr: usize,
    new_value: Option<Value>,
    invalidation: Invalidation,
) {
    if dep.is_empty() {
        return;
    }
    let event = TriggerEvent::new(TriggerOp::Set, value_key()).with_values(new_value, None);
    tracing::trace!(r#ref = addr, subscribers = dep.len(), "trigger ref");
    Runtime::with(|rt| {
        rt.trigger_dep(dep, invalidation, || {
            DebugInfo::trigger(DebugTarget::Ref(addr), &event)
        });
    });
}
