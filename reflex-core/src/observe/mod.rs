//! Reactive Object Factory
//!
//! Wrapping turns a raw object into a [`Reactive`] handle whose reads are
//! tracked and whose writes trigger. Four variants exist:
//!
//! | variant            | tracks reads | accepts writes | nested values      |
//! |--------------------|--------------|----------------|--------------------|
//! | `Reactive`         | yes          | yes            | wrapped reactive   |
//! | `ShallowReactive`  | yes          | yes            | returned raw       |
//! | `Readonly`         | no           | no             | wrapped read-only  |
//! | `ShallowReadonly`  | no           | no             | returned raw       |
//!
//! # Identity
//!
//! Wrapping the same object with the same variant yields the same wrapper
//! for as long as any handle to that wrapper is alive. Read-only dominates:
//! `reactive(readonly(x))` is `readonly(x)`. The converse is not a no-op:
//! `readonly(reactive(x))` is a new read-only wrapper over the reactive one,
//! and reads through it still track.
//!
//! # Backends
//!
//! Record and list wrappers are built by whichever backend is active when
//! they are created (see [`Backend`]); collections share one instrumentation
//! regardless of backend.

mod access;
mod array;
mod backend;
mod collection;
mod descriptor;
mod handlers;
mod interception;
mod wrapper;

pub use access::{del, get, has, own_keys, set};
pub use backend::{
    active_backend, disable_interception, enable_interception, reset_interception, with_backend,
    Backend,
};
pub use collection::CollectionIter;
pub use wrapper::{Reactive, WrapperId};

pub(crate) use wrapper::WrapperInner;

use std::collections::HashMap;
use std::rc::Weak;

use crate::diagnostics::{warn, Warning};
use crate::value::{Obj, ObjectId, ShapeKind, Value};
use crate::reactive::Runtime;
use wrapper::{Handler, Target};

/// Wrapping mode. A wrapper never changes variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl Variant {
    pub fn is_readonly(&self) -> bool {
        matches!(self, Self::Readonly | Self::ShallowReadonly)
    }

    pub fn is_shallow(&self) -> bool {
        matches!(self, Self::ShallowReactive | Self::ShallowReadonly)
    }

    fn index(&self) -> usize {
        match self {
            Self::Reactive => 0,
            Self::ShallowReactive => 1,
            Self::Readonly => 2,
            Self::ShallowReadonly => 3,
        }
    }

    pub(crate) fn access(&self) -> Access {
        Access {
            readonly: self.is_readonly(),
            shallow: self.is_shallow(),
        }
    }
}

/// The flags a handler specializes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Access {
    pub readonly: bool,
    pub shallow: bool,
}

/// Plain records and lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommonKind {
    Record,
    List,
}

/// Map-like and set-like containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl CollectionKind {
    pub fn is_weak(&self) -> bool {
        matches!(self, Self::WeakMap | Self::WeakSet)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map | Self::WeakMap)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Map => "Map",
            Self::Set => "Set",
            Self::WeakMap => "WeakMap",
            Self::WeakSet => "WeakSet",
        }
    }
}

/// Shape classification decided once, at wrap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Common(CommonKind),
    Collection(CollectionKind),
}

impl TargetKind {
    /// Classify a raw object. Opaque objects are not observable.
    pub fn classify(obj: &Obj) -> Option<Self> {
        match obj.kind() {
            ShapeKind::Record => Some(Self::Common(CommonKind::Record)),
            ShapeKind::List => Some(Self::Common(CommonKind::List)),
            ShapeKind::Map => Some(Self::Collection(CollectionKind::Map)),
            ShapeKind::Set => Some(Self::Collection(CollectionKind::Set)),
            ShapeKind::WeakMap => Some(Self::Collection(CollectionKind::WeakMap)),
            ShapeKind::WeakSet => Some(Self::Collection(CollectionKind::WeakSet)),
            ShapeKind::Opaque => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Common(CommonKind::Record) => "Object",
            Self::Common(CommonKind::List) => "Array",
            Self::Collection(kind) => kind.name(),
        }
    }
}

/// What a wrapper is memoized under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum IdentityKey {
    Raw(ObjectId),
    Wrapper(WrapperId),
}

/// One identity map per variant.
#[derive(Default)]
pub(crate) struct IdentityMaps {
    maps: [HashMap<IdentityKey, Weak<WrapperInner>>; 4],
}

impl IdentityMaps {
    fn get(&self, variant: Variant, key: IdentityKey) -> Option<Reactive> {
        self.maps[variant.index()]
            .get(&key)
            .and_then(Weak::upgrade)
            .map(Reactive::from_inner)
    }

    fn insert(&mut self, variant: Variant, key: IdentityKey, wrapper: &Reactive) {
        self.maps[variant.index()].insert(key, wrapper.downgrade());
    }

    /// Drop the entry for a wrapper that is being destroyed.
    pub(crate) fn forget(&mut self, variant: Variant, key: IdentityKey) {
        let map = &mut self.maps[variant.index()];
        if map.get(&key).is_some_and(|weak| weak.strong_count() == 0) {
            map.remove(&key);
        }
    }

    /// Number of entries for a variant, live or not.
    #[cfg(test)]
    fn entry_count(&self, variant: Variant) -> usize {
        self.maps[variant.index()].len()
    }

    /// Number of live entries for a variant.
    pub(crate) fn len(&self, variant: Variant) -> usize {
        self.maps[variant.index()]
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Wrap `value` with `variant`.
///
/// Primitives are returned unchanged with a diagnostic. Refs, opaque
/// objects and objects marked with [`mark_raw`] are returned unchanged.
pub fn wrap(value: impl Into<Value>, variant: Variant) -> Value {
    create_reactive_object(value.into(), variant)
}

/// Deep mutable wrapper.
pub fn reactive(value: impl Into<Value>) -> Value {
    wrap(value, Variant::Reactive)
}

/// Mutable wrapper whose nested values are returned raw.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    wrap(value, Variant::ShallowReactive)
}

/// Deep read-only wrapper.
pub fn readonly(value: impl Into<Value>) -> Value {
    wrap(value, Variant::Readonly)
}

/// Read-only wrapper whose nested values are returned raw.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    wrap(value, Variant::ShallowReadonly)
}

fn create_reactive_object(value: Value, variant: Variant) -> Value {
    let (target, raw, key) = match &value {
        Value::Reactive(wrapper) => {
            // Only read-only over a mutable wrapper is re-derived.
            if !(variant.is_readonly() && !wrapper.variant().is_readonly()) {
                return value;
            }
            (
                Target::Observed(wrapper.clone()),
                wrapper.raw().clone(),
                IdentityKey::Wrapper(wrapper.id()),
            )
        }
        Value::Object(obj) => {
            if obj.is_skipped() {
                return value;
            }
            (
                Target::Raw(obj.clone()),
                obj.clone(),
                IdentityKey::Raw(obj.id()),
            )
        }
        Value::Ref(_) => return value,
        other => {
            warn(Warning::NotObservable(other.to_string()));
            return value;
        }
    };

    let existing = Runtime::with(|rt| {
        rt.purge_stale_wrappers();
        rt.identity.borrow().get(variant, key)
    });
    if let Some(existing) = existing {
        return Value::Reactive(existing);
    }

    let Some(kind) = TargetKind::classify(&raw) else {
        return value;
    };

    let backend = active_backend();
    let handler = Handler::build(&raw, kind, variant, backend);
    let wrapper = Reactive::new(target, raw, variant, kind, backend, handler, key);
    Runtime::with(|rt| rt.identity.borrow_mut().insert(variant, key, &wrapper));

    tracing::trace!(wrapper = ?wrapper, ?backend, "created wrapper");
    Value::Reactive(wrapper)
}

/// Wrap a nested value in the same variant family.
pub(crate) fn wrap_nested(value: Value, readonly: bool) -> Value {
    match value {
        Value::Object(_) | Value::Reactive(_) => {
            if readonly {
                self::readonly(value)
            } else {
                reactive(value)
            }
        }
        other => other,
    }
}

/// Wrap a collection element according to a variant.
pub(crate) fn wrap_for(variant: Variant, value: Value) -> Value {
    if variant.is_shallow() {
        value
    } else {
        wrap_nested(value, variant.is_readonly())
    }
}

/// Whether `value` is a mutable wrapper, or a read-only wrapper over one.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Reactive(wrapper) => wrapper.is_reactive(),
        _ => false,
    }
}

/// Whether `value` is a read-only wrapper.
pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Reactive(wrapper) if wrapper.variant().is_readonly())
}

/// Whether `value` is a shallow wrapper.
pub fn is_shallow(value: &Value) -> bool {
    matches!(value, Value::Reactive(wrapper) if wrapper.variant().is_shallow())
}

/// Whether `value` is any wrapper.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// The raw object behind any number of wrappers. Other values are returned
/// unchanged.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(wrapper) => Value::Object(wrapper.raw().clone()),
        other => other.clone(),
    }
}

/// Opt a raw object out of wrapping permanently.
pub fn mark_raw(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(obj) = &value {
        obj.mark_skip();
    }
    value
}

/// Number of live wrappers memoized for a variant on this thread.
pub fn wrapper_count(variant: Variant) -> usize {
    Runtime::with(|rt| rt.identity.borrow().len(variant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::take_warnings;
    use crate::value::Obj;

    #[test]
    fn same_input_same_variant_same_wrapper() {
        let obj = Obj::record();
        let a = reactive(obj.clone());
        let b = reactive(obj.clone());
        assert_eq!(a, b);
        assert_eq!(to_raw(&a), Value::Object(obj.clone()));

        let r = readonly(obj.clone());
        assert_ne!(a, r);
        assert_eq!(readonly(obj), r);
    }

    #[test]
    fn readonly_dominates() {
        let obj = Obj::record();
        let ro = readonly(obj.clone());
        assert_eq!(reactive(ro.clone()), ro);

        let rx = reactive(obj.clone());
        let ro_over = readonly(rx.clone());
        assert_ne!(ro_over, ro);
        assert!(is_reactive(&ro_over));
        assert!(is_readonly(&ro_over));
        assert_eq!(to_raw(&ro_over), Value::Object(obj));
    }

    #[test]
    fn primitives_warn_and_pass_through() {
        take_warnings();
        assert_eq!(reactive(1), Value::from(1));
        assert!(matches!(
            take_warnings().as_slice(),
            [Warning::NotObservable(_)]
        ));
    }

    #[test]
    fn skipped_and_opaque_objects_are_not_wrapped() {
        let skipped = mark_raw(Obj::record());
        assert!(!is_proxy(&reactive(skipped)));
        assert!(!is_proxy(&reactive(Obj::opaque("Date"))));
    }

    #[test]
    fn identity_is_released_with_the_last_handle() {
        let obj = Obj::record();
        let before = wrapper_count(Variant::ShallowReadonly);
        let wrapper = shallow_readonly(obj.clone());
        assert_eq!(wrapper_count(Variant::ShallowReadonly), before + 1);
        drop(wrapper);
        assert_eq!(wrapper_count(Variant::ShallowReadonly), before);
    }

    #[test]
    fn identity_cleanup_during_a_borrow_is_deferred() {
        let obj = Obj::record();
        let before = Runtime::with(|rt| rt.identity.borrow().entry_count(Variant::Readonly));
        let wrapper = readonly(obj.clone());
        Runtime::with(|rt| {
            let _held = rt.identity.borrow();
            drop(wrapper);
        });
        let stale = Runtime::with(|rt| rt.identity.borrow().entry_count(Variant::Readonly));
        assert_eq!(stale, before + 1);

        // The next lookup applies the queued removal.
        readonly(Obj::record());
        let after = Runtime::with(|rt| rt.identity.borrow().entry_count(Variant::Readonly));
        assert_eq!(after, before);
    }
}
