//! Shared read/write semantics for record and list wrappers.
//!
//! Both backends route every property access through the functions in this
//! module, specialized by [`Access`]. This is what makes the backends emit
//! the same track and trigger calls for the same operations: they differ in
//! how an access reaches these functions, never in what happens once it
//! does.

use super::array;
use super::wrapper::{Reactive, Target};
use super::{to_raw, wrap_nested, Access, Backend};
use crate::diagnostics::{warn, Warning};
use crate::reactive::{track, trigger, TrackKey, TrackOp, TriggerEvent, TriggerOp};
use crate::value::{has_changed, list_len, PropKey, Value, MAX_LIST_LEN};

/// Property-level operations of a record or list wrapper.
pub(crate) trait ObjectHandler {
    fn backend(&self) -> Backend;

    fn get(&self, wrapper: &Reactive, key: &PropKey) -> Value;

    fn set(&self, wrapper: &Reactive, key: PropKey, value: Value) -> bool;

    fn delete_property(&self, wrapper: &Reactive, key: &PropKey) -> bool;

    fn has(&self, wrapper: &Reactive, key: &PropKey) -> bool;

    fn own_keys(&self, wrapper: &Reactive) -> Vec<PropKey>;

    /// An instrumented list method changed the raw list.
    fn list_mutated(&self, _wrapper: &Reactive) {}
}

/// Read `key`: track it (unless read-only), then unbox refs and wrap nested
/// objects (unless shallow).
pub(crate) fn get(wrapper: &Reactive, key: &PropKey, access: Access) -> Value {
    let res = match wrapper.target() {
        Target::Observed(inner) => inner.get(key),
        Target::Raw(raw) => {
            let res = raw.get(key);
            if !access.readonly {
                track(raw, TrackOp::Get, TrackKey::Prop(key.clone()));
            }
            res
        }
    };

    if access.shallow {
        return res;
    }

    if let Value::Ref(r) = &res {
        // Index reads into a list keep their refs.
        let list_index = wrapper.raw().is_list() && key.as_index().is_some();
        return if list_index { res } else { r.get() };
    }

    wrap_nested(res, access.readonly)
}

/// Write `key`. Returns whether the write was accepted.
pub(crate) fn set(wrapper: &Reactive, key: PropKey, value: Value, access: Access) -> bool {
    if access.readonly {
        warn(Warning::ReadonlySet {
            key: key.to_string(),
        });
        return true;
    }

    let raw = wrapper.raw();
    let is_list = raw.is_list();
    if is_list && key.as_index().is_none() && !key.is_length() {
        warn(Warning::UnsupportedOperation {
            operation: format!("setting property \"{key}\""),
            kind: "Array".into(),
        });
        return false;
    }
    if is_list && key.is_length() && list_len(&value).is_none() {
        warn(Warning::InvalidLength {
            value: value.to_string(),
        });
        return false;
    }
    if is_list && key.as_index().is_some_and(|i| i >= MAX_LIST_LEN) {
        warn(Warning::InvalidIndex {
            index: key.to_string(),
        });
        return false;
    }

    let mut value = value;
    let mut old = raw.get(&key);
    if !access.shallow {
        value = to_raw(&value);
        old = to_raw(&old);
        if !is_list {
            if let Value::Ref(r) = &old {
                if !matches!(value, Value::Ref(_)) {
                    r.set(value);
                    return true;
                }
            }
        }
    }

    let had_key = raw.has_own(&key);
    raw.insert(key.clone(), value.clone());

    if !had_key {
        trigger(
            raw,
            TriggerEvent::new(TriggerOp::Add, TrackKey::Prop(key)).with_values(Some(value), None),
        );
    } else if has_changed(&value, &old) {
        trigger(
            raw,
            TriggerEvent::new(TriggerOp::Set, TrackKey::Prop(key))
                .with_values(Some(value), Some(old)),
        );
    }
    true
}

/// Delete `key`. A list index is removed with splice semantics.
pub(crate) fn delete_property(wrapper: &Reactive, key: &PropKey, access: Access) -> bool {
    if access.readonly {
        warn(Warning::ReadonlyDelete {
            key: key.to_string(),
        });
        return true;
    }

    let raw = wrapper.raw();
    if raw.is_list() {
        return match key.as_index() {
            Some(index) if index < raw.len() => {
                array::mutate(wrapper, array::ListEdit::remove_at(index));
                true
            }
            _ => false,
        };
    }

    let had_key = raw.has_own(key);
    let old = raw.get(key);
    raw.remove(key);
    if had_key {
        trigger(
            raw,
            TriggerEvent::new(TriggerOp::Delete, TrackKey::Prop(key.clone()))
                .with_values(None, Some(old)),
        );
    }
    had_key
}

/// Whether the target has `key`, tracked as a `has` read.
pub(crate) fn has(wrapper: &Reactive, key: &PropKey, access: Access) -> bool {
    match wrapper.target() {
        Target::Observed(inner) => inner.has(key),
        Target::Raw(raw) => {
            let res = raw.has_own(key);
            if !access.readonly {
                track(raw, TrackOp::Has, TrackKey::Prop(key.clone()));
            }
            res
        }
    }
}

/// Own keys, tracked as an iteration (lists iterate through `length`).
pub(crate) fn own_keys(wrapper: &Reactive, access: Access) -> Vec<PropKey> {
    match wrapper.target() {
        Target::Observed(inner) => inner.own_keys(),
        Target::Raw(raw) => {
            if !access.readonly {
                let key = if raw.is_list() {
                    TrackKey::Prop(PropKey::length())
                } else {
                    TrackKey::Iterate
                };
                track(raw, TrackOp::Iterate, key);
            }
            raw.own_keys()
        }
    }
}
