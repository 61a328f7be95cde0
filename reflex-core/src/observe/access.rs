//! Free-standing property helpers.
//!
//! These accept any value: a wrapper is accessed through its handler (so the
//! access is tracked or triggers), a raw object is accessed directly and
//! silently. Anything else reports [`Warning::NotAnObject`].

use crate::diagnostics::{warn, Warning};
use crate::value::{PropKey, Value};

fn not_an_object(method: &str) {
    warn(Warning::NotAnObject {
        method: method.to_string(),
    });
}

/// Read `key` from `target`.
pub fn get(target: &Value, key: impl Into<PropKey>) -> Value {
    match target {
        Value::Reactive(wrapper) => wrapper.get(key),
        Value::Object(obj) => obj.get(&key.into()),
        _ => {
            not_an_object("get");
            Value::Undefined
        }
    }
}

/// Write `key` on `target`, adding it when missing. Returns the written
/// value.
pub fn set(target: &Value, key: impl Into<PropKey>, value: impl Into<Value>) -> Value {
    let value = value.into();
    match target {
        Value::Reactive(wrapper) => {
            wrapper.set(key, value.clone());
        }
        Value::Object(obj) => {
            obj.insert(key.into(), value.clone());
        }
        _ => not_an_object("set"),
    }
    value
}

/// Delete `key` from `target`.
pub fn del(target: &Value, key: impl Into<PropKey>) -> bool {
    match target {
        Value::Reactive(wrapper) => wrapper.delete(key),
        Value::Object(obj) => obj.remove(&key.into()).is_some(),
        _ => {
            not_an_object("del");
            false
        }
    }
}

/// Whether `target` has `key`.
pub fn has(target: &Value, key: impl Into<PropKey>) -> bool {
    match target {
        Value::Reactive(wrapper) => wrapper.has(key),
        Value::Object(obj) => obj.has_own(&key.into()),
        _ => {
            not_an_object("has");
            false
        }
    }
}

pub fn own_keys(target: &Value) -> Vec<PropKey> {
    match target {
        Value::Reactive(wrapper) => wrapper.own_keys(),
        Value::Object(obj) => obj.own_keys(),
        _ => {
            not_an_object("own_keys");
            Vec::new()
        }
    }
}
