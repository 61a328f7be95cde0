//! Dynamic Values
//!
//! Reactivity operates over plain, dynamically shaped data. [`Value`] is the
//! closed set of things a property, list slot, map entry or boxed value can
//! hold:
//!
//! - primitives (`Undefined`, `Null`, booleans, numbers, strings), which are
//!   compared by value;
//! - raw objects ([`Obj`]), compared by identity;
//! - reactive wrappers ([`Reactive`]) over raw objects;
//! - boxed and derived values ([`AnyRef`]).
//!
//! # Equality
//!
//! `Value` equality is SameValueZero: every NaN equals every other NaN, `+0`
//! equals `-0`, and heap values are equal only when they are the same
//! instance. The same relation decides whether a write "changed" anything.

mod json;
mod key;
mod object;

pub use key::{HashKey, PropKey, LENGTH};
pub use object::{list_len, Obj, ObjectData, ObjectId, Shape, ShapeKind, MAX_LIST_LEN};

use std::fmt;
use std::rc::Rc;

use crate::observe::Reactive;
use crate::refs::AnyRef;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A raw, unobserved object.
    Object(Obj),
    /// A reactive wrapper around an object.
    Reactive(Reactive),
    /// A boxed or derived value.
    Ref(AnyRef),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Whether the value is heap-allocated (object, wrapper or ref).
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Reactive(_) | Self::Ref(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Self::Reactive(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn into_reactive(self) -> Option<Reactive> {
        match self {
            Self::Reactive(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&AnyRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(obj) => obj.kind().name(),
            Self::Reactive(_) => "Reactive",
            Self::Ref(_) => "Ref",
        }
    }
}

/// SameValueZero comparison.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        (Value::Reactive(x), Value::Reactive(y)) => x.ptr_eq(y),
        (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Whether replacing `old` with `new` is an observable change.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !same_value_zero(new, old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(obj) => write!(f, "{obj:?}"),
            Self::Reactive(wrapper) => write!(f, "{wrapper:?}"),
            Self::Ref(r) => write!(f, "{r:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

macro_rules! from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Self::Number(n as f64)
            }
        })*
    };
}

from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Obj> for Value {
    fn from(obj: Obj) -> Self {
        Self::Object(obj)
    }
}

impl From<Reactive> for Value {
    fn from(wrapper: Reactive) -> Self {
        Self::Reactive(wrapper)
    }
}

impl From<AnyRef> for Value {
    fn from(r: AnyRef) -> Self {
        Self::Ref(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Object(Obj::list(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_equals_nan_and_zeroes_match() {
        assert!(same_value_zero(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(same_value_zero(&Value::from(0.0), &Value::from(-0.0)));
        assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(has_changed(&Value::from(1), &Value::from("1")));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Obj::record();
        let b = Obj::record();
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(Obj::record()), Value::from(b));
    }
}
