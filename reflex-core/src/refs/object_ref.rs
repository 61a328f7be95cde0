//! Property refs and ref-unwrapping views.

use std::fmt;
use std::rc::Rc;

use super::{unref, AnyRef, RefLike};
use crate::diagnostics::{warn, Warning};
use crate::observe::{self, is_proxy};
use crate::reactive::untracked;
use crate::value::{Obj, PropKey, Value};

struct ObjectRefInner {
    object: Value,
    key: PropKey,
    default: Option<Value>,
}

impl RefLike for ObjectRefInner {
    fn get(&self) -> Value {
        let value = observe::get(&self.object, &self.key);
        match (&value, &self.default) {
            (Value::Undefined, Some(default)) => default.clone(),
            _ => value,
        }
    }

    fn set(&self, value: Value) {
        observe::set(&self.object, &self.key, value);
    }

    fn kind(&self) -> &'static str {
        "ObjectRef"
    }
}

/// A ref bound to one property of an object.
///
/// It has no dependency set of its own: reads and writes go through the
/// object, so a reactive source keeps the ref reactive.
#[derive(Clone)]
pub struct ObjectRef(Rc<ObjectRefInner>);

impl ObjectRef {
    pub fn new(object: Value, key: impl Into<PropKey>, default: Option<Value>) -> Self {
        Self(Rc::new(ObjectRefInner {
            object,
            key: key.into(),
            default,
        }))
    }

    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }

    pub fn key(&self) -> &PropKey {
        &self.0.key
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("object", &self.0.object)
            .field("key", &self.0.key)
            .finish()
    }
}

impl From<ObjectRef> for AnyRef {
    fn from(r: ObjectRef) -> Self {
        AnyRef::new(r.0)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Ref(r.into())
    }
}

/// A ref for `object[key]`. A property that already holds a ref is
/// returned as that ref.
pub fn to_ref(object: &Value, key: impl Into<PropKey>, default: Option<Value>) -> Value {
    let key = key.into();
    let current = untracked(|| observe::get(object, &key));
    if let Value::Ref(_) = current {
        return current;
    }
    ObjectRef::new(object.clone(), key, default).into()
}

/// One property ref per own key of a wrapper, collected into a plain record
/// (or list, for a list).
pub fn to_refs(object: &Value) -> Value {
    if !is_proxy(object) {
        warn(Warning::ToRefsOnPlain);
    }
    let keys = observe::own_keys(object);
    let is_list = match object {
        Value::Reactive(wrapper) => wrapper.raw().is_list(),
        Value::Object(obj) => obj.is_list(),
        _ => false,
    };

    if is_list {
        let items = keys.into_iter().map(|key| to_ref(object, key, None));
        Value::Object(Obj::list(items))
    } else {
        let props = keys.into_iter().map(|key| {
            let r = to_ref(object, &key, None);
            (key, r)
        });
        Value::Object(Obj::record_from(props))
    }
}

/// A view that reads refs stored in `object` as their values and writes
/// through to those refs.
#[derive(Clone, Debug)]
pub struct RefsView {
    target: Value,
}

impl RefsView {
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        unref(&observe::get(&self.target, key))
    }

    /// Write `key`. Replacing a ref with a non-ref writes into the ref.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let old = untracked(|| observe::get(&self.target, &key));
        match old {
            Value::Ref(r) if !matches!(value, Value::Ref(_)) => r.set(value),
            _ => {
                observe::set(&self.target, key, value);
            }
        }
    }

    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        observe::has(&self.target, key)
    }

    pub fn own_keys(&self) -> Vec<PropKey> {
        observe::own_keys(&self.target)
    }

    /// The object behind the view.
    pub fn target(&self) -> &Value {
        &self.target
    }
}

/// A ref-unwrapping view of `object`. Wrappers already unwrap refs, so a
/// reactive object is viewed as is.
pub fn proxy_refs(object: impl Into<Value>) -> RefsView {
    RefsView {
        target: object.into(),
    }
}
