use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{track_ref_value, trigger_ref_value, AnyRef, RefLike};
use crate::observe::{reactive, to_raw};
use crate::reactive::Dep;
use crate::value::Value;

struct RefInner {
    /// What reads return: the stored value, wrapped when deep.
    value: RefCell<Value>,
    /// The unwrapped value writes are compared against.
    raw: RefCell<Value>,
    shallow: bool,
    dep: Dep,
}

impl RefInner {
    fn addr(&self) -> usize {
        self as *const Self as *const () as usize
    }

    fn convert(&self, value: Value) -> Value {
        if self.shallow {
            value
        } else {
            to_reactive(value)
        }
    }
}

/// Objects are wrapped reactive; everything else is stored as is.
fn to_reactive(value: Value) -> Value {
    match value {
        Value::Object(_) => reactive(value),
        other => other,
    }
}

impl RefLike for RefInner {
    fn get(&self) -> Value {
        track_ref_value(&self.dep, self.addr());
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        let new_raw = if self.shallow { value } else { to_raw(&value) };
        if !crate::value::has_changed(&new_raw, &self.raw.borrow()) {
            return;
        }
        *self.raw.borrow_mut() = new_raw.clone();
        let stored = self.convert(new_raw);
        *self.value.borrow_mut() = stored.clone();
        trigger_ref_value(&self.dep, self.addr(), Some(stored));
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn kind(&self) -> &'static str {
        if self.shallow {
            "ShallowRef"
        } else {
            "Ref"
        }
    }
}

/// A mutable observable box.
///
/// A deep ref wraps object values with [`reactive`] and compares writes
/// against the raw form, so writing a wrapper of the current object is a
/// no-op. A shallow ref stores and compares values as given.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::build(value.into(), false)
    }

    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::build(value.into(), true)
    }

    fn build(value: Value, shallow: bool) -> Self {
        let raw = if shallow { value.clone() } else { to_raw(&value) };
        let value = if shallow { value } else { to_reactive(value) };
        Self(Rc::new(RefInner {
            value: RefCell::new(value),
            raw: RefCell::new(raw),
            shallow,
            dep: Dep::new(),
        }))
    }

    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }

    /// Read without tracking.
    pub fn peek(&self) -> Value {
        self.0.value.borrow().clone()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.shallow
    }

    /// Number of effects currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.len()
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.0.kind())
            .field("value", &self.0.value.borrow())
            .finish()
    }
}

impl From<Ref> for AnyRef {
    fn from(r: Ref) -> Self {
        AnyRef::new(r.0)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r.into())
    }
}

/// A ref holding `value`, or `value` itself when it already is a ref.
pub fn make_ref(value: impl Into<Value>) -> Value {
    match value.into() {
        r @ Value::Ref(_) => r,
        other => Ref::new(other).into(),
    }
}

/// A shallow ref holding `value`, or `value` itself when it already is a
/// ref.
pub fn shallow_ref(value: impl Into<Value>) -> Value {
    match value.into() {
        r @ Value::Ref(_) => r,
        other => Ref::shallow(other).into(),
    }
}

/// Trigger a ref's subscribers without changing it, after mutating a
/// shallow ref's contents in place.
pub fn trigger_ref(r: &Ref) {
    let value = r.peek();
    trigger_ref_value(&r.0.dep, r.0.addr(), Some(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::is_reactive;
    use crate::reactive::effect;
    use crate::value::Obj;
    use std::cell::Cell;

    #[test]
    fn same_value_writes_do_not_rerun() {
        let count = Ref::new(0);
        let runs = Rc::new(Cell::new(0));
        let _runner = {
            let (count, runs) = (count.clone(), runs.clone());
            effect(move || {
                count.get();
                runs.set(runs.get() + 1);
            })
        };

        count.set(0);
        assert_eq!(runs.get(), 1);
        count.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn deep_refs_wrap_objects_and_compare_raw() {
        let obj = Obj::record();
        let r = Ref::new(obj.clone());
        let wrapped = r.get();
        assert!(is_reactive(&wrapped));

        let runs = Rc::new(Cell::new(0));
        let _runner = {
            let (r, runs) = (r.clone(), runs.clone());
            effect(move || {
                r.get();
                runs.set(runs.get() + 1);
            })
        };
        r.set(wrapped);
        r.set(obj);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn shallow_refs_need_an_explicit_trigger() {
        let list = Obj::list([1]);
        let r = Ref::shallow(list.clone());
        assert!(!is_reactive(&r.get()));

        let runs = Rc::new(Cell::new(0));
        let _runner = {
            let (r, runs) = (r.clone(), runs.clone());
            effect(move || {
                r.get();
                runs.set(runs.get() + 1);
            })
        };

        list.insert(crate::value::PropKey::from(1usize), Value::from(2));
        assert_eq!(runs.get(), 1);
        trigger_ref(&r);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn make_ref_passes_refs_through() {
        let r = make_ref(1);
        assert_eq!(make_ref(r.clone()), r);
    }
}
