use std::fmt;
use std::rc::Rc;

use super::{track_ref_value, trigger_ref_value, AnyRef, RefLike};
use crate::reactive::Dep;
use crate::value::Value;

/// Explicit track/trigger access handed to a custom ref's factory.
#[derive(Clone)]
pub struct RefHandle {
    dep: Dep,
    addr: usize,
}

impl RefHandle {
    /// Record a read of the ref.
    pub fn track(&self) {
        track_ref_value(&self.dep, self.addr);
    }

    /// Notify the ref's subscribers.
    pub fn trigger(&self) {
        trigger_ref_value(&self.dep, self.addr, None);
    }
}

struct CustomInner {
    getter: Box<dyn Fn() -> Value>,
    setter: Box<dyn Fn(Value)>,
}

impl RefLike for CustomInner {
    fn get(&self) -> Value {
        (self.getter)()
    }

    fn set(&self, value: Value) {
        (self.setter)(value);
    }

    fn kind(&self) -> &'static str {
        "CustomRef"
    }
}

/// A ref whose reads and writes are user code.
///
/// The factory receives a [`RefHandle`] and returns the getter and setter;
/// the getter is expected to call `track` and the setter `trigger`.
#[derive(Clone)]
pub struct CustomRef(Rc<CustomInner>);

impl CustomRef {
    pub fn new<G, S>(factory: impl FnOnce(RefHandle) -> (G, S)) -> Self
    where
        G: Fn() -> Value + 'static,
        S: Fn(Value) + 'static,
    {
        Self(Rc::new_cyclic(|weak| {
            let handle = RefHandle {
                dep: Dep::new(),
                addr: weak.as_ptr() as *const () as usize,
            };
            let (getter, setter) = factory(handle);
            CustomInner {
                getter: Box::new(getter),
                setter: Box::new(setter),
            }
        }))
    }

    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }
}

impl fmt::Debug for CustomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomRef@{:#x}", Rc::as_ptr(&self.0) as *const () as usize)
    }
}

impl From<CustomRef> for AnyRef {
    fn from(r: CustomRef) -> Self {
        AnyRef::new(r.0)
    }
}

impl From<CustomRef> for Value {
    fn from(r: CustomRef) -> Self {
        Value::Ref(r.into())
    }
}

/// Shorthand for [`CustomRef::new`].
pub fn custom_ref<G, S>(factory: impl FnOnce(RefHandle) -> (G, S)) -> CustomRef
where
    G: Fn() -> Value + 'static,
    S: Fn(Value) + 'static,
{
    CustomRef::new(factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, flush_jobs, queue_job};
    use std::cell::{Cell, RefCell};

    /// A ref that only publishes writes once the job queue is flushed.
    fn debounced(initial: i32) -> CustomRef {
        custom_ref(move |handle| {
            let value = Rc::new(Cell::new(initial));
            let pending = Rc::new(Cell::new(false));
            let getter = {
                let (handle, value) = (handle.clone(), value.clone());
                move || {
                    handle.track();
                    Value::from(value.get())
                }
            };
            let setter = move |new: Value| {
                value.set(new.as_f64().unwrap_or_default() as i32);
                if !pending.replace(true) {
                    let (handle, pending) = (handle.clone(), pending.clone());
                    queue_job(move || {
                        pending.set(false);
                        handle.trigger();
                    });
                }
            };
            (getter, setter)
        })
    }

    #[test]
    fn custom_ref_controls_when_subscribers_run() {
        let r = debounced(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _runner = {
            let (r, seen) = (r.clone(), seen.clone());
            effect(move || seen.borrow_mut().push(r.get()))
        };

        r.set(1);
        r.set(2);
        assert_eq!(seen.borrow().len(), 1);

        flush_jobs();
        assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(2)]);
    }
}
