//! Descriptor backend.
//!
//! Instead of consulting a trap table on every access, a wrapper built by
//! this backend owns a shadow: one accessor pair per own property of the
//! target, plus the list length the shadow was last synced to. The shadow is
//! the surface the wrapper answers from. `has` and `own_keys` read the slot
//! table, and a list's `length` reads the synced length.
//!
//! Reads and writes of a known property go through its accessor pair. A
//! write to a property without a slot takes the define path: the generic
//! write runs, then the slot is installed. Lists keep a slot per index plus
//! `length`; index slots are added or dropped after every instrumented list
//! method and every index or length write.
//!
//! Changes made to the raw target behind the wrapper (directly, or through
//! another wrapper of the same object) are picked up on the next access by
//! comparing the target's version with the one the shadow last synced to.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use super::handlers::{self, ObjectHandler};
use super::wrapper::{Reactive, Target};
use super::{Access, Backend, Variant};
use crate::reactive::{track, TrackKey, TrackOp};
use crate::value::{Obj, PropKey, Value};

type Getter = fn(&Reactive, &PropKey) -> Value;
type Setter = fn(&Reactive, PropKey, Value) -> bool;

/// The accessor pair installed for one property.
pub(crate) struct Accessor {
    key: PropKey,
    get: Getter,
    set: Setter,
}

fn getter<const READONLY: bool, const SHALLOW: bool>(w: &Reactive, key: &PropKey) -> Value {
    let access = Access {
        readonly: READONLY,
        shallow: SHALLOW,
    };
    handlers::get(w, key, access)
}

fn setter<const READONLY: bool, const SHALLOW: bool>(
    w: &Reactive,
    key: PropKey,
    value: Value,
) -> bool {
    let access = Access {
        readonly: READONLY,
        shallow: SHALLOW,
    };
    handlers::set(w, key, value, access)
}

fn accessor_fns(variant: Variant) -> (Getter, Setter) {
    match variant {
        Variant::Reactive => (getter::<false, false>, setter::<false, false>),
        Variant::ShallowReactive => (getter::<false, true>, setter::<false, true>),
        Variant::Readonly => (getter::<true, false>, setter::<true, false>),
        Variant::ShallowReadonly => (getter::<true, true>, setter::<true, true>),
    }
}

/// Per-wrapper accessor shadow.
pub(crate) struct Shadow {
    access: Access,
    get: Getter,
    set: Setter,
    slots: RefCell<IndexMap<PropKey, Rc<Accessor>>>,
    /// List length the index slots were last synced to.
    len: Cell<usize>,
    /// Target version the slot table reflects.
    synced: Cell<u64>,
}

impl Shadow {
    pub fn new(raw: &Obj, variant: Variant) -> Self {
        let (get, set) = accessor_fns(variant);
        let shadow = Self {
            access: variant.access(),
            get,
            set,
            slots: RefCell::new(IndexMap::new()),
            len: Cell::new(0),
            synced: Cell::new(0),
        };
        shadow.resync(raw);
        shadow
    }

    fn accessor(&self, key: PropKey) -> Rc<Accessor> {
        Rc::new(Accessor {
            key,
            get: self.get,
            set: self.set,
        })
    }

    fn slot(&self, key: &PropKey) -> Option<Rc<Accessor>> {
        self.slots.borrow().get(key).cloned()
    }

    fn define(&self, key: PropKey) {
        let mut slots = self.slots.borrow_mut();
        if !slots.contains_key(&key) {
            let accessor = self.accessor(key.clone());
            slots.insert(key, accessor);
        }
    }

    /// Rebuild the slot table from the target's own keys, in target order.
    fn resync(&self, raw: &Obj) {
        let mut keys = raw.own_keys();
        if raw.is_list() {
            keys.push(PropKey::length());
            self.len.set(raw.len());
        }
        let mut slots = self.slots.borrow_mut();
        let mut old = std::mem::take(&mut *slots);
        for key in keys {
            let accessor = match old.swap_remove(&key) {
                Some(accessor) => accessor,
                None => self.accessor(key.clone()),
            };
            slots.insert(key, accessor);
        }
        self.synced.set(raw.version());
    }

    /// Catch up with changes made behind this wrapper.
    fn refresh(&self, raw: &Obj) {
        if self.synced.get() != raw.version() {
            tracing::trace!(object = ?raw, "descriptor shadow resync");
            self.resync(raw);
        }
    }

    /// Add or drop index slots so they match the list's length.
    fn sync_list(&self, raw: &Obj) {
        let old = self.len.get();
        let new = raw.len();
        if old == new {
            return;
        }
        let mut slots = self.slots.borrow_mut();
        if new > old {
            for i in old..new {
                let key = PropKey::from(i);
                let accessor = self.accessor(key.clone());
                slots.insert(key, accessor);
            }
        } else {
            slots.retain(|key, _| key.as_index().map_or(true, |i| i < new));
        }
        self.len.set(new);
    }

    /// Mark the shadow current after a write through this wrapper. Effects
    /// run by the write may have changed the target again; resync then.
    fn settle(&self, raw: &Obj) {
        let in_step = if raw.is_list() {
            let len = raw.len();
            self.len.get() == len && self.slots.borrow().len() == len + 1
        } else {
            self.slots.borrow().keys().eq(raw.own_keys().iter())
        };
        if in_step {
            self.synced.set(raw.version());
        } else {
            self.resync(raw);
        }
    }

    /// Number of installed accessor pairs.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }
}

impl ObjectHandler for Shadow {
    fn backend(&self) -> Backend {
        Backend::Descriptor
    }

    fn get(&self, wrapper: &Reactive, key: &PropKey) -> Value {
        let raw = wrapper.raw();
        self.refresh(raw);
        if let Target::Raw(raw) = wrapper.target() {
            if key.is_length() && raw.is_list() {
                if !self.access.readonly {
                    track(raw, TrackOp::Get, TrackKey::Prop(key.clone()));
                }
                return Value::Number(self.len.get() as f64);
            }
        }
        match self.slot(key) {
            Some(accessor) => (accessor.get)(wrapper, &accessor.key),
            None => handlers::get(wrapper, key, self.access),
        }
    }

    fn set(&self, wrapper: &Reactive, key: PropKey, value: Value) -> bool {
        let raw = wrapper.raw();
        self.refresh(raw);
        let accepted = match self.slot(&key) {
            Some(accessor) => (accessor.set)(wrapper, key, value),
            None => {
                let accepted = handlers::set(wrapper, key.clone(), value, self.access);
                if accepted && !raw.is_list() && raw.has_own(&key) {
                    self.define(key);
                }
                accepted
            }
        };
        if raw.is_list() {
            self.sync_list(raw);
        }
        self.settle(raw);
        accepted
    }

    fn delete_property(&self, wrapper: &Reactive, key: &PropKey) -> bool {
        let raw = wrapper.raw();
        self.refresh(raw);
        let deleted = handlers::delete_property(wrapper, key, self.access);
        if raw.is_list() {
            self.sync_list(raw);
        } else if !raw.has_own(key) {
            self.slots.borrow_mut().shift_remove(key);
        }
        self.settle(raw);
        deleted
    }

    fn has(&self, wrapper: &Reactive, key: &PropKey) -> bool {
        let Target::Raw(raw) = wrapper.target() else {
            return handlers::has(wrapper, key, self.access);
        };
        self.refresh(raw);
        if !self.access.readonly {
            track(raw, TrackOp::Has, TrackKey::Prop(key.clone()));
        }
        self.slots.borrow().contains_key(key)
    }

    fn own_keys(&self, wrapper: &Reactive) -> Vec<PropKey> {
        let Target::Raw(raw) = wrapper.target() else {
            return handlers::own_keys(wrapper, self.access);
        };
        self.refresh(raw);
        let is_list = raw.is_list();
        if !self.access.readonly {
            let key = if is_list {
                TrackKey::Prop(PropKey::length())
            } else {
                TrackKey::Iterate
            };
            track(raw, TrackOp::Iterate, key);
        }
        self.slots
            .borrow()
            .keys()
            .filter(|key| !(is_list && key.is_length()))
            .cloned()
            .collect()
    }

    fn list_mutated(&self, wrapper: &Reactive) {
        let raw = wrapper.raw();
        self.sync_list(raw);
        self.settle(raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{reactive, with_backend};
    use crate::reactive::effect;
    use std::cell::Cell;

    fn descriptor(raw: &Obj) -> Reactive {
        with_backend(Backend::Descriptor, || {
            reactive(raw.clone()).into_reactive().unwrap()
        })
    }

    #[test]
    fn shadow_covers_own_keys_and_list_length() {
        let record = Obj::record_from([("a", 1), ("b", 2)]);
        assert_eq!(Shadow::new(&record, Variant::Reactive).slot_count(), 2);

        let list = Obj::list([1, 2, 3]);
        assert_eq!(Shadow::new(&list, Variant::Readonly).slot_count(), 4);
    }

    #[test]
    fn list_sync_adds_and_drops_index_slots() {
        let list = Obj::list([1, 2]);
        let shadow = Shadow::new(&list, Variant::Reactive);

        list.insert(PropKey::from(3usize), Value::from(4));
        shadow.sync_list(&list);
        assert_eq!(shadow.slot_count(), 5);

        list.insert(PropKey::length(), Value::from(1));
        shadow.sync_list(&list);
        assert_eq!(shadow.slot_count(), 2);
        assert!(shadow.slot(&PropKey::length()).is_some());
    }

    #[test]
    fn resync_follows_target_order() {
        let record = Obj::record_from([("a", 1), ("b", 2)]);
        let shadow = Shadow::new(&record, Variant::Reactive);
        record.remove(&PropKey::from("a"));
        record.insert(PropKey::from("c"), Value::from(3));
        record.insert(PropKey::from("a"), Value::from(1));
        shadow.refresh(&record);

        let keys: Vec<_> = shadow.slots.borrow().keys().cloned().collect();
        assert_eq!(
            keys,
            vec![PropKey::from("b"), PropKey::from("c"), PropKey::from("a")]
        );
    }

    #[test]
    fn writes_define_and_drop_slots() {
        let list = descriptor(&Obj::list([1, 2]));
        let Some(shadow) = list.shadow() else {
            panic!("descriptor wrapper without a shadow");
        };
        assert_eq!(shadow.slot_count(), 3);

        list.set(4usize, 5);
        assert_eq!(shadow.slot_count(), 6);
        assert_eq!(list.len(), 5);

        list.set_len(1);
        assert_eq!(shadow.slot_count(), 2);
        list.push(7);
        assert_eq!(shadow.slot_count(), 3);
        assert!(list.has(1usize));
        assert!(!list.has(2usize));
        assert_eq!(list.own_keys(), vec![PropKey::from(0usize), PropKey::from(1usize)]);

        let record = descriptor(&Obj::record());
        record.set("x", 1);
        let shadow = record.shadow().map(Shadow::slot_count);
        assert_eq!(shadow, Some(1));
        record.delete("x");
        assert_eq!(record.shadow().map(Shadow::slot_count), Some(0));
    }

    #[test]
    fn changes_behind_the_wrapper_are_picked_up() {
        let raw = Obj::record_from([("a", 1)]);
        let state = descriptor(&raw);
        raw.insert(PropKey::from("b"), Value::from(2));
        assert!(state.has("b"));
        assert_eq!(state.own_keys(), vec![PropKey::from("a"), PropKey::from("b")]);

        let raw_list = Obj::list([1]);
        let list = descriptor(&raw_list);
        raw_list.insert(PropKey::from(2usize), Value::from(3));
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(2usize), Value::from(3));
    }

    #[test]
    fn effects_see_the_shadow_length_after_a_write() {
        let list = descriptor(&Obj::list([1, 2, 3]));
        let seen = Rc::new(Cell::new(0));
        let _runner = {
            let (list, seen) = (list.clone(), seen.clone());
            effect(move || seen.set(list.len()))
        };

        list.set_len(1);
        assert_eq!(seen.get(), 1);
        list.set(5usize, 0);
        assert_eq!(seen.get(), 6);
        list.pop();
        assert_eq!(seen.get(), 5);
    }
}
