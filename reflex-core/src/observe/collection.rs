//! Map and set instrumentation.
//!
//! Collections are not observed through property access. Each method is
//! implemented here once, for every variant and both backends: reads track
//! the entry key (and its raw form, when a wrapper was passed as the key),
//! mutations compute old and new values against the raw collection and
//! trigger with the precise operation, iteration tracks up front and wraps
//! lazily.

use super::wrapper::{Reactive, Target};
use super::{to_raw, wrap_for, CollectionKind, Variant};
use crate::diagnostics::{warn, Warning};
use crate::reactive::{track, trigger, TrackKey, TrackOp, TriggerEvent, TriggerOp};
use crate::value::{has_changed, HashKey, Obj, Value};

/// What an iteration yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterKind {
    Keys,
    Values,
    Entries,
}

/// A read-only wrapper over a mutable one tracks through it.
fn tracks(wrapper: &Reactive) -> bool {
    !wrapper.variant().is_readonly() || matches!(wrapper.target(), Target::Observed(_))
}

fn entry_key(key: &Value) -> TrackKey {
    TrackKey::Entry(HashKey(key.clone()))
}

/// Track a keyed read, under the key and its raw form.
fn track_key(wrapper: &Reactive, raw: &Obj, key: &Value, raw_key: &Value) {
    if !tracks(wrapper) {
        return;
    }
    if key != raw_key {
        track(raw, TrackOp::Get, entry_key(key));
    }
    track(raw, TrackOp::Get, entry_key(raw_key));
}

fn readonly_rejects(wrapper: &Reactive, method: &str) -> bool {
    let readonly = wrapper.variant().is_readonly();
    if readonly {
        warn(Warning::ReadonlyCollection {
            method: method.to_string(),
        });
    }
    readonly
}

/// Weak collections only hold object keys.
fn weak_rejects(wrapper: &Reactive, key: &Value) -> bool {
    let kind = wrapper.collection_kind();
    let rejected = kind.is_some_and(|kind| kind.is_weak()) && !key.is_object();
    if rejected {
        warn(Warning::UnsupportedOperation {
            operation: format!("using {} as a key", key.type_name()),
            kind: kind.map_or("collection", |kind| kind.name()).to_string(),
        });
    }
    rejected
}

/// Warn when a collection holds both a wrapper and its raw object as keys.
fn check_identity_keys(raw: &Obj, key: &Value) {
    let raw_key = to_raw(key);
    if &raw_key != key && raw.contains(&raw_key) {
        let kind = if raw.is_map() {
            CollectionKind::Map
        } else {
            CollectionKind::Set
        };
        warn(Warning::MixedIdentityKeys {
            kind: kind.name().to_string(),
        });
    }
}

/// Read a map entry.
pub(crate) fn get(wrapper: &Reactive, key: &Value) -> Value {
    let raw = wrapper.raw();
    let raw_key = to_raw(key);
    track_key(wrapper, raw, key, &raw_key);

    let value = raw
        .entry(key)
        .or_else(|| raw.entry(&raw_key))
        .unwrap_or_default();
    wrap_for(wrapper.variant(), value)
}

/// Map key or set item membership.
pub(crate) fn has(wrapper: &Reactive, key: &Value) -> bool {
    let raw = wrapper.raw();
    let raw_key = to_raw(key);
    track_key(wrapper, raw, key, &raw_key);
    raw.contains(key) || raw.contains(&raw_key)
}

/// Number of entries, tracked as an iteration.
pub(crate) fn size(wrapper: &Reactive) -> usize {
    let raw = wrapper.raw();
    if tracks(wrapper) {
        track(raw, TrackOp::Iterate, TrackKey::Iterate);
    }
    raw.len()
}

/// Add a set item.
pub(crate) fn add(wrapper: &Reactive, value: Value) {
    if readonly_rejects(wrapper, "Add") || weak_rejects(wrapper, &value) {
        return;
    }
    let raw = wrapper.raw();
    let value = to_raw(&value);
    if raw.add_item(value.clone()) {
        trigger(
            raw,
            TriggerEvent::new(TriggerOp::Add, entry_key(&value))
                .with_values(Some(value), None),
        );
    }
}

/// Write a map entry.
pub(crate) fn set(wrapper: &Reactive, key: Value, value: Value) {
    if readonly_rejects(wrapper, "Set") || weak_rejects(wrapper, &key) {
        return;
    }
    let raw = wrapper.raw();
    let value = to_raw(&value);

    let mut key = key;
    let mut had_key = raw.contains(&key);
    if had_key {
        check_identity_keys(raw, &key);
    } else {
        key = to_raw(&key);
        had_key = raw.contains(&key);
    }

    let old = raw.set_entry(key.clone(), value.clone());
    match old {
        Some(old) if had_key => {
            if has_changed(&value, &old) {
                trigger(
                    raw,
                    TriggerEvent::new(TriggerOp::Set, entry_key(&key))
                        .with_values(Some(value), Some(old)),
                );
            }
        }
        _ => trigger(
            raw,
            TriggerEvent::new(TriggerOp::Add, entry_key(&key)).with_values(Some(value), None),
        ),
    }
}

/// Remove a map entry or set item.
pub(crate) fn delete(wrapper: &Reactive, key: &Value) -> bool {
    if readonly_rejects(wrapper, "Delete") {
        return false;
    }
    let raw = wrapper.raw();

    let mut key = key.clone();
    if raw.contains(&key) {
        check_identity_keys(raw, &key);
    } else {
        key = to_raw(&key);
    }

    match raw.delete_entry(&key) {
        Some(old) => {
            trigger(
                raw,
                TriggerEvent::new(TriggerOp::Delete, entry_key(&key))
                    .with_values(None, Some(old)),
            );
            true
        }
        None => false,
    }
}

/// Remove every entry. Effects receive a snapshot of the old contents.
pub(crate) fn clear(wrapper: &Reactive) {
    if readonly_rejects(wrapper, "Clear") {
        return;
    }
    let raw = wrapper.raw();
    if raw.is_empty() {
        return;
    }
    let snapshot = raw.shallow_clone();
    raw.clear_entries();
    trigger(raw, TriggerEvent::clear(Some(snapshot)));
}

fn track_iteration(wrapper: &Reactive, kind: IterKind) {
    if !tracks(wrapper) {
        return;
    }
    let raw = wrapper.raw();
    let key = if kind == IterKind::Keys && raw.is_map() {
        TrackKey::MapKeyIterate
    } else {
        TrackKey::Iterate
    };
    track(raw, TrackOp::Iterate, key);
}

/// Every entry, wrapped.
pub(crate) fn entries(wrapper: &Reactive, kind: IterKind) -> Vec<(Value, Value)> {
    iter(wrapper, kind, |pair| pair).collect()
}

/// A lazily wrapping iterator over the entries as of this call.
pub(crate) fn iter<T>(
    wrapper: &Reactive,
    kind: IterKind,
    project: fn((Value, Value)) -> T,
) -> CollectionIter<T> {
    track_iteration(wrapper, kind);
    CollectionIter {
        items: wrapper.raw().entries().into_iter(),
        variant: wrapper.variant(),
        kind,
        project,
    }
}

/// Iterator returned by `keys`, `values` and `entries` on a collection
/// wrapper. Elements are wrapped as they are yielded.
pub struct CollectionIter<T> {
    items: std::vec::IntoIter<(Value, Value)>,
    variant: Variant,
    kind: IterKind,
    project: fn((Value, Value)) -> T,
}

impl<T> CollectionIter<T> {
    pub(crate) fn empty(project: fn((Value, Value)) -> T) -> Self {
        Self {
            items: Vec::new().into_iter(),
            variant: Variant::Reactive,
            kind: IterKind::Entries,
            project,
        }
    }
}

impl<T> Iterator for CollectionIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let (key, value) = self.items.next()?;
        let variant = self.variant;
        let pair = match self.kind {
            IterKind::Keys => (wrap_for(variant, key), value),
            IterKind::Values => (key, wrap_for(variant, value)),
            IterKind::Entries => (wrap_for(variant, key), wrap_for(variant, value)),
        };
        Some((self.project)(pair))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T> ExactSizeIterator for CollectionIter<T> {}

#[cfg(test)]
mod tests {
    use crate::diagnostics::{take_warnings, Warning};
    use crate::observe::{is_reactive, reactive, readonly};
    use crate::reactive::effect;
    use crate::value::{Obj, Value};
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter() -> Rc<Cell<i32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn map_get_tracks_the_key() {
        let map = reactive(Obj::map_from([("a", 1)])).into_reactive().unwrap();
        let seen = Rc::new(Cell::new(0.0));
        let _runner = {
            let (map, seen) = (map.clone(), seen.clone());
            effect(move || seen.set(map.get_entry("a").as_f64().unwrap_or(-1.0)))
        };

        map.set_entry("a", 2);
        assert_eq!(seen.get(), 2.0);
        map.delete_entry("a");
        assert_eq!(seen.get(), -1.0);
    }

    #[test]
    fn value_only_writes_skip_key_iteration() {
        let map = reactive(Obj::map_from([("a", 1)])).into_reactive().unwrap();
        let (key_runs, value_runs) = (counter(), counter());
        let _keys = {
            let (map, runs) = (map.clone(), key_runs.clone());
            effect(move || {
                map.keys().count();
                runs.set(runs.get() + 1);
            })
        };
        let _values = {
            let (map, runs) = (map.clone(), value_runs.clone());
            effect(move || {
                map.values().count();
                runs.set(runs.get() + 1);
            })
        };

        map.set_entry("a", 5);
        assert_eq!((key_runs.get(), value_runs.get()), (1, 2));
        map.set_entry("b", 1);
        assert_eq!((key_runs.get(), value_runs.get()), (2, 3));
    }

    #[test]
    fn set_add_is_idempotent_and_size_tracks() {
        let set = reactive(Obj::set()).into_reactive().unwrap();
        let sizes = Rc::new(std::cell::RefCell::new(Vec::new()));
        let _runner = {
            let (set, sizes) = (set.clone(), sizes.clone());
            effect(move || sizes.borrow_mut().push(set.size()))
        };

        set.add(1);
        set.add(1);
        set.add(2);
        assert_eq!(*sizes.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn clear_passes_the_old_contents_and_skips_empty() {
        let map = reactive(Obj::map_from([("a", 1)])).into_reactive().unwrap();
        let runs = counter();
        let _runner = {
            let (map, runs) = (map.clone(), runs.clone());
            effect(move || {
                map.has_entry("a");
                runs.set(runs.get() + 1);
            })
        };

        map.clear();
        assert_eq!(runs.get(), 2);
        map.clear();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn iteration_wraps_nested_values() {
        let map = reactive(Obj::map_from([("a", Obj::record())]))
            .into_reactive()
            .unwrap();
        let values: Vec<Value> = map.values().collect();
        assert!(is_reactive(&values[0]));

        let mut seen = Vec::new();
        map.for_each(|value, key| seen.push((key, is_reactive(&value))));
        assert_eq!(seen, vec![(Value::from("a"), true)]);
    }

    #[test]
    fn readonly_collections_reject_mutation() {
        let raw = Obj::set_from([1]);
        let ro = readonly(raw.clone()).into_reactive().unwrap();
        take_warnings();

        ro.add(2);
        assert!(!ro.delete_entry(1));
        ro.clear();
        assert_eq!(raw.len(), 1);
        assert_eq!(
            take_warnings(),
            vec![
                Warning::ReadonlyCollection { method: "Add".into() },
                Warning::ReadonlyCollection {
                    method: "Delete".into()
                },
                Warning::ReadonlyCollection {
                    method: "Clear".into()
                },
            ]
        );
    }

    #[test]
    fn mixed_raw_and_wrapped_keys_warn() {
        let key = Obj::record();
        let wrapped_key = reactive(key.clone());
        let map = Obj::map();
        map.set_entry(Value::Object(key), Value::from(1));
        map.set_entry(wrapped_key.clone(), Value::from(2));

        let wrapper = reactive(map).into_reactive().unwrap();
        take_warnings();
        wrapper.set_entry(wrapped_key, 3);
        assert!(matches!(
            take_warnings().as_slice(),
            [Warning::MixedIdentityKeys { .. }]
        ));
    }

    #[test]
    fn weak_collections_refuse_primitive_keys_and_iteration() {
        let weak = reactive(Obj::weak_map()).into_reactive().unwrap();
        take_warnings();
        weak.set_entry("a", 1);
        assert_eq!(weak.size(), 0);
        assert_eq!(take_warnings().len(), 2);

        let key = Obj::record();
        weak.set_entry(key.clone(), 1);
        assert_eq!(weak.get_entry(key), Value::from(1));
    }
}
