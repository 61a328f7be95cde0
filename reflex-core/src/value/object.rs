//! Raw heap objects.
//!
//! An [`Obj`] is the plain, unobserved data a wrapper forwards to. It is
//! shared by reference and compared by identity: two structurally equal
//! objects never share tracking state.
//!
//! Every accessor on `Obj` is untracked. Reads and writes made here are
//! invisible to the dependency graph; go through a wrapper to observe them.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::key::{HashKey, PropKey};
use super::Value;
use crate::reactive::Runtime;

/// Largest length a list may be given through a `length` or index write.
pub const MAX_LIST_LEN: usize = 1 << 24;

/// The list length `value` denotes, if it is a finite non-negative integer
/// no larger than [`MAX_LIST_LEN`].
pub fn list_len(value: &Value) -> Option<usize> {
    let n = value.as_f64()?;
    let valid = n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= MAX_LIST_LEN as f64;
    valid.then_some(n as usize)
}

/// Identity of a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The concrete layout of a raw object.
#[derive(Debug, Clone)]
pub enum Shape {
    /// String-keyed properties in insertion order.
    Record(IndexMap<PropKey, Value>),
    /// A dense list. Holes are stored as `Undefined`.
    List(Vec<Value>),
    /// A map-like collection. Weak maps cannot be sized, iterated or cleared.
    Map {
        entries: IndexMap<HashKey, Value>,
        weak: bool,
    },
    /// A set-like collection. Weak sets cannot be sized, iterated or cleared.
    Set { items: IndexSet<HashKey>, weak: bool },
    /// A host object that is never observable (dates, handles, ...).
    Opaque(Rc<str>),
}

/// Coarse classification of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Record,
    List,
    Map,
    WeakMap,
    Set,
    WeakSet,
    Opaque,
}

impl ShapeKind {
    /// Display name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Record => "Object",
            Self::List => "Array",
            Self::Map => "Map",
            Self::WeakMap => "WeakMap",
            Self::Set => "Set",
            Self::WeakSet => "WeakSet",
            Self::Opaque => "Opaque",
        }
    }
}

impl Shape {
    /// Classify this shape.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Record(_) => ShapeKind::Record,
            Self::List(_) => ShapeKind::List,
            Self::Map { weak: false, .. } => ShapeKind::Map,
            Self::Map { weak: true, .. } => ShapeKind::WeakMap,
            Self::Set { weak: false, .. } => ShapeKind::Set,
            Self::Set { weak: true, .. } => ShapeKind::WeakSet,
            Self::Opaque(_) => ShapeKind::Opaque,
        }
    }
}

/// Storage behind an [`Obj`] handle.
pub struct ObjectData {
    id: ObjectId,
    /// Set by `mark_raw`; a skipped object is never wrapped.
    skip: Cell<bool>,
    /// Bumped on every mutable borrow of the shape.
    version: Cell<u64>,
    shape: RefCell<Shape>,
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        Runtime::forget_target(self.id);
    }
}

/// A shared raw object.
#[derive(Clone)]
pub struct Obj(Rc<ObjectData>);

impl Obj {
    /// Create an object with the given shape.
    pub fn new(shape: Shape) -> Self {
        Self(Rc::new(ObjectData {
            id: ObjectId::next(),
            skip: Cell::new(false),
            version: Cell::new(0),
            shape: RefCell::new(shape),
        }))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::new(Shape::Record(IndexMap::new()))
    }

    /// Create a record from key/value pairs.
    pub fn record_from<K, V, I>(props: I) -> Self
    where
        K: Into<PropKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(Shape::Record(
            props
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Create a list.
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(Shape::List(items.into_iter().map(Into::into).collect()))
    }

    /// Create an empty map.
    pub fn map() -> Self {
        Self::new(Shape::Map {
            entries: IndexMap::new(),
            weak: false,
        })
    }

    /// Create a map from key/value pairs.
    pub fn map_from<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(Shape::Map {
            entries: entries
                .into_iter()
                .map(|(k, v)| (HashKey(k.into()), v.into()))
                .collect(),
            weak: false,
        })
    }

    /// Create an empty set.
    pub fn set() -> Self {
        Self::new(Shape::Set {
            items: IndexSet::new(),
            weak: false,
        })
    }

    /// Create a set from items.
    pub fn set_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(Shape::Set {
            items: items.into_iter().map(|v| HashKey(v.into())).collect(),
            weak: false,
        })
    }

    /// Create an empty weak map.
    pub fn weak_map() -> Self {
        Self::new(Shape::Map {
            entries: IndexMap::new(),
            weak: true,
        })
    }

    /// Create an empty weak set.
    pub fn weak_set() -> Self {
        Self::new(Shape::Set {
            items: IndexSet::new(),
            weak: true,
        })
    }

    /// Create an opaque, never-observable object.
    pub fn opaque(name: &str) -> Self {
        Self::new(Shape::Opaque(Rc::from(name)))
    }

    /// The object's identity.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Whether two handles point at the same object.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The object's shape classification.
    pub fn kind(&self) -> ShapeKind {
        self.0.shape.borrow().kind()
    }

    pub fn is_list(&self) -> bool {
        self.kind() == ShapeKind::List
    }

    /// Map or weak map.
    pub fn is_map(&self) -> bool {
        matches!(self.kind(), ShapeKind::Map | ShapeKind::WeakMap)
    }

    /// Borrow the shape. Do not call back into user code while the borrow
    /// is held.
    pub fn shape(&self) -> Ref<'_, Shape> {
        self.0.shape.borrow()
    }

    /// Mutably borrow the shape.
    pub fn shape_mut(&self) -> RefMut<'_, Shape> {
        let shape = self.0.shape.borrow_mut();
        self.0.version.set(self.0.version.get().wrapping_add(1));
        shape
    }

    /// A counter that changes whenever the shape may have been mutated.
    pub fn version(&self) -> u64 {
        self.0.version.get()
    }

    pub(crate) fn mark_skip(&self) {
        self.0.skip.set(true);
    }

    /// Whether the object opted out of observation.
    pub fn is_skipped(&self) -> bool {
        self.0.skip.get()
    }

    // ------------------------------------------------------------------
    // Records and lists
    // ------------------------------------------------------------------

    /// Read a property. Missing properties read as `Undefined`; a list's
    /// `length` reads as a number.
    pub fn get(&self, key: &PropKey) -> Value {
        match &*self.shape() {
            Shape::Record(props) => props.get(key).cloned().unwrap_or_default(),
            Shape::List(items) => match key {
                PropKey::Index(i) => items.get(*i as usize).cloned().unwrap_or_default(),
                key if key.is_length() => Value::Number(items.len() as f64),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    /// Whether the object has the property as its own.
    pub fn has_own(&self, key: &PropKey) -> bool {
        match &*self.shape() {
            Shape::Record(props) => props.contains_key(key),
            Shape::List(items) => match key {
                PropKey::Index(i) => (*i as usize) < items.len(),
                key => key.is_length(),
            },
            _ => false,
        }
    }

    /// Write a property, returning the previous value.
    ///
    /// On a list, writing past the end pads with `Undefined`, and writing
    /// `length` truncates or extends. Named non-length keys, indices at or
    /// beyond [`MAX_LIST_LEN`] and lengths rejected by [`list_len`] leave a
    /// list untouched and return `None`.
    pub fn insert(&self, key: PropKey, value: Value) -> Option<Value> {
        if self.is_list() && !list_write_in_bounds(&key, &value) {
            return None;
        }
        match &mut *self.shape_mut() {
            Shape::Record(props) => props.insert(key, value),
            Shape::List(items) => match key {
                PropKey::Index(i) => {
                    let i = i as usize;
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                        items[i] = value;
                        None
                    } else {
                        Some(std::mem::replace(&mut items[i], value))
                    }
                }
                key if key.is_length() => {
                    let old = items.len();
                    items.resize(list_len(&value).unwrap_or(old), Value::Undefined);
                    Some(Value::Number(old as f64))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Remove a property. On a list, removes the slot and shifts the tail.
    pub fn remove(&self, key: &PropKey) -> Option<Value> {
        match &mut *self.shape_mut() {
            Shape::Record(props) => props.shift_remove(key),
            Shape::List(items) => match key {
                PropKey::Index(i) if (*i as usize) < items.len() => {
                    Some(items.remove(*i as usize))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Own property keys in order. Lists report their indices.
    pub fn own_keys(&self) -> Vec<PropKey> {
        match &*self.shape() {
            Shape::Record(props) => props.keys().cloned().collect(),
            Shape::List(items) => (0..items.len()).map(PropKey::from).collect(),
            _ => Vec::new(),
        }
    }

    /// Number of list items, record properties or collection entries.
    pub fn len(&self) -> usize {
        match &*self.shape() {
            Shape::Record(props) => props.len(),
            Shape::List(items) => items.len(),
            Shape::Map { entries, .. } => entries.len(),
            Shape::Set { items, .. } => items.len(),
            Shape::Opaque(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the list items, or an empty vector for other shapes.
    pub fn list_items(&self) -> Vec<Value> {
        match &*self.shape() {
            Shape::List(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Whether a map has the key or a set has the item.
    pub fn contains(&self, key: &Value) -> bool {
        let key = HashKey(key.clone());
        match &*self.shape() {
            Shape::Map { entries, .. } => entries.contains_key(&key),
            Shape::Set { items, .. } => items.contains(&key),
            _ => false,
        }
    }

    /// Read a map entry. Sets report the item itself.
    pub fn entry(&self, key: &Value) -> Option<Value> {
        let key = HashKey(key.clone());
        match &*self.shape() {
            Shape::Map { entries, .. } => entries.get(&key).cloned(),
            Shape::Set { items, .. } => items.get(&key).map(|k| k.0.clone()),
            _ => None,
        }
    }

    /// Write a map entry, returning the previous value.
    pub fn set_entry(&self, key: Value, value: Value) -> Option<Value> {
        match &mut *self.shape_mut() {
            Shape::Map { entries, .. } => entries.insert(HashKey(key), value),
            _ => None,
        }
    }

    /// Add a set item. Returns whether it was newly added.
    pub fn add_item(&self, value: Value) -> bool {
        match &mut *self.shape_mut() {
            Shape::Set { items, .. } => items.insert(HashKey(value)),
            _ => false,
        }
    }

    /// Remove a map entry or set item, returning the removed value.
    pub fn delete_entry(&self, key: &Value) -> Option<Value> {
        let key = HashKey(key.clone());
        match &mut *self.shape_mut() {
            Shape::Map { entries, .. } => entries.shift_remove(&key),
            Shape::Set { items, .. } => items.shift_take(&key).map(|k| k.0),
            _ => None,
        }
    }

    /// Remove every entry.
    pub fn clear_entries(&self) {
        match &mut *self.shape_mut() {
            Shape::Map { entries, .. } => entries.clear(),
            Shape::Set { items, .. } => items.clear(),
            _ => {}
        }
    }

    /// `(key, value)` pairs in insertion order. Set items are reported as
    /// `(item, item)`.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &*self.shape() {
            Shape::Map { entries, .. } => entries
                .iter()
                .map(|(k, v)| (k.0.clone(), v.clone()))
                .collect(),
            Shape::Set { items, .. } => items
                .iter()
                .map(|k| (k.0.clone(), k.0.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A new object with a shallow copy of this object's shape.
    pub fn shallow_clone(&self) -> Obj {
        Obj::new(self.shape().clone())
    }
}

fn list_write_in_bounds(key: &PropKey, value: &Value) -> bool {
    match key.as_index() {
        Some(i) => i < MAX_LIST_LEN,
        None => !key.is_length() || list_len(value).is_some(),
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.shape.try_borrow() {
            Ok(shape) => write!(f, "{}#{}", shape.kind().name(), self.0.id.0),
            Err(_) => write!(f, "Object#{}", self.0.id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_insert_pads_and_length_truncates() {
        let list = Obj::list([1, 2]);
        list.insert(PropKey::from(4usize), Value::from(5));
        assert_eq!(list.len(), 5);
        assert!(list.get(&PropKey::from(3usize)).is_undefined());

        list.insert(PropKey::length(), Value::from(1));
        assert_eq!(list.list_items(), vec![Value::from(1)]);
    }

    #[test]
    fn invalid_list_lengths_leave_the_list_alone() {
        let list = Obj::list([1, 2, 3]);
        for bad in [f64::NAN, f64::INFINITY, -5.0, 1.7, (MAX_LIST_LEN + 1) as f64] {
            assert!(list.insert(PropKey::length(), Value::from(bad)).is_none());
            assert_eq!(list.len(), 3);
        }
        assert!(list.insert(PropKey::length(), Value::from("2")).is_none());
        assert!(list.insert(PropKey::from(MAX_LIST_LEN), Value::from(1)).is_none());
        assert_eq!(list.len(), 3);

        assert_eq!(list_len(&Value::from(0)), Some(0));
        assert_eq!(list_len(&Value::from(-0.0)), Some(0));
        assert_eq!(list_len(&Value::from(MAX_LIST_LEN)), Some(MAX_LIST_LEN));
    }

    #[test]
    fn version_moves_on_mutation_only() {
        let record = Obj::record_from([("a", 1)]);
        let before = record.version();
        record.get(&PropKey::from("a"));
        record.own_keys();
        assert_eq!(record.version(), before);

        record.insert(PropKey::from("b"), Value::from(2));
        assert_ne!(record.version(), before);
    }

    #[test]
    fn map_keys_compare_by_identity() {
        let map = Obj::map();
        let a = Obj::record();
        let b = Obj::record();
        map.set_entry(Value::Object(a.clone()), Value::from(1));

        assert!(map.contains(&Value::Object(a)));
        assert!(!map.contains(&Value::Object(b)));
    }

    #[test]
    fn record_remove_keeps_order() {
        let record = Obj::record_from([("a", 1), ("b", 2), ("c", 3)]);
        record.remove(&PropKey::from("b"));
        assert_eq!(
            record.own_keys(),
            vec![PropKey::from("a"), PropKey::from("c")]
        );
    }
}
