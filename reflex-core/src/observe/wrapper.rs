//! The wrapper handle.
//!
//! A [`Reactive`] forwards every operation to the handler it was built
//! with. Record and list operations go through an
//! [`ObjectHandler`](super::handlers::ObjectHandler) supplied by the
//! backend; list methods go through the shared list instrumentation and
//! map/set operations through the shared collection instrumentation.
//!
//! Calling an operation that does not fit the target's shape (a list method
//! on a record, `get_entry` on a list, ...) emits
//! [`Warning::UnsupportedOperation`] and returns a neutral value.

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::array::{self, ListEdit, SearchMethod};
use super::collection::{self, CollectionIter};
use super::descriptor::Shadow;
use super::handlers::ObjectHandler;
use super::interception::{self, TrapTable};
use super::{Backend, CollectionKind, CommonKind, IdentityKey, TargetKind, Variant};
use crate::diagnostics::{warn, Warning};
use crate::reactive::Runtime;
use crate::value::{Obj, PropKey, Value};

/// Identity of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WrapperId(u64);

impl WrapperId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What a wrapper forwards to.
pub(crate) enum Target {
    Raw(Obj),
    /// A read-only wrapper over a mutable wrapper reads through it.
    Observed(Reactive),
}

pub(crate) enum Handler {
    Interception(&'static TrapTable),
    Descriptor(Shadow),
    Collection,
}

impl Handler {
    pub fn build(raw: &Obj, kind: TargetKind, variant: Variant, backend: Backend) -> Self {
        match (kind, backend) {
            (TargetKind::Collection(_), _) => Self::Collection,
            (TargetKind::Common(_), Backend::Interception) => {
                Self::Interception(interception::handlers_for(variant))
            }
            (TargetKind::Common(_), Backend::Descriptor) => {
                Self::Descriptor(Shadow::new(raw, variant))
            }
        }
    }

    fn object(&self) -> Option<&dyn ObjectHandler> {
        match self {
            Self::Interception(table) => Some(*table as &dyn ObjectHandler),
            Self::Descriptor(shadow) => Some(shadow as &dyn ObjectHandler),
            Self::Collection => None,
        }
    }
}

pub struct WrapperInner {
    id: WrapperId,
    target: Target,
    /// The innermost raw object.
    raw: Obj,
    variant: Variant,
    kind: TargetKind,
    backend: Backend,
    handler: Handler,
    identity: IdentityKey,
}

impl Drop for WrapperInner {
    fn drop(&mut self) {
        Runtime::forget_wrapper(self.variant, self.identity);
    }
}

/// A reactive wrapper around a raw object.
///
/// Cloning produces another handle to the same wrapper. Equality of
/// wrapper values is identity.
#[derive(Clone)]
pub struct Reactive(Rc<WrapperInner>);

impl Reactive {
    pub(crate) fn new(
        target: Target,
        raw: Obj,
        variant: Variant,
        kind: TargetKind,
        backend: Backend,
        handler: Handler,
        identity: IdentityKey,
    ) -> Self {
        Self(Rc::new(WrapperInner {
            id: WrapperId::next(),
            target,
            raw,
            variant,
            kind,
            backend,
            handler,
            identity,
        }))
    }

    pub(crate) fn from_inner(inner: Rc<WrapperInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<WrapperInner> {
        Rc::downgrade(&self.0)
    }

    pub fn id(&self) -> WrapperId {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn variant(&self) -> Variant {
        self.0.variant
    }

    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }

    /// The backend this wrapper was built with.
    pub fn backend(&self) -> Backend {
        self.0.backend
    }

    /// The innermost raw object.
    pub fn raw(&self) -> &Obj {
        &self.0.raw
    }

    pub(crate) fn target(&self) -> &Target {
        &self.0.target
    }

    /// Mutable, or read-only over a mutable wrapper.
    pub fn is_reactive(&self) -> bool {
        if self.0.variant.is_readonly() {
            match &self.0.target {
                Target::Observed(inner) => inner.is_reactive(),
                Target::Raw(_) => false,
            }
        } else {
            true
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Reactive(self.clone())
    }

    fn unsupported(&self, operation: &str) {
        warn(Warning::UnsupportedOperation {
            operation: operation.to_string(),
            kind: self.0.kind.name().to_string(),
        });
    }

    fn object_handler(&self, operation: &str) -> Option<&dyn ObjectHandler> {
        let handler = self.0.handler.object();
        if handler.is_none() {
            self.unsupported(operation);
        }
        handler
    }

    pub(crate) fn is_list(&self) -> bool {
        self.0.kind == TargetKind::Common(CommonKind::List)
    }

    fn expect_list(&self, operation: &str) -> bool {
        let ok = self.is_list();
        if !ok {
            self.unsupported(operation);
        }
        ok
    }

    pub(crate) fn collection_kind(&self) -> Option<CollectionKind> {
        match self.0.kind {
            TargetKind::Collection(kind) => Some(kind),
            TargetKind::Common(_) => None,
        }
    }

    fn expect_collection(&self, operation: &str) -> Option<CollectionKind> {
        let kind = self.collection_kind();
        if kind.is_none() {
            self.unsupported(operation);
        }
        kind
    }

    /// The descriptor shadow, for wrappers built by that backend.
    #[cfg(test)]
    pub(crate) fn shadow(&self) -> Option<&Shadow> {
        match &self.0.handler {
            Handler::Descriptor(shadow) => Some(shadow),
            _ => None,
        }
    }

    /// Notify the backend that the raw list changed under it.
    pub(crate) fn list_mutated(&self) {
        if let Some(handler) = self.0.handler.object() {
            handler.list_mutated(self);
        }
    }

    // ------------------------------------------------------------------
    // Records and lists
    // ------------------------------------------------------------------

    /// Read a property.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        match self.object_handler("get") {
            Some(handler) => handler.get(self, &key.into()),
            None => Value::Undefined,
        }
    }

    /// Write a property. Returns `false` when the write was refused for a
    /// reason other than the wrapper being read-only.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> bool {
        match self.object_handler("set") {
            Some(handler) => handler.set(self, key.into(), value.into()),
            None => false,
        }
    }

    /// Delete a property. Deleting a list index removes it.
    pub fn delete(&self, key: impl Into<PropKey>) -> bool {
        match self.object_handler("delete") {
            Some(handler) => handler.delete_property(self, &key.into()),
            None => false,
        }
    }

    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        match self.object_handler("has") {
            Some(handler) => handler.has(self, &key.into()),
            None => false,
        }
    }

    pub fn own_keys(&self) -> Vec<PropKey> {
        match self.object_handler("own_keys") {
            Some(handler) => handler.own_keys(self),
            None => Vec::new(),
        }
    }

    /// List length, record property count, or collection size.
    pub fn len(&self) -> usize {
        match self.0.kind {
            TargetKind::Common(CommonKind::List) => self
                .get(PropKey::length())
                .as_f64()
                .map_or(0, |n| n as usize),
            TargetKind::Common(CommonKind::Record) => self.own_keys().len(),
            TargetKind::Collection(_) => self.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a list's `length`.
    pub fn set_len(&self, len: usize) -> bool {
        self.expect_list("set_len") && self.set(PropKey::length(), len)
    }

    /// Every list item, read through the wrapper.
    pub fn to_vec(&self) -> Vec<Value> {
        if !self.expect_list("to_vec") {
            return Vec::new();
        }
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    // ------------------------------------------------------------------
    // List methods
    // ------------------------------------------------------------------

    /// Append an item. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        self.extend([value.into()])
    }

    /// Append several items as one mutation. Returns the new length.
    pub fn extend(&self, values: impl IntoIterator<Item = Value>) -> usize {
        if !self.expect_list("push") {
            return 0;
        }
        array::mutate(self, ListEdit::Push(values.into_iter().collect()));
        self.0.raw.len()
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Value {
        if !self.expect_list("pop") {
            return Value::Undefined;
        }
        first_removed(array::mutate(self, ListEdit::Pop))
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Value {
        if !self.expect_list("shift") {
            return Value::Undefined;
        }
        first_removed(array::mutate(self, ListEdit::Shift))
    }

    /// Prepend an item. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        if !self.expect_list("unshift") {
            return 0;
        }
        array::mutate(self, ListEdit::Unshift(vec![value.into()]));
        self.0.raw.len()
    }

    /// Remove `delete_count` items at `start` (to the end when `None`) and
    /// insert `items` there. A negative `start` counts from the end.
    /// Returns the removed items.
    pub fn splice(&self, start: isize, delete_count: Option<usize>, items: Vec<Value>) -> Vec<Value> {
        if !self.expect_list("splice") {
            return Vec::new();
        }
        array::mutate(
            self,
            ListEdit::Splice {
                start,
                delete_count,
                items,
            },
        )
        .unwrap_or_default()
    }

    /// Reverse the list in place.
    pub fn reverse(&self) {
        if self.expect_list("reverse") {
            array::mutate(self, ListEdit::Reverse);
        }
    }

    /// SameValueZero membership.
    pub fn includes(&self, value: impl Into<Value>) -> bool {
        self.expect_list("includes")
            && array::search(self, SearchMethod::Includes, &value.into()).is_some()
    }

    /// First index of a strictly equal item.
    pub fn index_of(&self, value: impl Into<Value>) -> Option<usize> {
        if !self.expect_list("index_of") {
            return None;
        }
        array::search(self, SearchMethod::IndexOf, &value.into())
    }

    /// Last index of a strictly equal item.
    pub fn last_index_of(&self, value: impl Into<Value>) -> Option<usize> {
        if !self.expect_list("last_index_of") {
            return None;
        }
        array::search(self, SearchMethod::LastIndexOf, &value.into())
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Read a map entry.
    pub fn get_entry(&self, key: impl Into<Value>) -> Value {
        match self.expect_collection("get_entry") {
            Some(kind) if kind.is_map() => collection::get(self, &key.into()),
            Some(_) => {
                self.unsupported("get_entry");
                Value::Undefined
            }
            None => Value::Undefined,
        }
    }

    /// Write a map entry.
    pub fn set_entry(&self, key: impl Into<Value>, value: impl Into<Value>) -> &Self {
        match self.expect_collection("set_entry") {
            Some(kind) if kind.is_map() => collection::set(self, key.into(), value.into()),
            Some(_) => self.unsupported("set_entry"),
            None => {}
        }
        self
    }

    /// Map key or set item membership.
    pub fn has_entry(&self, key: impl Into<Value>) -> bool {
        self.expect_collection("has_entry").is_some() && collection::has(self, &key.into())
    }

    /// Remove a map entry or set item.
    pub fn delete_entry(&self, key: impl Into<Value>) -> bool {
        self.expect_collection("delete_entry").is_some()
            && collection::delete(self, &key.into())
    }

    /// Add a set item.
    pub fn add(&self, value: impl Into<Value>) -> &Self {
        match self.expect_collection("add") {
            Some(kind) if !kind.is_map() => collection::add(self, value.into()),
            Some(_) => self.unsupported("add"),
            None => {}
        }
        self
    }

    /// Remove every entry.
    pub fn clear(&self) {
        match self.expect_collection("clear") {
            Some(kind) if kind.is_weak() => self.unsupported("clear"),
            Some(_) => collection::clear(self),
            None => {}
        }
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        match self.expect_collection("size") {
            Some(kind) if kind.is_weak() => {
                self.unsupported("size");
                0
            }
            Some(_) => collection::size(self),
            None => 0,
        }
    }

    /// Call `f(value, key)` for every entry, with both wrapped.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        if self.iterable("for_each") {
            for (key, value) in collection::entries(self, collection::IterKind::Entries) {
                f(value, key);
            }
        }
    }

    /// Map keys or set items.
    pub fn keys(&self) -> CollectionIter<Value> {
        if !self.iterable("keys") {
            return CollectionIter::empty(|(k, _)| k);
        }
        collection::iter(self, collection::IterKind::Keys, |(k, _)| k)
    }

    /// Map values or set items.
    pub fn values(&self) -> CollectionIter<Value> {
        if !self.iterable("values") {
            return CollectionIter::empty(|(_, v)| v);
        }
        collection::iter(self, collection::IterKind::Values, |(_, v)| v)
    }

    /// `(key, value)` pairs; sets yield `(item, item)`.
    pub fn entries(&self) -> CollectionIter<(Value, Value)> {
        if !self.iterable("entries") {
            return CollectionIter::empty(|pair| pair);
        }
        collection::iter(self, collection::IterKind::Entries, |pair| pair)
    }

    fn iterable(&self, operation: &str) -> bool {
        match self.expect_collection(operation) {
            Some(kind) if kind.is_weak() => {
                self.unsupported(operation);
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

fn first_removed(removed: Option<Vec<Value>>) -> Value {
    removed
        .and_then(|items| items.into_iter().next())
        .unwrap_or_default()
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.0.variant, self.0.raw)
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
