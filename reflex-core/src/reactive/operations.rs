//! Operation kinds, dependency keys and debugger events.

use std::fmt;

use serde::Serialize;

use super::effect::EffectId;
use crate::value::{HashKey, Obj, PropKey, Value};

/// Kind of read recorded by `track`. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write reported to `trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// An observable location within one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A record property or list slot (including `length`).
    Prop(PropKey),
    /// A map key or set item.
    Entry(HashKey),
    /// "Iterate this container".
    Iterate,
    /// "Iterate this map's keys". Not affected by value-only map writes.
    MapKeyIterate,
}

impl TrackKey {
    pub fn prop(key: impl Into<PropKey>) -> Self {
        Self::Prop(key.into())
    }

    pub fn entry(key: impl Into<Value>) -> Self {
        Self::Entry(HashKey(key.into()))
    }

    /// The list index this key addresses, if any.
    pub(crate) fn index(&self) -> Option<usize> {
        match self {
            Self::Prop(key) => key.as_index(),
            _ => None,
        }
    }

    pub(crate) fn is_length(&self) -> bool {
        matches!(self, Self::Prop(key) if key.is_length())
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prop(key) => write!(f, "{key}"),
            Self::Entry(key) => write!(f, "{}", key.0),
            Self::Iterate => f.write_str("<iterate>"),
            Self::MapKeyIterate => f.write_str("<map key iterate>"),
        }
    }
}

/// Why a scheduler was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// A tracked location was written.
    Upstream,
    /// An upstream derived value is propagating its invalidation
    /// synchronously.
    Computed,
}

/// One write, as passed to `trigger_batch`.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub op: TriggerOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// Snapshot of a collection before `clear`.
    pub old_target: Option<Obj>,
}

impl TriggerEvent {
    pub fn new(op: TriggerOp, key: TrackKey) -> Self {
        Self {
            op,
            key: Some(key),
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }

    /// A `Clear` of a whole collection, with its pre-clear snapshot.
    pub fn clear(old_target: Option<Obj>) -> Self {
        Self {
            op: TriggerOp::Clear,
            key: None,
            new_value: None,
            old_value: None,
            old_target,
        }
    }

    pub fn with_values(mut self, new_value: Option<Value>, old_value: Option<Value>) -> Self {
        self.new_value = new_value;
        self.old_value = old_value;
        self
    }
}

/// The thing a debugger event refers to.
#[derive(Debug, Clone)]
pub enum DebugTarget {
    Object(Obj),
    /// A boxed or derived value, identified by address.
    Ref(usize),
}

/// The operation a debugger event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Payload passed to `on_track` / `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    pub target: DebugTarget,
    pub op: DebugOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub old_target: Option<Obj>,
}

/// A debugger event not yet addressed to an effect.
#[derive(Debug, Clone)]
pub(crate) struct DebugInfo {
    pub target: DebugTarget,
    pub op: DebugOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub old_target: Option<Obj>,
}

impl DebugInfo {
    pub fn track(target: DebugTarget, op: TrackOp, key: Option<TrackKey>) -> Self {
        Self {
            target,
            op: DebugOp::Track(op),
            key,
            new_value: None,
            old_value: None,
            old_target: None,
        }
    }

    pub fn trigger(target: DebugTarget, event: &TriggerEvent) -> Self {
        Self {
            target,
            op: DebugOp::Trigger(event.op),
            key: event.key.clone(),
            new_value: event.new_value.clone(),
            old_value: event.old_value.clone(),
            old_target: event.old_target.clone(),
        }
    }

    pub fn for_effect(&self, effect: EffectId) -> DebuggerEvent {
        DebuggerEvent {
            effect,
            target: self.target.clone(),
            op: self.op,
            key: self.key.clone(),
            new_value: self.new_value.clone(),
            old_value: self.old_value.clone(),
            old_target: self.old_target.clone(),
        }
    }
}
