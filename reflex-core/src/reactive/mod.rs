//! Dependency Tracking Engine
//!
//! This module implements the core of the reactive system: dependency sets,
//! effects, and the track/trigger engine that connects them.
//!
//! # Concepts
//!
//! ## Dependency Sets
//!
//! A [`Dep`] is the set of effects subscribed to one observable location,
//! such as a property of one raw object or the contents of one boxed value.
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] is a computation that records what it reads. When
//! one of those locations is written, the effect re-runs (or is handed to
//! its scheduler). Derived values are built on effects too.
//!
//! ## Track and Trigger
//!
//! [`track`] records a read against the running effect; [`trigger`] and
//! [`trigger_batch`] fan a write out to every affected effect, exactly once
//! per call.
//!
//! # Implementation Notes
//!
//! All mutable engine state lives on a per-thread [`Runtime`]. Tracking is
//! automatic: wrappers and refs call `track` on read, so user code never
//! declares its dependencies.

mod context;
mod dep;
mod effect;
mod operations;
mod runtime;
mod scheduler;
mod scope;

pub use context::{
    enable_tracking, enable_triggering, is_tracking, is_triggering, pause_tracking,
    pause_triggering, reset_tracking, reset_triggering, untracked, without_triggers,
    ReactiveContext, TrackingPause, MAX_MARKER_BITS,
};
pub use dep::Dep;
pub use effect::{
    effect, effect_with, stop, DebugHook, DerivedKind, EffectId, EffectOptions, ReactiveEffect,
    Runner, Scheduler,
};
pub use operations::{
    DebugOp, DebugTarget, DebuggerEvent, Invalidation, TrackKey, TrackOp, TriggerEvent, TriggerOp,
};
pub use runtime::{track, trigger, trigger_batch, Runtime};
pub use scheduler::{flush_jobs, has_pending_jobs, queue_job};
pub use scope::{effect_scope, get_current_scope, on_scope_dispose, EffectScope};

pub(crate) use operations::DebugInfo;
