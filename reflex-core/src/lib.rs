//! Reflex Core
//!
//! Fine-grained reactive dependency tracking over plain dynamic data.
//! It implements:
//!
//! - Reactive wrappers over records, lists, maps and sets
//! - Boxed values, computed values and deferred computed values
//! - Effects with automatic dependency tracking and effect scopes
//! - Two interchangeable backends for observing record and list access
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamic value model (`Value`, raw `Obj`ects, keys)
//! - `reactive`: the track/trigger engine, effects, scopes and job queue
//! - `observe`: the wrapper factory, both backends and the shared list and
//!   collection instrumentation
//! - `refs`: boxed and derived values
//! - `diagnostics`: non-fatal misuse warnings
//!
//! # Example
//!
//! ```rust
//! use reflex_core::{computed, effect, reactive, Value};
//! use serde_json::json;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let state = reactive(json!({"count": 1})).into_reactive().unwrap();
//!
//! let doubled = {
//!     let state = state.clone();
//!     computed(move || Value::from(state.get("count").as_f64().unwrap() * 2.0))
//! };
//!
//! let seen = Rc::new(Cell::new(0.0));
//! let _runner = {
//!     let (doubled, seen) = (doubled.clone(), seen.clone());
//!     effect(move || seen.set(doubled.get().as_f64().unwrap()))
//! };
//! assert_eq!(seen.get(), 2.0);
//!
//! state.set("count", 5);
//! assert_eq!(seen.get(), 10.0);
//! ```

pub mod diagnostics;
pub mod observe;
pub mod reactive;
pub mod refs;
pub mod value;

pub use diagnostics::{take_warnings, Warning};
pub use observe::{
    disable_interception, enable_interception, is_proxy, is_reactive, is_readonly, is_shallow,
    mark_raw, reactive, readonly, reset_interception, shallow_reactive, shallow_readonly, to_raw,
    Backend, Reactive, Variant,
};
pub use reactive::{
    effect, effect_scope, effect_with, enable_triggering, flush_jobs, on_scope_dispose,
    pause_triggering, queue_job, reset_triggering, stop, track, trigger, untracked,
    without_triggers, EffectOptions, EffectScope, ReactiveEffect, Runner, TrackKey, TrackOp,
    TriggerEvent, TriggerOp,
};
pub use refs::{
    computed, custom_ref, deferred_computed, is_ref, make_ref, proxy_refs, shallow_ref, to_ref,
    to_refs, trigger_ref, unref, AnyRef, Computed, CustomRef, DeferredComputed, Ref,
};
pub use value::{Obj, PropKey, Value};
