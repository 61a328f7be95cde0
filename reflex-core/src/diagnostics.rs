//! Diagnostics
//!
//! Misuse never panics and never returns an error: the operation becomes a
//! no-op and a [`Warning`] is emitted instead. Warnings are logged through
//! `tracing` at `WARN` and kept in a small per-thread buffer so callers (and
//! tests) can inspect them with [`take_warnings`].

use std::cell::RefCell;
use std::collections::VecDeque;

use thiserror::Error;

/// Most recent warnings kept per thread.
const BUFFER_LIMIT: usize = 256;

/// A non-fatal misuse report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("value cannot be made reactive: {0}")]
    NotObservable(String),

    #[error("Set operation on key \"{key}\" failed: target is readonly.")]
    ReadonlySet { key: String },

    #[error("Delete operation on key \"{key}\" failed: target is readonly.")]
    ReadonlyDelete { key: String },

    #[error("Set operation on methods \"{method}\" failed: target is readonly.")]
    ReadonlyMethod { method: String },

    #[error("{method} operation failed: target is readonly.")]
    ReadonlyCollection { method: String },

    #[error(
        "Reactive {kind} contains both the raw and reactive versions of the same object, \
         which can lead to inconsistencies. Avoid differentiating between the raw and \
         reactive versions of an object and only use the reactive version if possible."
    )]
    MixedIdentityKeys { kind: String },

    #[error("Write operation failed: computed value is readonly")]
    ComputedReadonly,

    #[error("target is not an object type, {method} function call cannot be made")]
    NotAnObject { method: String },

    #[error("to_refs() expects a reactive object but received a plain one.")]
    ToRefsOnPlain,

    #[error("cannot run an inactive effect scope.")]
    InactiveScope,

    #[error(
        "on_scope_dispose() is called when there is no active effect scope to be associated with."
    )]
    NoActiveScope,

    #[error("Invalid array length: {value}")]
    InvalidLength { value: String },

    #[error("Invalid array index: {index}")]
    InvalidIndex { index: String },

    #[error("{operation} is not supported on {kind}")]
    UnsupportedOperation { operation: String, kind: String },
}

thread_local! {
    static WARNINGS: RefCell<VecDeque<Warning>> = RefCell::new(VecDeque::new());
}

/// Emit a warning.
pub fn warn(warning: Warning) {
    tracing::warn!("{warning}");
    // Ignore warnings raised while the thread is shutting down.
    let _ = WARNINGS.try_with(|buffer| {
        let mut buffer = buffer.borrow_mut();
        if buffer.len() == BUFFER_LIMIT {
            buffer.pop_front();
        }
        buffer.push_back(warning);
    });
}

/// Drain the warnings emitted on this thread since the last call.
pub fn take_warnings() -> Vec<Warning> {
    WARNINGS.with(|buffer| buffer.borrow_mut().drain(..).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_buffered_and_drained() {
        take_warnings();
        warn(Warning::ComputedReadonly);
        warn(Warning::ReadonlySet { key: "a".into() });

        let warnings = take_warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[1].to_string(),
            "Set operation on key \"a\" failed: target is readonly."
        );
        assert!(take_warnings().is_empty());
    }

    #[test]
    fn buffer_is_bounded() {
        take_warnings();
        for _ in 0..BUFFER_LIMIT + 10 {
            warn(Warning::InactiveScope);
        }
        assert_eq!(take_warnings().len(), BUFFER_LIMIT);
    }
}
