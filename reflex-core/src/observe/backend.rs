//! Backend selection.
//!
//! The switch is process-wide and only affects wrappers created after the
//! change; existing wrappers keep the backend they were built with.
//! [`with_backend`] scopes a choice to the current thread, which keeps
//! concurrently running tests from observing each other's switches.

use std::cell::Cell;
use std::sync::atomic::{AtomicU8, Ordering};

/// How record and list wrappers intercept reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Per-variant static trap tables consulted on every access.
    Interception,
    /// A shadow of per-property accessor pairs kept in sync with the target.
    Descriptor,
}

const UNSET: u8 = 0;
const INTERCEPTION: u8 = 1;
const DESCRIPTOR: u8 = 2;

static OVERRIDE: AtomicU8 = AtomicU8::new(UNSET);

thread_local! {
    static THREAD_OVERRIDE: Cell<Option<Backend>> = const { Cell::new(None) };
}

impl Backend {
    /// The backend used when nothing overrides it.
    pub fn platform_default() -> Self {
        if cfg!(feature = "native-interception") {
            Self::Interception
        } else {
            Self::Descriptor
        }
    }
}

/// Build new wrappers with the descriptor backend.
pub fn disable_interception() {
    OVERRIDE.store(DESCRIPTOR, Ordering::SeqCst);
}

/// Build new wrappers with the interception backend.
pub fn enable_interception() {
    OVERRIDE.store(INTERCEPTION, Ordering::SeqCst);
}

/// Return to the platform default.
pub fn reset_interception() {
    OVERRIDE.store(UNSET, Ordering::SeqCst);
}

/// The backend new wrappers will use on this thread.
pub fn active_backend() -> Backend {
    if let Some(backend) = THREAD_OVERRIDE.with(Cell::get) {
        return backend;
    }
    match OVERRIDE.load(Ordering::SeqCst) {
        INTERCEPTION => Backend::Interception,
        DESCRIPTOR => Backend::Descriptor,
        _ => Backend::platform_default(),
    }
}

/// Run `f` with `backend` selected for wrappers created on this thread.
pub fn with_backend<R>(backend: Backend, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Backend>);

    impl Drop for Restore {
        fn drop(&mut self) {
            THREAD_OVERRIDE.with(|cell| cell.set(self.0));
        }
    }

    let _restore = Restore(THREAD_OVERRIDE.with(|cell| cell.replace(Some(backend))));
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_override_wins_and_restores() {
        let before = active_backend();
        with_backend(Backend::Descriptor, || {
            assert_eq!(active_backend(), Backend::Descriptor);
            with_backend(Backend::Interception, || {
                assert_eq!(active_backend(), Backend::Interception);
            });
            assert_eq!(active_backend(), Backend::Descriptor);
        });
        assert_eq!(active_backend(), before);
    }

    #[cfg(feature = "native-interception")]
    #[test]
    fn feature_selects_interception_by_default() {
        assert_eq!(Backend::platform_default(), Backend::Interception);
    }
}
