//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads should be recorded at all. Reads made while an effect is running
//! (and tracking is enabled) register that effect as a dependent.
//!
//! # Implementation
//!
//! Two stacks live on the thread's [`Runtime`]:
//!
//! - the effect stack: entering an effect run pushes the effect, leaving it
//!   pops. Nested runs (an effect that reads a derived value, which runs its
//!   own getter) stack naturally.
//! - the tracking stack: `pause_tracking` / `enable_tracking` push the
//!   previous `should_track` flag and `reset_tracking` restores it.
//!
//! A third flag with its own stack gates writes the same way:
//! `pause_triggering` makes every trigger a no-op until the matching
//! `reset_triggering`. Triggers are discarded, not deferred.
//!
//! The stack depth doubles as the dependency marker generation. A run at
//! depth `d` owns the bit `1 << d` in every [`Dep`](super::Dep) it touches.
//!
//! Both are maintained by RAII guards so that a panicking effect function
//! cannot leave the stacks unbalanced.

use std::cell::{Cell, RefCell};

use super::effect::{EffectId, ReactiveEffect};
use super::runtime::Runtime;

/// Deepest nesting level that uses bit markers. Deeper runs fall back to a
/// full unsubscribe before each run.
pub const MAX_MARKER_BITS: u32 = 30;

/// Per-thread tracking state.
pub(crate) struct TrackingState {
    effect_stack: RefCell<Vec<ReactiveEffect>>,
    should_track: Cell<bool>,
    track_stack: RefCell<Vec<bool>>,
    should_trigger: Cell<bool>,
    trigger_stack: RefCell<Vec<bool>>,
}

impl TrackingState {
    pub fn new() -> Self {
        Self {
            effect_stack: RefCell::new(Vec::new()),
            should_track: Cell::new(true),
            track_stack: RefCell::new(Vec::new()),
            should_trigger: Cell::new(true),
            trigger_stack: RefCell::new(Vec::new()),
        }
    }

    /// The innermost running effect.
    pub fn active_effect(&self) -> Option<ReactiveEffect> {
        self.effect_stack.borrow().last().cloned()
    }

    /// Whether `id` is the innermost running effect.
    pub fn is_active(&self, id: EffectId) -> bool {
        self.effect_stack
            .borrow()
            .last()
            .is_some_and(|effect| effect.id() == id)
    }

    /// Whether `id` is anywhere on the effect stack.
    pub fn is_running(&self, id: EffectId) -> bool {
        self.effect_stack
            .borrow()
            .iter()
            .any(|effect| effect.id() == id)
    }

    /// Current nesting depth of effect runs.
    pub fn depth(&self) -> u32 {
        self.effect_stack.borrow().len() as u32
    }

    /// The marker bit owned by the current depth.
    pub fn track_op_bit(&self) -> u32 {
        1u32.checked_shl(self.depth()).unwrap_or(0)
    }

    pub fn should_track(&self) -> bool {
        self.should_track.get()
    }

    /// Tracking is enabled and some effect is running.
    pub fn is_tracking(&self) -> bool {
        self.should_track.get() && !self.effect_stack.borrow().is_empty()
    }

    pub fn pause(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(false);
    }

    pub fn enable(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(true);
    }

    pub fn reset(&self) {
        let last = self.track_stack.borrow_mut().pop();
        self.should_track.set(last.unwrap_or(true));
    }

    pub fn should_trigger(&self) -> bool {
        self.should_trigger.get()
    }

    pub fn pause_triggers(&self) {
        self.trigger_stack.borrow_mut().push(self.should_trigger.get());
        self.should_trigger.set(false);
    }

    pub fn enable_triggers(&self) {
        self.trigger_stack.borrow_mut().push(self.should_trigger.get());
        self.should_trigger.set(true);
    }

    pub fn reset_triggers(&self) {
        let last = self.trigger_stack.borrow_mut().pop();
        self.should_trigger.set(last.unwrap_or(true));
    }

    fn push(&self, effect: ReactiveEffect) {
        self.effect_stack.borrow_mut().push(effect);
    }

    fn pop(&self) -> Option<ReactiveEffect> {
        self.effect_stack.borrow_mut().pop()
    }
}

/// Guard for one effect run.
///
/// Entering pushes the effect, enables tracking and prepares the effect's
/// dependency markers. Dropping finalizes the markers (unsubscribing from
/// stale dependencies), restores tracking and pops the effect, even if the
/// effect function panicked.
pub struct ReactiveContext {
    effect: ReactiveEffect,
    bit: u32,
    marked: bool,
}

impl ReactiveContext {
    /// Enter a run of `effect`.
    pub(crate) fn enter(effect: &ReactiveEffect) -> Self {
        let (bit, depth) = Runtime::with(|rt| {
            rt.tracking.push(effect.clone());
            rt.tracking.enable();
            (rt.tracking.track_op_bit(), rt.tracking.depth())
        });

        let marked = depth <= MAX_MARKER_BITS;
        if marked {
            effect.init_dep_markers(bit);
        } else {
            effect.cleanup();
        }

        Self {
            effect: effect.clone(),
            bit,
            marked,
        }
    }

    /// Check if there is a running effect.
    pub fn is_active() -> bool {
        Runtime::with(|rt| rt.tracking.active_effect().is_some())
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<ReactiveEffect> {
        Runtime::with(|rt| rt.tracking.active_effect())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if self.marked {
            self.effect.finalize_dep_markers(self.bit);
        }

        let popped = Runtime::with(|rt| {
            rt.tracking.reset();
            rt.tracking.pop()
        });

        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.id(),
                self.effect.id(),
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect.id(),
                entry.id()
            );
        }

        if self.effect.take_deferred_stop() {
            self.effect.stop();
        }
    }
}

/// Guard that pauses tracking until dropped.
pub struct TrackingPause(());

impl TrackingPause {
    pub fn new() -> Self {
        pause_tracking();
        Self(())
    }
}

impl Default for TrackingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Stop recording reads until the matching [`reset_tracking`].
pub fn pause_tracking() {
    Runtime::with(|rt| rt.tracking.pause());
}

/// Record reads again until the matching [`reset_tracking`].
pub fn enable_tracking() {
    Runtime::with(|rt| rt.tracking.enable());
}

/// Restore the tracking flag saved by the last pause or enable.
pub fn reset_tracking() {
    Runtime::with(|rt| rt.tracking.reset());
}

/// Discard every trigger until the matching [`reset_triggering`].
pub fn pause_triggering() {
    Runtime::with(|rt| rt.tracking.pause_triggers());
}

/// Deliver triggers again until the matching [`reset_triggering`].
pub fn enable_triggering() {
    Runtime::with(|rt| rt.tracking.enable_triggers());
}

/// Restore the trigger flag saved by the last pause or enable.
pub fn reset_triggering() {
    Runtime::with(|rt| rt.tracking.reset_triggers());
}

/// Whether a write right now would notify anyone.
pub fn is_triggering() -> bool {
    Runtime::with(|rt| rt.tracking.should_trigger())
}

/// Run `f` with triggers discarded.
pub fn without_triggers<R>(f: impl FnOnce() -> R) -> R {
    struct Restore;

    impl Drop for Restore {
        fn drop(&mut self) {
            reset_triggering();
        }
    }

    pause_triggering();
    let _restore = Restore;
    f()
}

/// Whether a read right now would be recorded.
pub fn is_tracking() -> bool {
    Runtime::with(|rt| rt.tracking.is_tracking())
}

/// Run `f` without recording any reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = TrackingPause::new();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::ReactiveEffect;
    use crate::value::Value;

    #[test]
    fn context_tracks_effect() {
        let effect = ReactiveEffect::new(|| Value::Undefined, None);

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect().is_none());

        {
            let _ctx = ReactiveContext::enter(&effect);

            assert!(ReactiveContext::is_active());
            assert!(is_tracking());
            assert_eq!(
                ReactiveContext::current_effect().map(|e| e.id()),
                Some(effect.id())
            );
        }

        assert!(!ReactiveContext::is_active());
        assert!(!is_tracking());
    }

    #[test]
    fn nested_contexts() {
        let outer = ReactiveEffect::new(|| Value::Undefined, None);
        let inner = ReactiveEffect::new(|| Value::Undefined, None);

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            let bit1 = Runtime::with(|rt| rt.tracking.track_op_bit());
            {
                let _ctx2 = ReactiveContext::enter(&inner);
                let bit2 = Runtime::with(|rt| rt.tracking.track_op_bit());
                assert_eq!(bit2, bit1 << 1);
                assert!(Runtime::with(|rt| rt.tracking.is_running(outer.id())));
            }

            assert_eq!(
                ReactiveContext::current_effect().map(|e| e.id()),
                Some(outer.id())
            );
        }

        assert!(ReactiveContext::current_effect().is_none());
    }

    #[test]
    fn pause_and_reset_nest() {
        let effect = ReactiveEffect::new(|| Value::Undefined, None);
        let _ctx = ReactiveContext::enter(&effect);

        assert!(is_tracking());
        pause_tracking();
        assert!(!is_tracking());
        enable_tracking();
        assert!(is_tracking());
        reset_tracking();
        assert!(!is_tracking());
        reset_tracking();
        assert!(is_tracking());

        let inside = untracked(is_tracking);
        assert!(!inside);
        assert!(is_tracking());
    }

    #[test]
    fn trigger_flag_nests_like_the_tracking_flag() {
        assert!(is_triggering());
        pause_triggering();
        assert!(!is_triggering());
        enable_triggering();
        assert!(is_triggering());
        reset_triggering();
        assert!(!is_triggering());
        reset_triggering();
        assert!(is_triggering());

        assert!(!without_triggers(is_triggering));
        assert!(is_triggering());
    }
}
