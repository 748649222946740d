//! Tracking Context
//!
//! The tracking context is the process-wide (thread-local) state that makes
//! automatic dependency collection work: the stack of currently running
//! computations (the innermost is the one reads are charged to) and the
//! tracking-enabled flag with its own save/restore stack.
//!
//! Both stacks are maintained through scope guards so they are restored on
//! every exit path, including panics in user computations. Nested runs save
//! and restore each other's ambient state; a nested computation can never
//! corrupt the flag or leave itself on the stack.
//!
//! All of this state is strictly single-threaded: the runtime is cooperative
//! and nothing here is safe to share across native threads.

use std::cell::{Cell, RefCell};

use crate::effect::Effect;

thread_local! {
    static EFFECT_STACK: RefCell<Vec<Effect>> = RefCell::new(Vec::new());
    static SHOULD_TRACK: Cell<bool> = Cell::new(true);
    static TRACK_STACK: RefCell<Vec<bool>> = RefCell::new(Vec::new());
}

/// Disable dependency tracking until the matching [`reset_tracking`].
///
/// Use around reads that must not register the active computation as a
/// subscriber.
pub fn pause_tracking() {
    TRACK_STACK.with(|stack| stack.borrow_mut().push(SHOULD_TRACK.with(Cell::get)));
    SHOULD_TRACK.with(|flag| flag.set(false));
}

/// Force-enable dependency tracking until the matching [`reset_tracking`].
pub fn enable_tracking() {
    TRACK_STACK.with(|stack| stack.borrow_mut().push(SHOULD_TRACK.with(Cell::get)));
    SHOULD_TRACK.with(|flag| flag.set(true));
}

/// Restore the tracking flag to its state before the most recent
/// [`pause_tracking`] / [`enable_tracking`].
///
/// An unmatched reset restores the default (enabled).
pub fn reset_tracking() {
    let last = TRACK_STACK.with(|stack| stack.borrow_mut().pop());
    SHOULD_TRACK.with(|flag| flag.set(last.unwrap_or(true)));
}

/// Whether reads are currently recorded at all.
pub fn tracking_enabled() -> bool {
    SHOULD_TRACK.with(Cell::get)
}

/// The computation reads are currently charged to, if any.
pub(crate) fn active_effect() -> Option<Effect> {
    EFFECT_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Whether the computation with the given id is anywhere on the call stack.
pub(crate) fn stack_contains(id: u64) -> bool {
    EFFECT_STACK.with(|stack| stack.borrow().iter().any(|e| e.id() == id))
}

/// Scope guard for one computation run: pushes the effect and enables
/// tracking on entry; pops the stack and restores the flag on exit,
/// including panic unwinds. The previously running computation becomes
/// active again automatically when this drops.
pub(crate) struct TrackingScope(());

impl TrackingScope {
    pub(crate) fn enter(effect: Effect) -> TrackingScope {
        enable_tracking();
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(effect));
        TrackingScope(())
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        EFFECT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        reset_tracking();
    }
}

/// Scope guard for a tracking-paused section.
pub(crate) struct PausedTracking(());

impl PausedTracking {
    pub(crate) fn enter() -> PausedTracking {
        pause_tracking();
        PausedTracking(())
    }
}

impl Drop for PausedTracking {
    fn drop(&mut self) {
        reset_tracking();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_and_reset_restore_prior_state() {
        assert!(tracking_enabled());

        pause_tracking();
        assert!(!tracking_enabled());

        // Nested pause
        pause_tracking();
        assert!(!tracking_enabled());

        // Force-enable inside the paused section
        enable_tracking();
        assert!(tracking_enabled());

        reset_tracking();
        assert!(!tracking_enabled());
        reset_tracking();
        assert!(!tracking_enabled());
        reset_tracking();
        assert!(tracking_enabled());
    }

    #[test]
    fn unmatched_reset_defaults_to_enabled() {
        reset_tracking();
        assert!(tracking_enabled());
    }

    #[test]
    fn paused_guard_restores_on_drop() {
        assert!(tracking_enabled());
        {
            let _paused = PausedTracking::enter();
            assert!(!tracking_enabled());
        }
        assert!(tracking_enabled());
    }
}
