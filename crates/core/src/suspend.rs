// SPDX-License-Identifier: MIT

//! Suspend flag (spec.md §3 "Suspend Flag", §5 "Suspend lock").
//!
//! Protected by its own mutex; flipped only by the suspend/resume handlers
//! and inspected by the signal handler and by resume/suspend themselves as
//! an idempotence guard. The signal handler must not take this lock
//! recursively — callers take the lock once, inspect, and release before
//! doing any long-running work except the `TERM_KILL` kill-wait sleep,
//! which is held intentionally (spec.md §9).

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct SuspendState {
    suspended: Mutex<bool>,
}

/// Outcome of an idempotence-guarded suspend/resume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Applied,
    AlreadyInState,
}

impl SuspendState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suspended(&self) -> bool {
        *self.suspended.lock()
    }

    /// Attempt to mark suspended. Returns `AlreadyInState` if already
    /// suspended (the caller should reply with `STEP_SUSPENDED` and do
    /// nothing else).
    pub fn try_suspend(&self) -> ToggleOutcome {
        let mut guard = self.suspended.lock();
        if *guard {
            ToggleOutcome::AlreadyInState
        } else {
            *guard = true;
            ToggleOutcome::Applied
        }
    }

    /// Attempt to mark resumed. Returns `AlreadyInState` if already not
    /// suspended (the caller should reply with `STEP_NOTSUSPENDED`).
    pub fn try_resume(&self) -> ToggleOutcome {
        let mut guard = self.suspended.lock();
        if !*guard {
            ToggleOutcome::AlreadyInState
        } else {
            *guard = false;
            ToggleOutcome::Applied
        }
    }

    /// Unconditionally clear the flag (used by `STEP_TERMINATE`, which
    /// thaws a stopped container before delivering `KILL`).
    pub fn clear(&self) {
        *self.suspended.lock() = false;
    }

    /// Run `f` while holding the suspend lock. Used by the signal handler,
    /// which must take this lock exactly once per request.
    pub fn with_lock<R>(&self, f: impl FnOnce(bool) -> R) -> R {
        let guard = self.suspended.lock();
        f(*guard)
    }

    /// Flip to suspended and run `f` (the `TSTP`/`STOP` delivery) while
    /// still holding the lock, so a concurrent `KILL` cannot race with it
    /// (spec.md §5 "Suspend lock ... held across signal delivery"). Runs
    /// `f` and returns `Some(f())` only if the flag actually flipped;
    /// `None` if already suspended (idempotence guard).
    pub fn suspend_and_then<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let mut guard = self.suspended.lock();
        if *guard {
            return None;
        }
        *guard = true;
        Some(f())
    }

    /// Symmetric counterpart of [`suspend_and_then`] for resume's `CONT`
    /// delivery.
    pub fn resume_and_then<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let mut guard = self.suspended.lock();
        if !*guard {
            return None;
        }
        *guard = false;
        Some(f())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspend_idempotence() {
        let s = SuspendState::new();
        assert_eq!(s.try_suspend(), ToggleOutcome::Applied);
        assert_eq!(s.try_suspend(), ToggleOutcome::AlreadyInState);
    }

    #[test]
    fn resume_idempotence() {
        let s = SuspendState::new();
        assert_eq!(s.try_resume(), ToggleOutcome::AlreadyInState);
        s.try_suspend();
        assert_eq!(s.try_resume(), ToggleOutcome::Applied);
        assert_eq!(s.try_resume(), ToggleOutcome::AlreadyInState);
    }
}
