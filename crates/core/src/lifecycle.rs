// SPDX-License-Identifier: MIT

//! Step lifecycle state machine (spec.md §3 "Step Lifecycle State").
//!
//! A scalar with ordered values, monotonically non-decreasing, guarded by a
//! mutex with an associated condition variable. Handlers that require
//! `>= Running` wait up to a bounded timeout (at most twice) before failing.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// How long a single wait for `Running` blocks before retrying.
pub const WAIT_RUNNING_TIMEOUT: Duration = Duration::from_secs(60);
/// How many times `wait_for_running` retries the timed wait before giving up.
pub const WAIT_RUNNING_ATTEMPTS: u32 = 2;

/// Step lifecycle states, in the order defined by spec.md §3. Ordering is
/// meaningful: `NotRunning < Starting < Running < Ending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepLifecycle {
    NotRunning,
    Starting,
    Running,
    Ending,
}

crate::simple_display! {
    StepLifecycle {
        NotRunning => "not_running",
        Starting => "starting",
        Running => "running",
        Ending => "ending",
    }
}

impl StepLifecycle {
    /// Wire representation used by the `STATE` opcode.
    pub fn as_wire(self) -> u32 {
        match self {
            StepLifecycle::NotRunning => 0,
            StepLifecycle::Starting => 1,
            StepLifecycle::Running => 2,
            StepLifecycle::Ending => 3,
        }
    }
}

/// Shared, lock-protected lifecycle scalar plus its condition variable.
///
/// Transitions only move forward (`advance` panics in debug builds if asked
/// to move backward); every transition signals `Condvar::notify_all` so
/// waiters re-check.
pub struct LifecycleState {
    state: Mutex<StepLifecycle>,
    cond: Condvar,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleState {
    pub fn new() -> Self {
        Self { state: Mutex::new(StepLifecycle::NotRunning), cond: Condvar::new() }
    }

    pub fn current(&self) -> StepLifecycle {
        *self.state.lock()
    }

    /// Advance to `next`. No-op if `next <= current` (monotonic non-decreasing).
    pub fn advance(&self, next: StepLifecycle) {
        let mut guard = self.state.lock();
        if next > *guard {
            *guard = next;
            self.cond.notify_all();
        }
    }

    /// Block until the state is `>= Running`, retrying the timed wait up to
    /// `WAIT_RUNNING_ATTEMPTS` times. Returns `false` if the budget is
    /// exhausted while still below `Running`.
    pub fn wait_for_running(&self) -> bool {
        self.wait_for_at_least_with(StepLifecycle::Running, WAIT_RUNNING_TIMEOUT, WAIT_RUNNING_ATTEMPTS)
    }

    /// General form of [`wait_for_running`] used by tests to exercise the
    /// timeout path without a 120 s real wait.
    pub fn wait_for_at_least_with(&self, min: StepLifecycle, timeout: Duration, attempts: u32) -> bool {
        let mut guard = self.state.lock();
        for _ in 0..attempts {
            if *guard >= min {
                return true;
            }
            let result = self.cond.wait_for(&mut guard, timeout);
            if *guard >= min {
                return true;
            }
            if result.timed_out() {
                continue;
            }
        }
        *guard >= min
    }
}
