// SPDX-License-Identifier: MIT

//! Suspend / Resume (spec.md §4.6 "Suspend / Resume"): a two-phase
//! protocol. Phase 0 kicks off the work on a background thread and
//! returns no reply at all, so a caller can fan phase 0 out across many
//! steps before blocking on any of them; phase 1 waits for that thread's
//! result and replies with `(rc, errno)`.

use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use parking_lot::{Condvar, Mutex};
use stepd_core::{RcErrno, StepErrno};
use tracing::debug;

use crate::state::StepDaemonState;

/// How long `TSTP` is given to let cooperative MPI daemons quiesce before
/// `STOP` is delivered (spec.md §4.6: "wait ~2 s"; property 7 only
/// requires a >= 1 s gap, so a little slack here is harmless).
const TSTP_TO_STOP_GAP: Duration = Duration::from_secs(2);

enum ToggleState {
    Idle,
    InFlight,
    Done(RcErrno),
}

/// The background-thread result slot for one phase-0/phase-1 pair.
/// `StepDaemonState` holds one of these for suspend and one for resume;
/// they are independent since a caller is never mid-suspend and
/// mid-resume at once (the suspend flag enforces that).
pub struct PendingToggle {
    state: Mutex<ToggleState>,
    cond: Condvar,
}

impl PendingToggle {
    pub fn new() -> Self {
        Self { state: Mutex::new(ToggleState::Idle), cond: Condvar::new() }
    }

    /// Phase 0: if idle, mark in-flight and return true so the caller
    /// spawns the worker thread. Returns false if a toggle is already
    /// running (a malformed client re-sending phase 0 without a phase 1).
    fn begin(&self) -> bool {
        let mut guard = self.state.lock();
        match *guard {
            ToggleState::Idle => {
                *guard = ToggleState::InFlight;
                true
            }
            _ => false,
        }
    }

    fn finish(&self, result: RcErrno) {
        let mut guard = self.state.lock();
        *guard = ToggleState::Done(result);
        self.cond.notify_all();
    }

    /// Phase 1: block up to `timeout` for the worker to finish, then reset
    /// to idle and return the result (or a timeout error).
    fn wait(&self, timeout: Duration) -> RcErrno {
        let mut guard = self.state.lock();
        if let ToggleState::Idle = *guard {
            return RcErrno::from_step_errno(StepErrno::NotRunning);
        }
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let ToggleState::Done(r) = *guard {
                *guard = ToggleState::Idle;
                return r;
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                *guard = ToggleState::Idle;
                return RcErrno::from_step_errno(StepErrno::TimedOut);
            }
            self.cond.wait_for(&mut guard, remaining);
        }
    }
}

impl Default for PendingToggle {
    fn default() -> Self {
        Self::new()
    }
}

/// `STEP_SUSPEND` phase 0: spawn the background suspend worker. No reply.
pub fn suspend_phase0(state: &Arc<StepDaemonState>, _core_spec: u16) {
    if !state.suspend_toggle.begin() {
        return;
    }
    let state = Arc::clone(state);
    std::thread::spawn(move || {
        let result = run_suspend(&state);
        state.suspend_toggle.finish(result);
    });
}

/// `STEP_SUSPEND` phase 1: wait for the worker and return its result.
pub fn suspend_phase1(state: &StepDaemonState) -> RcErrno {
    state.suspend_toggle.wait(state.config.suspend_timeout())
}

/// `STEP_RESUME` phase 0: spawn the background resume worker. No reply.
pub fn resume_phase0(state: &Arc<StepDaemonState>, _core_spec: u16) {
    if !state.resume_toggle.begin() {
        return;
    }
    let state = Arc::clone(state);
    std::thread::spawn(move || {
        let result = run_resume(&state);
        state.resume_toggle.finish(result);
    });
}

/// `STEP_RESUME` phase 1: wait for the worker and return its result.
pub fn resume_phase1(state: &StepDaemonState) -> RcErrno {
    state.resume_toggle.wait(state.config.resume_timeout())
}

fn run_suspend(state: &StepDaemonState) -> RcErrno {
    let collab = state.collaborators.as_ref();

    // Hooks live inside the closure so the idempotent-no-op case (already
    // suspended) skips them entirely, same as the signal delivery they
    // bracket (spec.md §4.6 bullet 1: "idempotent reply if already in
    // state" covers the whole sequence, not just the signals).
    let outcome = state.suspend.suspend_and_then(|| {
        collab.accounting().pause(state.container);
        collab.interconnect().pre_suspend(state.container);
        if let Err(e) = collab.container().signal(state.container, Signal::SIGTSTP as i32) {
            debug!(error = %e, "TSTP delivery during suspend failed");
        }
        std::thread::sleep(TSTP_TO_STOP_GAP);
        if let Err(e) = collab.container().signal(state.container, Signal::SIGSTOP as i32) {
            debug!(error = %e, "STOP delivery during suspend failed");
        }
    });

    if outcome.is_none() {
        return RcErrno::from_step_errno(StepErrno::StepSuspended);
    }
    collab.interconnect().post_suspend(state.container);
    RcErrno::OK
}

fn run_resume(state: &StepDaemonState) -> RcErrno {
    let collab = state.collaborators.as_ref();

    let outcome = state.suspend.resume_and_then(|| {
        collab.accounting().resume(state.container);
        collab.interconnect().pre_resume(state.container);
        if let Err(e) = collab.container().signal(state.container, Signal::SIGCONT as i32) {
            debug!(error = %e, "CONT delivery during resume failed");
        }
    });

    if outcome.is_none() {
        return RcErrno::from_step_errno(StepErrno::StepNotSuspended);
    }
    collab.interconnect().post_resume(state.container);
    RcErrno::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    use crate::config::Config;
    use stepd_collab::{AccountingPoller, Collaborators, ContainerBackend, InterconnectHooks, LocalCollab, ProfilingHook, Watchdog};

    fn state() -> Arc<StepDaemonState> {
        let cfg = Config::from_toml(
            r#"
            job_id = 1
            step_id = 0
            node_name = "node_A"
            node_id = 0
            owner_uid = 1000
            service_uid = 0
            suspend_timeout_secs = 2
            "#,
        )
        .unwrap();
        Arc::new(StepDaemonState::new(cfg, Arc::new(LocalCollab::new())))
    }

    /// spec.md E4.
    #[test]
    fn e4_suspend_then_resume_twice() {
        let s = state();
        suspend_phase0(&s, 0);
        assert_eq!(suspend_phase1(&s), RcErrno::OK);
        suspend_phase0(&s, 0);
        assert_eq!(suspend_phase1(&s), RcErrno::from_step_errno(StepErrno::StepSuspended));

        resume_phase0(&s, 0);
        assert_eq!(resume_phase1(&s), RcErrno::OK);
        resume_phase0(&s, 0);
        assert_eq!(resume_phase1(&s), RcErrno::from_step_errno(StepErrno::StepNotSuspended));
    }

    /// Delegates the container to a real [`LocalCollab`] but counts
    /// accounting/interconnect hook invocations, to prove those hooks are
    /// skipped on the idempotent no-op path (spec.md §4.6 bullet 1).
    #[derive(Default)]
    struct CountingCollab {
        inner: LocalCollab,
        pause_calls: AtomicUsize,
        resume_calls: AtomicUsize,
    }

    impl AccountingPoller for CountingCollab {
        fn pause(&self, container: stepd_collab::ContainerId) {
            self.pause_calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.accounting().pause(container);
        }
        fn resume(&self, container: stepd_collab::ContainerId) {
            self.resume_calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.accounting().resume(container);
        }
        fn snapshot(&self, container: stepd_collab::ContainerId) -> stepd_core::AccountingSnapshot {
            self.inner.accounting().snapshot(container)
        }
    }

    impl Collaborators for CountingCollab {
        fn container(&self) -> &dyn ContainerBackend {
            self.inner.container()
        }
        fn accounting(&self) -> &dyn AccountingPoller {
            self
        }
        fn interconnect(&self) -> &dyn InterconnectHooks {
            self.inner.interconnect()
        }
        fn profiling(&self) -> &dyn ProfilingHook {
            self.inner.profiling()
        }
        fn watchdog(&self) -> &dyn Watchdog {
            self.inner.watchdog()
        }
    }

    #[test]
    fn idempotent_suspend_skips_accounting_hook() {
        let cfg = Config::from_toml(
            r#"
            job_id = 1
            step_id = 0
            node_name = "node_A"
            node_id = 0
            owner_uid = 1000
            service_uid = 0
            suspend_timeout_secs = 2
            "#,
        )
        .unwrap();
        let collab = Arc::new(CountingCollab::default());
        let s = Arc::new(StepDaemonState::new(cfg, collab.clone()));

        suspend_phase0(&s, 0);
        assert_eq!(suspend_phase1(&s), RcErrno::OK);
        assert_eq!(collab.pause_calls.load(AtomicOrdering::SeqCst), 1);

        // Already suspended: the redundant toggle must not re-invoke the
        // accounting hook.
        suspend_phase0(&s, 0);
        assert_eq!(suspend_phase1(&s), RcErrno::from_step_errno(StepErrno::StepSuspended));
        assert_eq!(collab.pause_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn idempotent_resume_skips_accounting_hook() {
        let cfg = Config::from_toml(
            r#"
            job_id = 1
            step_id = 0
            node_name = "node_A"
            node_id = 0
            owner_uid = 1000
            service_uid = 0
            suspend_timeout_secs = 2
            resume_timeout_secs = 2
            "#,
        )
        .unwrap();
        let collab = Arc::new(CountingCollab::default());
        let s = Arc::new(StepDaemonState::new(cfg, collab.clone()));

        // Not suspended yet: resume is a no-op and must not touch the hook.
        resume_phase0(&s, 0);
        assert_eq!(resume_phase1(&s), RcErrno::from_step_errno(StepErrno::StepNotSuspended));
        assert_eq!(collab.resume_calls.load(AtomicOrdering::SeqCst), 0);

        suspend_phase0(&s, 0);
        assert_eq!(suspend_phase1(&s), RcErrno::OK);

        resume_phase0(&s, 0);
        assert_eq!(resume_phase1(&s), RcErrno::OK);
        assert_eq!(collab.resume_calls.load(AtomicOrdering::SeqCst), 1);
    }
}
