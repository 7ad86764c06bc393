// SPDX-License-Identifier: MIT

//! `SIGNAL_CONTAINER` (spec.md §4.6 "Signal container").

use nix::sys::signal::Signal;
use stepd_collab::CollabError;
use stepd_core::{signal, RcErrno, StepErrno, StepLifecycle};
use tracing::{info, warn};

use crate::state::StepDaemonState;

pub fn handle(state: &StepDaemonState, sig: i32, flags: i32, _requestor_uid: u32) -> RcErrno {
    if !state.lifecycle.wait_for_running() {
        return RcErrno::from_step_errno(StepErrno::NotRunning);
    }

    state.tasks.mark_all_killed_by_cmd();

    if signal::is_cancellation_reason(sig) && is_messenger_node(state) {
        info!(sig, job = state.step_id.job_id, step = state.step_id.step_id, "step cancellation reason");
    }

    if sig == signal::ABORT {
        state.mark_aborted();
    }
    let sig = signal::effective_signal(sig);

    let suspended_conflict = state.suspend.with_lock(|suspended| suspended && sig != signal::KILL);
    if suspended_conflict {
        return RcErrno::from_step_errno(StepErrno::StepSuspended);
    }

    if sig == signal::DEBUG_WAKE {
        for pid in state.tasks.pids() {
            if let Err(e) = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), Signal::SIGCONT) {
                if e != nix::errno::Errno::ESRCH {
                    warn!(pid, error = %e, "debug-wake delivery failed");
                }
            }
        }
        return RcErrno::OK;
    }

    if sig == signal::TERM_KILL {
        let _ = state.collaborators.container().signal(state.container, Signal::SIGCONT as i32);
        let _ = state.collaborators.container().signal(state.container, Signal::SIGTERM as i32);
        std::thread::sleep(state.config.kill_wait());
        return deliver(state, signal::KILL, flags);
    }

    deliver(state, sig, flags)
}

/// True at most once per step: this daemon's `node_id` matches the
/// configured messenger target, the step isn't the extern pseudo-step,
/// and the step hasn't already finished (spec.md §4.6 bullet 3). Flips
/// the one-shot latch as a side effect of returning `true`.
fn is_messenger_node(state: &StepDaemonState) -> bool {
    if state.step_id.is_extern() {
        return false;
    }
    if state.config.node_id != state.config.msg_target_node_id {
        return false;
    }
    if state.lifecycle.current() >= StepLifecycle::Ending {
        return false;
    }
    state
        .msg_sent
        .compare_exchange(false, true, std::sync::atomic::Ordering::SeqCst, std::sync::atomic::Ordering::SeqCst)
        .is_ok()
}

fn deliver(state: &StepDaemonState, sig: i32, _flags: i32) -> RcErrno {
    // `KILL_JOB_BATCH` is a no-op here: the batch-script pseudo-step
    // already has its own daemon and its own container holding only the
    // batch script's process group, so the default signal target already
    // matches spec.md §4.6's "signal only the batch-script process group".
    to_rc_errno(state.collaborators.container().signal(state.container, sig))
}

fn to_rc_errno(result: Result<(), CollabError>) -> RcErrno {
    match result {
        Ok(()) => RcErrno::OK,
        Err(CollabError::NoSuchContainer) => RcErrno::from_step_errno(StepErrno::NotFound),
        Err(CollabError::Signal(errno)) => RcErrno::err(errno as i32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::state::StepDaemonState;
    use stepd_collab::LocalCollab;
    use stepd_core::StepLifecycle;

    fn running_state() -> StepDaemonState {
        let cfg = Config::from_toml(
            r#"
            job_id = 42
            step_id = 0
            node_name = "node_A"
            node_id = 0
            owner_uid = 1000
            service_uid = 0
            "#,
        )
        .unwrap();
        let state = StepDaemonState::new(cfg, Arc::new(LocalCollab::new()));
        state.lifecycle.advance(StepLifecycle::Running);
        state.collaborators.container().add_pid(state.container, std::process::id()).unwrap();
        state
    }

    /// spec.md E2.
    #[test]
    fn e2_signal_running_step() {
        let state = running_state();
        let rc = handle(&state, Signal::SIGTERM as i32, 0, 1000);
        assert_eq!(rc, RcErrno::OK);
    }

    /// spec.md property 6.
    #[test]
    fn signal_while_suspended_blocks_non_kill() {
        let state = running_state();
        state.suspend.suspend_and_then(|| {}).unwrap();
        let rc = handle(&state, Signal::SIGTERM as i32, 0, 1000);
        assert_eq!(rc, RcErrno::from_step_errno(StepErrno::StepSuspended));
        let rc = handle(&state, signal::KILL, 0, 1000);
        assert_eq!(rc, RcErrno::OK);
    }

    /// spec.md §4.6 bullet 3: only the designated messenger node logs,
    /// and only once.
    #[test]
    fn messenger_node_logs_at_most_once() {
        let state = running_state();
        assert!(is_messenger_node(&state));
        assert!(!is_messenger_node(&state));
    }

    #[test]
    fn non_messenger_node_never_logs() {
        let cfg = Config::from_toml(
            r#"
            job_id = 42
            step_id = 0
            node_name = "node_A"
            node_id = 1
            msg_target_node_id = 0
            owner_uid = 1000
            service_uid = 0
            "#,
        )
        .unwrap();
        let state = StepDaemonState::new(cfg, Arc::new(LocalCollab::new()));
        state.lifecycle.advance(StepLifecycle::Running);
        assert!(!is_messenger_node(&state));
    }
}
