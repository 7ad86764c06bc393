// SPDX-License-Identifier: MIT

//! `STEP_TERMINATE` (spec.md §4.6 "Terminate").

use nix::sys::signal::Signal;
use stepd_core::{RcErrno, StepErrno};

use crate::state::StepDaemonState;

pub fn handle(state: &StepDaemonState) -> RcErrno {
    state.collaborators.watchdog().arm(state.container, state.config.kill_wait());

    if !state.lifecycle.wait_for_running() {
        state.collaborators.watchdog().disarm(state.container);
        return RcErrno::from_step_errno(StepErrno::NotRunning);
    }

    state.tasks.mark_all_killed_by_cmd();
    state.suspend.clear();

    let result = state.collaborators.container().signal(state.container, Signal::SIGKILL as i32);
    state.collaborators.watchdog().disarm(state.container);

    match result {
        Ok(()) => RcErrno::OK,
        Err(stepd_collab::CollabError::NoSuchContainer) => RcErrno::OK,
        Err(stepd_collab::CollabError::Signal(errno)) => RcErrno::err(errno as i32),
    }
}
