// SPDX-License-Identifier: MIT

//! `JOB_NOTIFY` (spec.md §4.6 "Notify"): log a message prominently so
//! attached clients see it. Reply is a bare `i32 rc` (spec.md §6).

use tracing::info;

use crate::state::StepDaemonState;

pub fn handle(state: &StepDaemonState, msg: &str) -> i32 {
    info!(job = state.step_id.job_id, step = state.step_id.step_id, message = msg, "job notify");
    0
}
