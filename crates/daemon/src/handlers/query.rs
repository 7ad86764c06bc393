// SPDX-License-Identifier: MIT

//! The always-allowed query opcodes (spec.md §4.5 bullet 1): `STATE`,
//! `INFO`, `MEM_LIMITS`, `UID`, `NODEID`, `DAEMON_PID`, `STEP_STAT`,
//! `STEP_TASK_INFO`, `STEP_LIST_PIDS`, `PID_IN_CONTAINER`, `X11_DISPLAY`.

use stepd_wire::{InfoReply, TaskInfoEntry, PROTOCOL_VERSION};

use crate::state::StepDaemonState;

pub fn state_wire(state: &StepDaemonState) -> u32 {
    state.lifecycle.current().as_wire()
}

pub fn info(state: &StepDaemonState) -> InfoReply {
    InfoReply {
        uid: state.config.owner_uid,
        job_id: state.step_id.job_id,
        step_id: state.step_id.step_id,
        protocol_version: PROTOCOL_VERSION as i32,
        node_id: state.config.node_id,
        job_mem: state.config.job_mem_kb,
        step_mem: state.config.step_mem_kb,
    }
}

pub fn mem_limits(state: &StepDaemonState) -> (u64, u64) {
    (state.config.job_mem_kb, state.config.step_mem_kb)
}

pub fn uid(state: &StepDaemonState) -> u32 {
    state.config.owner_uid
}

pub fn node_id(state: &StepDaemonState) -> u32 {
    state.config.node_id
}

pub fn daemon_pid(state: &StepDaemonState) -> i32 {
    state.daemon_pid
}

pub fn step_stat(state: &StepDaemonState) -> (Vec<u8>, i32) {
    let acct = state.collaborators.accounting().snapshot(state.container);
    (acct.to_bytes().to_vec(), state.tasks.count_live() as i32)
}

pub fn task_info(state: &StepDaemonState) -> Vec<TaskInfoEntry> {
    state
        .tasks
        .snapshot()
        .into_iter()
        .map(|t| TaskInfoEntry {
            local_id: t.local_id,
            global_id: t.global_id,
            pid: t.pid,
            exited: t.exited,
            exit_status: t.exit_status,
        })
        .collect()
}

pub fn list_pids(state: &StepDaemonState) -> Vec<u32> {
    state.collaborators.container().pids(state.container).unwrap_or_default()
}

pub fn pid_in_container(state: &StepDaemonState, pid: i32) -> bool {
    state.collaborators.container().pids(state.container).unwrap_or_default().contains(&(pid as u32))
}

/// `(display, xauthority_path)`; `(-1, "")` if no X11 forwarding was set up
/// for this step.
pub fn x11_display(state: &StepDaemonState) -> (i32, String) {
    match &*state.x11.lock() {
        Some(fwd) => (fwd.display as i32, fwd.xauthority_path.to_string_lossy().into_owned()),
        None => (-1, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use stepd_collab::LocalCollab;

    fn state() -> StepDaemonState {
        let cfg = Config::from_toml(
            r#"
            job_id = 42
            step_id = 0
            node_name = "node_A"
            node_id = 3
            owner_uid = 1000
            service_uid = 0
            "#,
        )
        .unwrap();
        StepDaemonState::new(cfg, Arc::new(LocalCollab::new()))
    }

    /// spec.md E1.
    #[test]
    fn e1_list_pids() {
        let state = state();
        state.collaborators.container().add_pid(state.container, 111).unwrap();
        state.collaborators.container().add_pid(state.container, 222).unwrap();
        assert_eq!(list_pids(&state), vec![111, 222]);
    }

    #[test]
    fn node_id_reads_back_config() {
        assert_eq!(node_id(&state()), 3);
    }
}
