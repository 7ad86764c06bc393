// SPDX-License-Identifier: MIT

//! `ATTACH` (spec.md §4.6 "Attach"): let an `srun` reconnect to a running
//! step's tasks. Service-user-only per spec.md §9's resolution of the
//! attach-authorization Open Question. Dispatch already enforces the
//! service-only gate before calling [`handle`]; this records the new
//! client's I/O descriptor and returns the task roster.

use stepd_core::{AttachClient, StepErrno, StepLifecycle};
use stepd_wire::AttachOk;

use crate::state::StepDaemonState;

#[allow(clippy::too_many_arguments)]
pub fn handle(
    state: &StepDaemonState,
    io_addr: &str,
    resp_addr: &str,
    key: [u8; stepd_core::ATTACH_KEY_LEN],
    uid: u32,
    client_version: u16,
) -> Result<AttachOk, i32> {
    if state.lifecycle.current() != StepLifecycle::Running {
        return Err(-(StepErrno::NotRunning.code()));
    }
    state.attach_clients.add(AttachClient {
        io_addr: io_addr.to_string(),
        resp_addr: resp_addr.to_string(),
        key,
        uid,
        client_version,
    });
    let tasks = state.tasks.snapshot();
    Ok(AttachOk {
        pids: tasks.iter().map(|t| t.pid as u32).collect(),
        gtids: tasks.iter().map(|t| t.global_id).collect(),
        exe_names: tasks.iter().map(|t| t.exe_name.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use stepd_collab::LocalCollab;
    use stepd_core::TaskRecord;

    fn state() -> StepDaemonState {
        let cfg = Config::from_toml(
            r#"
            job_id = 1
            step_id = 0
            node_name = "node_A"
            node_id = 0
            owner_uid = 1000
            service_uid = 0
            "#,
        )
        .unwrap();
        StepDaemonState::new(cfg, Arc::new(LocalCollab::new()))
    }

    fn attach(state: &StepDaemonState) -> Result<stepd_wire::AttachOk, i32> {
        handle(state, "127.0.0.1:1", "127.0.0.1:2", [0u8; stepd_core::ATTACH_KEY_LEN], 1000, 1)
    }

    #[test]
    fn attach_before_running_is_rejected() {
        let state = state();
        assert!(attach(&state).is_err());
    }

    #[test]
    fn attach_after_running_lists_tasks() {
        let state = state();
        state.tasks.register(TaskRecord::new(0, 0, 111, "a.out"));
        state.lifecycle.advance(StepLifecycle::Running);
        let ok = attach(&state).unwrap();
        assert_eq!(ok.pids, vec![111]);
        assert_eq!(ok.exe_names, vec!["a.out".to_string()]);
        assert_eq!(state.attach_clients.len(), 1);
    }

    #[test]
    fn reattaching_at_same_io_addr_replaces_client() {
        let state = state();
        state.lifecycle.advance(StepLifecycle::Running);
        attach(&state).unwrap();
        attach(&state).unwrap();
        assert_eq!(state.attach_clients.len(), 1);
    }
}
