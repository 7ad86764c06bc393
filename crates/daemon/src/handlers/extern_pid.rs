// SPDX-License-Identifier: MIT

//! `ADD_EXTERN_PID` (spec.md §4.8 "Extern-PID Tracker"): only valid on the
//! `EXTERN` pseudo-step. Registers the pid, then spawns a detached
//! watcher that waits for it to exit and recursively adopts any
//! descendant that gets re-parented to pid 1 (the SSH/login-shell case).

use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use stepd_core::ExternPid;
use tracing::{debug, warn};

use crate::state::StepDaemonState;

/// Poll interval for liveness checks (`kill(pid, 0)`), and the same
/// interval a newly-orphaned descendant can take up to one tick to be
/// noticed in (spec.md property 10: "within one polling interval").
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn handle(state: &Arc<StepDaemonState>, pid: i32) -> i32 {
    if !state.step_id.is_extern() {
        return -1;
    }
    register(state, pid);
    0
}

fn register(state: &Arc<StepDaemonState>, pid: i32) {
    let accounting_id = state.config.node_id;
    if !state.extern_pids.add(ExternPid { pid, accounting_id }) {
        return; // already tracked
    }
    if let Err(e) = state.collaborators.container().add_pid(state.container, pid as u32) {
        warn!(pid, error = %e, "failed to add extern pid to container");
    }
    state.collaborators.profiling().task_started(state.container, pid as u32);

    let state = Arc::clone(state);
    std::thread::spawn(move || watch(state, pid));
}

fn is_alive(pid: i32) -> bool {
    !matches!(nix::sys::signal::kill(Pid::from_raw(pid), None::<Signal>), Err(Errno::ESRCH))
}

fn watch(state: Arc<StepDaemonState>, pid: i32) {
    while is_alive(pid) {
        std::thread::sleep(POLL_INTERVAL);
    }
    debug!(pid, "extern pid exited");

    state.extern_pids.remove(pid);
    let exit_counters = state.collaborators.accounting().snapshot(state.container);
    state.completion.merge_extern_pid_exit(exit_counters);
    state.collaborators.profiling().task_ended(state.container, pid as u32);

    adopt_orphans(&state);
}

/// Re-parented descendants of an exited extern pid show up as pids whose
/// `ppid == 1` still present in the container (spec.md §4.8 bullet 4).
fn adopt_orphans(state: &Arc<StepDaemonState>) {
    let Ok(pids) = state.collaborators.container().pids(state.container) else { return };
    for pid in pids {
        if state.extern_pids.contains(pid as i32) {
            continue;
        }
        if parent_pid(pid as i32) == Some(1) {
            register(state, pid as i32);
        }
    }
}

/// Read `ppid` from `/proc/<pid>/stat`. Returns `None` if the pid is gone
/// or `/proc` is unavailable (e.g. non-Linux test environments).
fn parent_pid(pid: i32) -> Option<i32> {
    let text = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Fields after the `(comm)` parenthesized field are space-separated;
    // `comm` may itself contain spaces/parens, so split on the last `)`.
    let after_comm = text.rsplit_once(')')?.1;
    after_comm.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use stepd_collab::LocalCollab;

    fn extern_state() -> Arc<StepDaemonState> {
        let cfg = Config::from_toml(&format!(
            r#"
            job_id = 1
            step_id = {}
            node_name = "node_A"
            node_id = 0
            owner_uid = 1000
            service_uid = 0
            "#,
            stepd_core::EXTERN
        ))
        .unwrap();
        Arc::new(StepDaemonState::new(cfg, Arc::new(LocalCollab::new())))
    }

    #[test]
    fn rejects_non_extern_step() {
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
        let state = Arc::new(StepDaemonState::new(cfg, Arc::new(LocalCollab::new())));
        assert_eq!(handle(&state, 123), -1);
    }

    #[test]
    fn registers_pid_on_extern_step() {
        let state = extern_state();
        assert_eq!(handle(&state, std::process::id() as i32), 0);
        assert!(state.extern_pids.contains(std::process::id() as i32));
    }
}
