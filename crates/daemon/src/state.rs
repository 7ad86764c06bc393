// SPDX-License-Identifier: MIT

//! Per-step daemon state (spec.md §3): the lifecycle scalar, suspend
//! flag, completion tree, extern-pid registry, and task table, plus the
//! configuration and collaborator handles every handler needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use stepd_collab::{Collaborators, ContainerId};
use stepd_core::{
    AttachRegistry, CachedUserRecord, CompletionState, ExternPidRegistry, LifecycleState, StepId,
    SuspendState, TaskTable, X11Forward,
};

use crate::config::Config;
use crate::handlers::suspend_resume::PendingToggle;
use crate::logging::LogHandle;

pub struct StepDaemonState {
    pub config: Config,
    pub step_id: StepId,
    pub container: ContainerId,
    pub lifecycle: LifecycleState,
    pub suspend: SuspendState,
    pub completion: CompletionState,
    pub extern_pids: ExternPidRegistry,
    pub tasks: TaskTable,
    /// srun clients that have reconnected via `ATTACH` (spec.md §4.6).
    pub attach_clients: AttachRegistry,
    pub user: Mutex<Option<CachedUserRecord>>,
    pub x11: Mutex<Option<X11Forward>>,
    pub collaborators: Arc<dyn Collaborators>,
    pub daemon_pid: i32,
    /// Set once `SIGNAL_CONTAINER(ABORT)` has been handled (spec.md §4.6
    /// "mark the step aborted"); read back only for logging/diagnostics.
    pub aborted: AtomicBool,
    /// One-shot latch: true once this daemon has logged a
    /// cancellation-reason message (spec.md §4.6 bullet 3 "only once").
    pub msg_sent: AtomicBool,
    pub suspend_toggle: PendingToggle,
    pub resume_toggle: PendingToggle,
    pub log: LogHandle,
}

impl StepDaemonState {
    pub fn new(config: Config, collaborators: Arc<dyn Collaborators>) -> Self {
        let step_id = StepId::new(config.job_id, config.step_id, config.het_component);
        let container = ContainerId(((config.job_id as u64) << 32) | config.step_id as u64);
        let completion = CompletionState::for_step(step_id, config.rank, config.subtree_len);
        let log = LogHandle::detached(config.log_dir.clone());
        Self {
            config,
            step_id,
            container,
            lifecycle: LifecycleState::new(),
            suspend: SuspendState::new(),
            completion,
            extern_pids: ExternPidRegistry::new(),
            tasks: TaskTable::new(),
            attach_clients: AttachRegistry::new(),
            user: Mutex::new(None),
            x11: Mutex::new(None),
            collaborators,
            daemon_pid: std::process::id() as i32,
            aborted: AtomicBool::new(false),
            msg_sent: AtomicBool::new(false),
            suspend_toggle: PendingToggle::new(),
            resume_toggle: PendingToggle::new(),
            log,
        }
    }

    /// Swap in the process-wide [`LogHandle`] returned by `logging::init`
    /// (the daemon binary's constructor otherwise gets a detached one, see
    /// [`LogHandle::detached`]).
    pub fn with_log(mut self, log: LogHandle) -> Self {
        self.log = log;
        self
    }

    pub fn mark_aborted(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// True if `uid` is the step owner or the authorized service user
    /// (spec.md §4.5 bullet 2/3).
    pub fn is_owner_or_service(&self, uid: u32) -> bool {
        uid == self.config.owner_uid || uid == self.config.service_uid
    }

    pub fn is_service(&self, uid: u32) -> bool {
        uid == self.config.service_uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepd_collab::LocalCollab;

    fn config() -> Config {
        Config::from_toml(
            r#"
            job_id = 42
            step_id = 0
            node_name = "node_A"
            node_id = 3
            owner_uid = 1000
            service_uid = 0
            "#,
        )
        .unwrap()
    }

    #[test]
    fn owner_and_service_are_both_authorized() {
        let state = StepDaemonState::new(config(), Arc::new(LocalCollab::new()));
        assert!(state.is_owner_or_service(1000));
        assert!(state.is_owner_or_service(0));
        assert!(!state.is_owner_or_service(1234));
    }
}
