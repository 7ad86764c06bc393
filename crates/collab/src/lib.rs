// SPDX-License-Identifier: MIT

//! Trait seams for the external collaborators spec.md §3 says the core
//! only ever reads or mutates through published operations: the
//! process-tracking container, the accounting poller, the
//! switch/interconnect layer's suspend hooks, the profiling layer, and
//! the per-step watchdog (spec.md §4.4, §4.6, §12 "external
//! collaborators"). The core crate never signals a pid or reads `/proc`
//! directly — it calls through one of these traits.
//!
//! [`LocalCollab`] is the default in-process implementation used by the
//! daemon binary and by tests: a real `kill(2)`-based container plus
//! no-op hooks for the collaborators this implementation does not model
//! (interconnect, profiling, watchdog).

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::collections::HashMap;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use stepd_core::AccountingSnapshot;

/// Opaque handle to a step's process-tracking container (spec.md
/// GLOSSARY "Container"). This crate's only concrete container is keyed
/// by the step's own identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("no such container")]
    NoSuchContainer,
    #[error("signal delivery failed: {0}")]
    Signal(#[from] Errno),
}

/// The kernel-level grouping that owns every process belonging to a step
/// on this node (spec.md §4.2 "Signal container", §4.6 "extern pid").
pub trait ContainerBackend: Send + Sync {
    fn exists(&self, container: ContainerId) -> bool;
    fn pids(&self, container: ContainerId) -> Result<Vec<u32>, CollabError>;
    fn add_pid(&self, container: ContainerId, pid: u32) -> Result<(), CollabError>;
    /// Deliver `sig` to every process in the container. Per spec.md §4.2,
    /// a missing container is only tolerated for `SIGKILL`.
    fn signal(&self, container: ContainerId, sig: i32) -> Result<(), CollabError>;
}

/// Pauses/resumes background accounting collection and hands back a
/// point-in-time snapshot (spec.md §4.3 "on suspend: notify the
/// accounting poller to pause").
pub trait AccountingPoller: Send + Sync {
    fn pause(&self, container: ContainerId);
    fn resume(&self, container: ContainerId);
    fn snapshot(&self, container: ContainerId) -> AccountingSnapshot;
}

/// The switch/interconnect layer's suspend/resume lifecycle hooks
/// (spec.md §4.3: "inform the switch/interconnect layer's pre-suspend
/// hook" / "call the post-suspend hook").
pub trait InterconnectHooks: Send + Sync {
    fn pre_suspend(&self, container: ContainerId);
    fn post_suspend(&self, container: ContainerId);
    fn pre_resume(&self, container: ContainerId);
    fn post_resume(&self, container: ContainerId);
}

/// Per-task profiling notifications (spec.md §4.6: "notify the profiling
/// layer that this task ended").
pub trait ProfilingHook: Send + Sync {
    fn task_started(&self, container: ContainerId, pid: u32);
    fn task_ended(&self, container: ContainerId, pid: u32);
}

/// A per-step watchdog armed while waiting for a step to exit, taking
/// more drastic action if it doesn't (spec.md §4.3 "start a per-step
/// watchdog that will take more drastic action if the step does not
/// exit in time").
pub trait Watchdog: Send + Sync {
    fn arm(&self, container: ContainerId, timeout: std::time::Duration);
    fn disarm(&self, container: ContainerId);
}

/// All five collaborator seams bundled for convenient injection into the
/// daemon (spec.md §3: "call out to external collaborators").
pub trait Collaborators: Send + Sync {
    fn container(&self) -> &dyn ContainerBackend;
    fn accounting(&self) -> &dyn AccountingPoller;
    fn interconnect(&self) -> &dyn InterconnectHooks;
    fn profiling(&self) -> &dyn ProfilingHook;
    fn watchdog(&self) -> &dyn Watchdog;
}

#[derive(Default)]
struct ContainerTable {
    pids: HashMap<ContainerId, Vec<u32>>,
}

/// Real `kill(2)`-backed container plus no-op hooks for the
/// collaborators this implementation does not model. Good enough to run
/// a real daemon on a single node and to drive tests without mocking
/// every seam.
#[derive(Default)]
pub struct LocalCollab {
    table: Mutex<ContainerTable>,
}

impl LocalCollab {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerBackend for LocalCollab {
    fn exists(&self, container: ContainerId) -> bool {
        self.table.lock().pids.contains_key(&container)
    }

    fn pids(&self, container: ContainerId) -> Result<Vec<u32>, CollabError> {
        self.table
            .lock()
            .pids
            .get(&container)
            .cloned()
            .ok_or(CollabError::NoSuchContainer)
    }

    fn add_pid(&self, container: ContainerId, pid: u32) -> Result<(), CollabError> {
        self.table.lock().pids.entry(container).or_default().push(pid);
        Ok(())
    }

    fn signal(&self, container: ContainerId, sig: i32) -> Result<(), CollabError> {
        let pids = match self.table.lock().pids.get(&container).cloned() {
            Some(p) => p,
            None if sig == Signal::SIGKILL as i32 => return Ok(()),
            None => return Err(CollabError::NoSuchContainer),
        };
        let signal = Signal::try_from(sig).map_err(CollabError::Signal)?;
        for pid in pids {
            match signal::kill(Pid::from_raw(pid as i32), signal) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl AccountingPoller for LocalCollab {
    fn pause(&self, _container: ContainerId) {}
    fn resume(&self, _container: ContainerId) {}
    fn snapshot(&self, _container: ContainerId) -> AccountingSnapshot {
        AccountingSnapshot::default()
    }
}

impl InterconnectHooks for LocalCollab {
    fn pre_suspend(&self, _container: ContainerId) {}
    fn post_suspend(&self, _container: ContainerId) {}
    fn pre_resume(&self, _container: ContainerId) {}
    fn post_resume(&self, _container: ContainerId) {}
}

impl ProfilingHook for LocalCollab {
    fn task_started(&self, _container: ContainerId, _pid: u32) {}
    fn task_ended(&self, _container: ContainerId, _pid: u32) {}
}

impl Watchdog for LocalCollab {
    fn arm(&self, container: ContainerId, timeout: std::time::Duration) {
        tracing::debug!(?container, ?timeout, "watchdog armed (no-op backend)");
    }
    fn disarm(&self, container: ContainerId) {
        tracing::debug!(?container, "watchdog disarmed (no-op backend)");
    }
}

impl Collaborators for LocalCollab {
    fn container(&self) -> &dyn ContainerBackend {
        self
    }
    fn accounting(&self) -> &dyn AccountingPoller {
        self
    }
    fn interconnect(&self) -> &dyn InterconnectHooks {
        self
    }
    fn profiling(&self) -> &dyn ProfilingHook {
        self
    }
    fn watchdog(&self) -> &dyn Watchdog {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_on_missing_container_is_only_tolerated_for_sigkill() {
        let c = LocalCollab::new();
        let cid = ContainerId(1);
        assert!(c.signal(cid, Signal::SIGKILL as i32).is_ok());
        assert!(c.signal(cid, Signal::SIGTERM as i32).is_err());
    }

    #[test]
    fn add_pid_then_list_and_signal() {
        let c = LocalCollab::new();
        let cid = ContainerId(2);
        c.add_pid(cid, std::process::id()).unwrap();
        assert_eq!(c.pids(cid).unwrap(), vec![std::process::id()]);
        // Signal 0 never actually delivers, just probes liveness.
        c.signal(cid, 0).unwrap();
    }

    #[test]
    fn esrch_during_signal_is_swallowed() {
        let c = LocalCollab::new();
        let cid = ContainerId(3);
        // A pid vanishingly unlikely to exist.
        c.add_pid(cid, 999_999).unwrap();
        assert!(c.signal(cid, Signal::SIGTERM as i32).is_ok());
    }
}
