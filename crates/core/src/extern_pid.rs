// SPDX-License-Identifier: MIT

//! Extern-PID tracker bookkeeping (spec.md §3 "Extern-PID Tracker", §4.8).
//!
//! Only valid on the `EXTERN` pseudo-step. The watcher threads themselves
//! live in `stepd-daemon` (they need the collaborator traits); this module
//! holds the registry they read and write.

use parking_lot::Mutex;

/// A process adopted by the `EXTERN` pseudo-step rather than spawned by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternPid {
    pub pid: i32,
    pub accounting_id: u32,
}

#[derive(Debug, Default)]
pub struct ExternPidRegistry {
    pids: Mutex<Vec<ExternPid>>,
}

impl ExternPidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `pid` was already registered (the caller should
    /// still proceed with re-registration of the container/accounting
    /// steps; this just reports membership for tests and logging).
    pub fn add(&self, entry: ExternPid) -> bool {
        let mut guard = self.pids.lock();
        if guard.iter().any(|e| e.pid == entry.pid) {
            return false;
        }
        guard.push(entry);
        true
    }

    pub fn remove(&self, pid: i32) -> Option<ExternPid> {
        let mut guard = self.pids.lock();
        let idx = guard.iter().position(|e| e.pid == pid)?;
        Some(guard.remove(idx))
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.pids.lock().iter().any(|e| e.pid == pid)
    }

    pub fn pids(&self) -> Vec<i32> {
        self.pids.lock().iter().map(|e| e.pid).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_roundtrip() {
        let reg = ExternPidRegistry::new();
        assert!(reg.add(ExternPid { pid: 111, accounting_id: 0 }));
        assert!(!reg.add(ExternPid { pid: 111, accounting_id: 0 }));
        assert!(reg.contains(111));
        assert_eq!(reg.remove(111), Some(ExternPid { pid: 111, accounting_id: 0 }));
        assert!(!reg.contains(111));
    }
}
