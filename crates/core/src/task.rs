// SPDX-License-Identifier: MIT

//! Task table DTOs (spec.md §6 `STEP_TASK_INFO`, §4.6 signal handler).
//!
//! The mechanism that actually launches tasks is out of scope (spec.md
//! §1); this core only reads and writes the fields signal/lifecycle
//! handlers need: whether a task has exited/aborted, and whether its
//! eventual exit status should be treated as "killed by command" rather
//! than a real failure.

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub local_id: i32,
    pub global_id: u32,
    pub pid: i32,
    /// argv[0] of the task's executable, reported back by `ATTACH`
    /// (spec.md §4.6 "Attach") so a reconnecting `srun` can label each
    /// task's output.
    pub exe_name: String,
    pub exited: bool,
    pub aborted: bool,
    pub exit_status: i32,
    /// Set by the signal handler before delivering a non-debug signal, so
    /// the reaper drops the task's eventual exit status instead of
    /// treating it as a real failure (spec.md §4.6 "Signal container").
    pub killed_by_cmd: bool,
}

impl TaskRecord {
    pub fn new(local_id: i32, global_id: u32, pid: i32, exe_name: impl Into<String>) -> Self {
        Self {
            local_id,
            global_id,
            pid,
            exe_name: exe_name.into(),
            exited: false,
            aborted: false,
            exit_status: 0,
            killed_by_cmd: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.exited || self.aborted
    }
}

/// In-process task registry, owned exclusively by the step daemon
/// (spec.md §3 "Ownership").
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: Mutex<Vec<TaskRecord>>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: TaskRecord) {
        self.tasks.lock().push(task);
    }

    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.tasks.lock().clone()
    }

    pub fn pids(&self) -> Vec<i32> {
        self.tasks.lock().iter().map(|t| t.pid).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark every unfinished task `killed_by_cmd` (spec.md §4.6 Signal
    /// container and Terminate).
    pub fn mark_all_killed_by_cmd(&self) {
        for task in self.tasks.lock().iter_mut() {
            if !task.is_finished() {
                task.killed_by_cmd = true;
            }
        }
    }

    pub fn count_live(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_all_killed_by_cmd_skips_finished_tasks() {
        let table = TaskTable::new();
        let mut finished = TaskRecord::new(0, 0, 100, "a.out");
        finished.exited = true;
        table.register(finished);
        table.register(TaskRecord::new(1, 1, 200, "a.out"));

        table.mark_all_killed_by_cmd();
        let snap = table.snapshot();
        assert!(!snap[0].killed_by_cmd);
        assert!(snap[1].killed_by_cmd);
    }

    #[test]
    fn count_live_excludes_finished() {
        let table = TaskTable::new();
        table.register(TaskRecord::new(0, 0, 100, "a.out"));
        let mut exited = TaskRecord::new(1, 1, 200, "a.out");
        exited.exited = true;
        table.register(exited);
        assert_eq!(table.count_live(), 1);
    }
}
