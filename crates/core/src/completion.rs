// SPDX-License-Identifier: MIT

//! Completion tree state (spec.md §3 "Completion Tree State", §4.6
//! "Completion", §4.7 "Completion Aggregator").

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

use crate::accounting::AccountingSnapshot;
use crate::identity::StepId;

/// Error returned by [`CompletionState::record`] when the local driver has
/// already given up waiting (spec.md §4.6 Completion, bullet 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("completion reported after driver gave up waiting")]
pub struct CompletionTimedOut;

struct Inner {
    bits: Vec<bool>,
    step_rc: i32,
    acct: AccountingSnapshot,
    wait_children: bool,
}

/// One step daemon's view of its subtree's completion. `rank` is this
/// daemon's position in the logical reduction tree; `subtree_len` is the
/// number of descendant ranks tracked in `bits` (bit `i` corresponds to
/// rank `rank + 1 + i`). `step` is the full `(job_id, step_id,
/// het_component)` triple this tree belongs to (spec.md §10 "Completion
/// Tree Membership"): each step daemon process owns exactly one of these,
/// scoped to its own step, so two steps that differ only in
/// `het_component` never share state even when every other field matches.
pub struct CompletionState {
    rank: i32,
    step: StepId,
    lock: Mutex<Inner>,
    cond: Condvar,
}

impl CompletionState {
    pub fn new(rank: i32, subtree_len: usize) -> Self {
        Self::for_step(StepId::new(0, 0, None), rank, subtree_len)
    }

    pub fn for_step(step: StepId, rank: i32, subtree_len: usize) -> Self {
        Self {
            rank,
            step,
            lock: Mutex::new(Inner {
                bits: vec![false; subtree_len],
                step_rc: 0,
                acct: AccountingSnapshot::default(),
                wait_children: true,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// The full step identity this completion tree is scoped to
    /// (spec.md §10 "Completion Tree Membership").
    pub fn step(&self) -> StepId {
        self.step
    }

    /// Record a `STEP_COMPLETION` report covering inclusive rank range
    /// `[first, last]`. Fails with [`CompletionTimedOut`] if the driver has
    /// already abandoned the wait (spec.md property 9).
    pub fn record(
        &self,
        first: i32,
        last: i32,
        reported_rc: i32,
        accounting: AccountingSnapshot,
    ) -> Result<(), CompletionTimedOut> {
        self.record_and(first, last, reported_rc, accounting, |r| r)
    }

    /// Same as [`Self::record`], but calls `on_result` with the outcome
    /// while the completion lock is still held, then returns whatever
    /// `on_result` returns. Lets a caller write the wire reply before the
    /// guard drops (spec.md §9 Design Notes: "write the reply while still
    /// holding the completion lock").
    pub fn record_and<R>(
        &self,
        first: i32,
        last: i32,
        reported_rc: i32,
        accounting: AccountingSnapshot,
        on_result: impl FnOnce(Result<(), CompletionTimedOut>) -> R,
    ) -> R {
        let mut guard = self.lock.lock();
        let result = if !guard.wait_children {
            Err(CompletionTimedOut)
        } else {
            let base = self.rank + 1;
            let start = (first - base).max(0) as usize;
            let end = (last - base) as usize;
            for bit in guard.bits.iter_mut().take(end + 1).skip(start) {
                *bit = true;
            }
            guard.step_rc = guard.step_rc.max(reported_rc);
            guard.acct.merge(&accounting);
            self.cond.notify_all();
            Ok(())
        };
        on_result(result)
    }

    pub fn is_complete(&self) -> bool {
        self.lock.lock().bits.iter().all(|&b| b)
    }

    pub fn step_rc(&self) -> i32 {
        self.lock.lock().step_rc
    }

    pub fn accounting(&self) -> AccountingSnapshot {
        self.lock.lock().acct
    }

    /// Fold an exited extern pid's final counters into this rank's own
    /// accounting (spec.md §4.8) before it is next snapshotted or reported.
    pub fn merge_extern_pid_exit(&self, extra: AccountingSnapshot) {
        self.lock.lock().acct.merge_extern_pid_exit(extra);
    }

    pub fn wait_children(&self) -> bool {
        self.lock.lock().wait_children
    }

    /// Block until the bitmap is fully set or `timeout` elapses. On
    /// timeout, flips `wait_children` to false so late arrivals are
    /// rejected (spec.md §4.7).
    pub fn wait_or_give_up(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        let deadline_complete = |g: &Inner| g.bits.iter().all(|&b| b);
        if deadline_complete(&guard) {
            return true;
        }
        let result = self.cond.wait_for(&mut guard, timeout);
        if deadline_complete(&guard) {
            return true;
        }
        if result.timed_out() {
            guard.wait_children = false;
        }
        false
    }

    /// Snapshot `(own_range, step_rc, accounting)` to forward to the parent
    /// rank, once `is_complete()` or the wait has been abandoned.
    pub fn snapshot(&self) -> (i32, i32, i32, AccountingSnapshot) {
        let guard = self.lock.lock();
        let first = self.rank;
        let last = self.rank + guard.bits.len() as i32;
        (first, last, guard.step_rc, guard.acct)
    }
}
