// SPDX-License-Identifier: MIT

//! `STEP_COMPLETION` (spec.md §4.6 "Completion", §4.7 "Completion
//! Aggregator"). The receiving half lives here; the driver half (waiting
//! on the local bitmap and forwarding to the parent rank) is
//! `forward_to_parent` below, called by whatever owns this step's local
//! wait loop once its own subtree completes.

use std::io::Write;

use stepd_core::{AccountingSnapshot, RcErrno, StepErrno};
use stepd_wire::{rc_errno, ProtocolError};

use crate::state::StepDaemonState;

/// Records the report and writes the `(rc, errno)` reply before the
/// completion lock releases (spec.md §9 Design Notes: "Preserve this
/// ordering" — a late-arriving report must not be able to observe a reply
/// written against a bitmap state it hasn't been folded into yet).
pub fn handle(
    state: &StepDaemonState,
    first: i32,
    last: i32,
    step_rc: i32,
    accounting: &[u8],
    stream: &mut (impl Write + Send),
) -> Result<(), ProtocolError> {
    let acct = AccountingSnapshot::from_bytes(accounting);
    state.completion.record_and(first, last, step_rc, acct, |result| {
        let rc = match result {
            Ok(()) => RcErrno::OK,
            Err(_timed_out) => RcErrno::from_step_errno(StepErrno::TimedOut),
        };
        rc_errno::write(stream, rc)
    })
}

/// Block for this daemon's own subtree to complete (or give up), then
/// return the snapshot to forward up the tree via `STEP_COMPLETION` on
/// the parent rank's socket (spec.md §4.7). Returns `None` if this daemon
/// is the tree root (rank 0 with no parent to report to).
pub fn wait_and_snapshot(
    state: &StepDaemonState,
    timeout: std::time::Duration,
) -> Option<(i32, i32, i32, AccountingSnapshot)> {
    if state.completion.rank() == 0 {
        state.completion.wait_or_give_up(timeout);
        return None;
    }
    state.completion.wait_or_give_up(timeout);
    Some(state.completion.snapshot())
}
