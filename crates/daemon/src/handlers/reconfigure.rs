// SPDX-License-Identifier: MIT

//! `STEP_RECONFIGURE` (spec.md §4.6 "Reconfigure"): re-open the log file
//! to cope with external log rotation. Authorized service user only.

use stepd_core::RcErrno;

use crate::state::StepDaemonState;

pub fn handle(state: &StepDaemonState) -> RcErrno {
    match state.log.reopen() {
        Ok(()) => RcErrno::OK,
        Err(e) => {
            tracing::warn!(error = %e, "log reopen failed");
            RcErrno::err(nix::errno::Errno::EIO as i32)
        }
    }
}
