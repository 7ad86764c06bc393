// SPDX-License-Identifier: MIT

//! Error taxonomy (spec.md §7).
//!
//! Business errors are never exceptions on the wire: handlers serialize
//! them into an `(rc, errno)` reply. [`StepErrno`] gives the small set of
//! such business errnos stable, documented values; standard OS errno
//! values (`EPERM`, `ESRCH`, …) are passed through as their usual libc
//! numbers so CLI/tooling built against this protocol can match on the
//! number either way.

use std::fmt;

/// Standard libc errno values this protocol echoes verbatim (spec.md §7,
/// §6 "GETPW"/signal handling "ESRCH is benign").
pub mod libc_errno {
    pub const EPERM: i32 = 1;
    pub const ESRCH: i32 = 3;
    pub const ETIMEDOUT: i32 = 110;
}

/// Protocol-specific business errnos, used where no standard errno fits.
/// Chosen well above the libc errno range (< 200 on Linux) to avoid
/// collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrno {
    /// `SUSPEND`/`SIGNAL_CONTAINER` (non-KILL) while already suspended.
    StepSuspended,
    /// `RESUME` while not suspended.
    StepNotSuspended,
    /// A handler requiring `>= Running` timed out waiting.
    NotRunning,
    /// Completion reported after the driver gave up (spec.md property 9).
    TimedOut,
    /// Scan/connect found no such step socket.
    NotFound,
}

impl StepErrno {
    pub const fn code(self) -> i32 {
        match self {
            StepErrno::StepSuspended => 1000,
            StepErrno::StepNotSuspended => 1001,
            StepErrno::NotRunning => 1002,
            StepErrno::TimedOut => libc_errno::ETIMEDOUT,
            StepErrno::NotFound => 1003,
        }
    }
}

impl fmt::Display for StepErrno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepErrno::StepSuspended => "step is suspended",
            StepErrno::StepNotSuspended => "step is not suspended",
            StepErrno::NotRunning => "job/step is not running",
            StepErrno::TimedOut => "timed out",
            StepErrno::NotFound => "no such step",
        };
        f.write_str(s)
    }
}

/// A framed `(rc, errno)` reply pair, shared by every handler that returns
/// this shape on the wire (`SIGNAL_CONTAINER`, `STEP_SUSPEND`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcErrno {
    pub rc: i32,
    pub errno: i32,
}

impl RcErrno {
    pub const OK: RcErrno = RcErrno { rc: 0, errno: 0 };

    pub fn err(errno: i32) -> Self {
        Self { rc: -1, errno }
    }

    pub fn from_step_errno(e: StepErrno) -> Self {
        Self::err(e.code())
    }

    pub fn is_ok(&self) -> bool {
        self.rc == 0
    }
}

/// Top-level error taxonomy a caller of `stepd-core` observes directly
/// (as opposed to `(rc, errno)` wire replies, which stay inside the
/// protocol). Transport/Protocol kinds are fatal to a connection; the
/// rest are recoverable business errors a handler reports verbatim.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("authorization denied")]
    Authorization,
    #[error("{0}")]
    State(StepErrno),
    #[error("no such step on this node")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_errno_ok_has_zero_fields() {
        assert!(RcErrno::OK.is_ok());
        assert_eq!(RcErrno::OK.rc, 0);
        assert_eq!(RcErrno::OK.errno, 0);
    }

    #[test]
    fn err_sets_rc_negative_one() {
        let e = RcErrno::from_step_errno(StepErrno::StepSuspended);
        assert_eq!(e.rc, -1);
        assert_eq!(e.errno, StepErrno::StepSuspended.code());
    }
}
