// SPDX-License-Identifier: MIT

//! Carries a process exit code alongside an error message, so `main()`
//! can map RPC failures to a shell-visible exit status instead of always
//! exiting 1.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Map a failed RPC to an [`ExitError`] whose code is the errno the
/// daemon reported (or 1 if there wasn't one).
pub fn from_client_error(e: stepd_client::ClientError) -> ExitError {
    match e {
        stepd_client::ClientError::Rpc { errno, .. } if errno > 0 => {
            ExitError::new(errno, e.to_string())
        }
        other => ExitError::new(1, other.to_string()),
    }
}
