// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stepd-core: step identity, lifecycle state machine, and the error
//! taxonomy shared between the client and server halves of the step
//! daemon protocol. Carries no I/O and no knowledge of the wire format.

pub mod macros;

pub mod accounting;
pub mod attach;
pub mod completion;
pub mod error;
pub mod extern_pid;
pub mod identity;
pub mod lifecycle;
pub mod passwd;
pub mod signal;
pub mod suspend;
pub mod task;
pub mod x11;

pub use accounting::AccountingSnapshot;
pub use attach::{AttachClient, AttachRegistry, ATTACH_KEY_LEN};
pub use completion::{CompletionState, CompletionTimedOut};
pub use error::{RcErrno, StepErrno, StepError};
pub use extern_pid::{ExternPid, ExternPidRegistry};
pub use identity::{StepId, BATCH_SCRIPT, EXTERN};
pub use lifecycle::{LifecycleState, StepLifecycle};
pub use passwd::{CachedUserRecord, GroupRecord, MatchMode, PasswdRecord};
pub use suspend::{SuspendState, ToggleOutcome};
pub use task::{TaskRecord, TaskTable};
pub use x11::X11Forward;
