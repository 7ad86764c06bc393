// SPDX-License-Identifier: MIT

//! Binary framing and message catalogue for the step-daemon protocol
//! (spec.md §4 "Wire protocol", §6 "Message catalogue"). Fixed-width
//! fields are native-endian; variable-length fields are a `u32` length
//! prefix followed by raw bytes. No JSON anywhere on this wire.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod error;
mod frame;
mod handshake;
mod opcode;
mod request;
mod response;

pub use error::ProtocolError;
pub use frame::{MAX_BLOB_LEN, read_blob, read_string, read_u32, write_blob, write_string, write_u32};
pub use handshake::{
    MIN_VERSION, PROTOCOL_VERSION, read_client_version, read_server_version, write_client_version,
    write_server_version,
};
pub use opcode::Opcode;
pub use request::{Request, ATTACH_KEY_LEN};
pub use response::{
    AttachOk, GroupReplyEntry, InfoReply, PasswdReply, TaskInfoEntry, add_extern_pid, attach,
    daemon_pid, getgr, getpw, info, job_notify, list_pids, mem_limits, node_id, pid_in_container,
    rc_errno, state, step_stat, task_info, uid, x11_display,
};
