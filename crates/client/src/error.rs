// SPDX-License-Identifier: MIT

//! Error taxonomy a caller of [`crate::session::ClientSession`] observes
//! (spec.md §4.3 "Connect", §7).

use stepd_wire::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Socket connect/read/write failed. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// Malformed reply or an opcode the server didn't recognize.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The server rejected our handshake version (spec.md §4.3).
    #[error("server rejected protocol version, replied {0}")]
    VersionRejected(i32),
    /// A handler replied `(rc, errno)` with `rc < 0`.
    #[error("rpc failed: rc={rc} errno={errno}")]
    Rpc { rc: i32, errno: i32 },
    /// `connect()` found no socket at the expected path.
    #[error("no such step socket")]
    NotFound,
}

impl ClientError {
    /// Turn a wire `(rc, errno)` pair into `Ok(())` or
    /// [`ClientError::Rpc`] (spec.md §6: `rc < 0` is the failure case
    /// for every `(rc, errno)`-shaped reply).
    pub fn from_rc_errno(v: stepd_core::RcErrno) -> Result<(), Self> {
        if v.is_ok() {
            Ok(())
        } else {
            Err(ClientError::Rpc { rc: v.rc, errno: v.errno })
        }
    }
}
