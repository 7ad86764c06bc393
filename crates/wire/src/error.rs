// SPDX-License-Identifier: MIT

//! Wire-level error taxonomy (spec.md §7: Transport vs Protocol errors).

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Socket I/O failed. Always fatal to the current connection.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// Malformed opcode, payload, or (during handshake) an unacceptable
    /// protocol version.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// Opcode is numerically valid but reserved/defunct (spec.md §9).
    #[error("unrecognized opcode {0}")]
    UnknownOpcode(u32),
    /// The peer's handshake version is below `MIN_VERSION`.
    #[error("peer protocol version {0} below minimum {1}")]
    VersionRejected(i32, i32),
}

impl ProtocolError {
    /// True for errors that must close the connection (spec.md §7:
    /// "Only transport errors close the fd" — protocol errors during the
    /// handshake or opcode decode are likewise always fatal to the
    /// connection, never to the daemon).
    pub fn is_fatal_to_connection(&self) -> bool {
        true
    }
}
