// SPDX-License-Identifier: MIT

//! Version handshake (spec.md §4.3 "Connect", §6 "Handshake").
//!
//! ```text
//! C -> S:  u32  protocol_version
//! S -> C:  i32  server_protocol_version   // negative means reject
//! ```

use std::io::{Read, Write};

use crate::frame::{read_i32, read_u32, write_i32, write_u32};
use crate::ProtocolError;

/// Lowest protocol version either side will accept (spec.md §4.3: "both
/// sides must keep this >= a declared minimum").
pub const MIN_VERSION: u32 = 1;
/// This implementation's own protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

pub fn write_client_version(w: &mut impl Write, version: u32) -> Result<(), ProtocolError> {
    write_u32(w, version)
}

pub fn read_client_version(r: &mut impl Read) -> Result<u32, ProtocolError> {
    read_u32(r)
}

/// Server's reply: a negative value rejects the connection.
pub fn write_server_version(w: &mut impl Write, version: i32) -> Result<(), ProtocolError> {
    write_i32(w, version)
}

pub fn read_server_version(r: &mut impl Read) -> Result<i32, ProtocolError> {
    read_i32(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn client_version_roundtrip() {
        let mut buf = Vec::new();
        write_client_version(&mut buf, 3).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(read_client_version(&mut cur).unwrap(), 3);
    }

    #[test]
    fn negative_server_version_signals_rejection() {
        let mut buf = Vec::new();
        write_server_version(&mut buf, -1).unwrap();
        let mut cur = Cursor::new(buf);
        assert!(read_server_version(&mut cur).unwrap() < 0);
    }
}
