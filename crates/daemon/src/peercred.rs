// SPDX-License-Identifier: MIT

//! Peer-credential handshake (spec.md §4.3 "Peer-credential handshake"):
//! learn the connected client's uid/pid from the kernel rather than
//! trusting anything the client claims on the wire.

use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;

use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCreds {
    pub uid: u32,
    pub pid: i32,
}

#[derive(Debug, thiserror::Error)]
#[error("could not obtain peer credentials: {0}")]
pub struct PeerCredError(#[from] nix::Error);

/// Query the kernel for the connected peer's uid/pid (spec.md §4.3: "If
/// the uid cannot be obtained, reject with a negative status and close").
pub fn peer_credentials(stream: &UnixStream) -> Result<PeerCreds, PeerCredError> {
    let creds = getsockopt(&stream.as_fd(), PeerCredentials)?;
    Ok(PeerCreds { uid: creds.uid(), pid: creds.pid() })
}
