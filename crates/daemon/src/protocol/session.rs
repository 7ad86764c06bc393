// SPDX-License-Identifier: MIT

//! Per-connection session loop (spec.md §4.1, §4.3).

use std::os::unix::net::UnixStream;
use std::sync::Arc;

use stepd_wire::{
    read_client_version, read_u32, write_server_version, Opcode, ProtocolError, Request,
    MIN_VERSION, PROTOCOL_VERSION,
};
use tracing::{debug, warn};

use crate::peercred::{peer_credentials, PeerCredError};
use crate::protocol::dispatch;
use crate::state::StepDaemonState;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    PeerCred(#[from] PeerCredError),
}

pub fn handle_connection(mut stream: UnixStream, state: &Arc<StepDaemonState>) -> Result<(), SessionError> {
    let creds = match peer_credentials(&stream) {
        Ok(c) => c,
        Err(e) => {
            // spec.md §4.3: reject with a negative status if the uid
            // cannot be obtained.
            let _ = write_server_version(&mut stream, -1);
            return Err(e.into());
        }
    };

    let client_version = read_client_version(&mut stream)?;
    if client_version < MIN_VERSION {
        write_server_version(&mut stream, -1)?;
        return Ok(());
    }
    write_server_version(&mut stream, PROTOCOL_VERSION as i32)?;
    debug!(uid = creds.uid, pid = creds.pid, version = client_version, "session established");

    loop {
        let op_word = match read_u32(&mut stream) {
            Ok(w) => w,
            Err(ProtocolError::Transport(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let opcode = match Opcode::from_wire(op_word) {
            Ok(op) => op,
            // spec.md §9: defunct/unrecognized opcodes end the session.
            Err(_unknown) => break,
        };
        let request = Request::read_payload(opcode, &mut stream)?;
        if let Err(e) = dispatch::dispatch(state, creds.uid, creds.pid, opcode, request, &mut stream) {
            warn!(?opcode, error = %e, "handler failed");
            return Err(e.into());
        }
    }
    Ok(())
}
