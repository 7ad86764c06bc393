// SPDX-License-Identifier: MIT

//! Request payloads, one variant per opcode (spec.md §6).

use std::io::{Read, Write};

use crate::frame::*;
use crate::opcode::Opcode;
use crate::ProtocolError;

/// Fixed size of the credential signature carried by `ATTACH`.
pub const ATTACH_KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    State,
    Info,
    MemLimits,
    Uid,
    NodeId,
    DaemonPid,
    SignalContainer { sig: i32, flags: i32, requestor_uid: u32 },
    JobNotify { msg: String },
    StepSuspendPhase0 { core_spec: u16 },
    StepSuspendPhase1,
    StepResumePhase0 { core_spec: u16 },
    StepResumePhase1,
    StepTerminate,
    StepReconfigure,
    StepCompletion { first: i32, last: i32, step_rc: i32, accounting: Vec<u8> },
    StepStat,
    StepTaskInfo,
    StepListPids,
    PidInContainer { pid: i32 },
    AddExternPid { pid: i32 },
    X11Display,
    GetPw { mode: i32, uid: u32, name: String },
    GetGr { mode: i32, gid: u32, name: String },
    Attach { io_addr: String, resp_addr: String, key: [u8; ATTACH_KEY_LEN], uid: u32, client_version: u16 },
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::State => Opcode::State,
            Request::Info => Opcode::Info,
            Request::MemLimits => Opcode::MemLimits,
            Request::Uid => Opcode::Uid,
            Request::NodeId => Opcode::NodeId,
            Request::DaemonPid => Opcode::DaemonPid,
            Request::SignalContainer { .. } => Opcode::SignalContainer,
            Request::JobNotify { .. } => Opcode::JobNotify,
            Request::StepSuspendPhase0 { .. } | Request::StepSuspendPhase1 => Opcode::StepSuspend,
            Request::StepResumePhase0 { .. } | Request::StepResumePhase1 => Opcode::StepResume,
            Request::StepTerminate => Opcode::StepTerminate,
            Request::StepReconfigure => Opcode::StepReconfigure,
            Request::StepCompletion { .. } => Opcode::StepCompletion,
            Request::StepStat => Opcode::StepStat,
            Request::StepTaskInfo => Opcode::StepTaskInfo,
            Request::StepListPids => Opcode::StepListPids,
            Request::PidInContainer { .. } => Opcode::PidInContainer,
            Request::AddExternPid { .. } => Opcode::AddExternPid,
            Request::X11Display => Opcode::X11Display,
            Request::GetPw { .. } => Opcode::GetPw,
            Request::GetGr { .. } => Opcode::GetGr,
            Request::Attach { .. } => Opcode::Attach,
        }
    }

    /// Write the opcode followed by this request's payload.
    pub fn write(&self, w: &mut impl Write) -> Result<(), ProtocolError> {
        write_u32(w, self.opcode().wire())?;
        self.write_payload(w)
    }

    pub fn write_payload(&self, w: &mut impl Write) -> Result<(), ProtocolError> {
        match self {
            Request::State
            | Request::Info
            | Request::MemLimits
            | Request::Uid
            | Request::NodeId
            | Request::DaemonPid
            | Request::StepTerminate
            | Request::StepReconfigure
            | Request::StepStat
            | Request::StepTaskInfo
            | Request::StepListPids
            | Request::X11Display => Ok(()),
            Request::SignalContainer { sig, flags, requestor_uid } => {
                write_i32(w, *sig)?;
                write_i32(w, *flags)?;
                write_u32(w, *requestor_uid)
            }
            Request::JobNotify { msg } => write_string(w, msg),
            Request::StepSuspendPhase0 { core_spec } | Request::StepResumePhase0 { core_spec } => {
                write_u8(w, 0)?;
                write_u16(w, *core_spec)
            }
            Request::StepSuspendPhase1 | Request::StepResumePhase1 => write_u8(w, 1),
            Request::StepCompletion { first, last, step_rc, accounting } => {
                write_i32(w, *first)?;
                write_i32(w, *last)?;
                write_i32(w, *step_rc)?;
                write_blob(w, accounting)
            }
            Request::PidInContainer { pid } | Request::AddExternPid { pid } => write_i32(w, *pid),
            Request::GetPw { mode, uid, name } => {
                write_i32(w, *mode)?;
                write_u32(w, *uid)?;
                write_string(w, name)
            }
            Request::GetGr { mode, gid, name } => {
                write_i32(w, *mode)?;
                write_u32(w, *gid)?;
                write_string(w, name)
            }
            Request::Attach { io_addr, resp_addr, key, uid, client_version } => {
                write_string(w, io_addr)?;
                write_string(w, resp_addr)?;
                write_exact(w, key)?;
                write_u32(w, *uid)?;
                write_u16(w, *client_version)
            }
        }
    }

    /// Decode a request payload for the given opcode (server side, after
    /// having already read the opcode word).
    pub fn read_payload(opcode: Opcode, r: &mut impl Read) -> Result<Request, ProtocolError> {
        Ok(match opcode {
            Opcode::State => Request::State,
            Opcode::Info => Request::Info,
            Opcode::MemLimits => Request::MemLimits,
            Opcode::Uid => Request::Uid,
            Opcode::NodeId => Request::NodeId,
            Opcode::DaemonPid => Request::DaemonPid,
            Opcode::SignalContainer => Request::SignalContainer {
                sig: read_i32(r)?,
                flags: read_i32(r)?,
                requestor_uid: read_u32(r)?,
            },
            Opcode::JobNotify => Request::JobNotify { msg: read_string(r)? },
            Opcode::StepSuspend => match read_u8(r)? {
                0 => Request::StepSuspendPhase0 { core_spec: read_u16(r)? },
                1 => Request::StepSuspendPhase1,
                other => return Err(ProtocolError::Malformed(format!("bad suspend phase {other}"))),
            },
            Opcode::StepResume => match read_u8(r)? {
                0 => Request::StepResumePhase0 { core_spec: read_u16(r)? },
                1 => Request::StepResumePhase1,
                other => return Err(ProtocolError::Malformed(format!("bad resume phase {other}"))),
            },
            Opcode::StepTerminate => Request::StepTerminate,
            Opcode::StepReconfigure => Request::StepReconfigure,
            Opcode::StepCompletion => Request::StepCompletion {
                first: read_i32(r)?,
                last: read_i32(r)?,
                step_rc: read_i32(r)?,
                accounting: read_blob(r)?,
            },
            Opcode::StepStat => Request::StepStat,
            Opcode::StepTaskInfo => Request::StepTaskInfo,
            Opcode::StepListPids => Request::StepListPids,
            Opcode::PidInContainer => Request::PidInContainer { pid: read_i32(r)? },
            Opcode::AddExternPid => Request::AddExternPid { pid: read_i32(r)? },
            Opcode::X11Display => Request::X11Display,
            Opcode::GetPw => {
                let mode = read_i32(r)?;
                let uid = read_u32(r)?;
                let name = read_string(r)?;
                Request::GetPw { mode, uid, name }
            }
            Opcode::GetGr => {
                let mode = read_i32(r)?;
                let gid = read_u32(r)?;
                let name = read_string(r)?;
                Request::GetGr { mode, gid, name }
            }
            Opcode::Attach => {
                let io_addr = read_string(r)?;
                let resp_addr = read_string(r)?;
                let mut key = [0u8; ATTACH_KEY_LEN];
                read_exact(r, &mut key)?;
                let uid = read_u32(r)?;
                let client_version = read_u16(r)?;
                Request::Attach { io_addr, resp_addr, key, uid, client_version }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(req: Request) {
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        let opcode = Opcode::from_wire(read_u32(&mut cur).unwrap()).unwrap();
        assert_eq!(opcode, req.opcode());
        let decoded = Request::read_payload(opcode, &mut cur).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn simple_opcodes_roundtrip() {
        roundtrip(Request::State);
        roundtrip(Request::StepListPids);
        roundtrip(Request::X11Display);
    }

    #[test]
    fn signal_container_roundtrips() {
        roundtrip(Request::SignalContainer { sig: 15, flags: 0, requestor_uid: 1000 });
    }

    #[test]
    fn two_phase_suspend_roundtrips_both_phases() {
        roundtrip(Request::StepSuspendPhase0 { core_spec: 7 });
        roundtrip(Request::StepSuspendPhase1);
        roundtrip(Request::StepResumePhase0 { core_spec: 0 });
        roundtrip(Request::StepResumePhase1);
    }

    #[test]
    fn completion_roundtrips() {
        roundtrip(Request::StepCompletion { first: 1, last: 7, step_rc: 0, accounting: vec![1, 2, 3] });
    }

    #[test]
    fn getpw_getgr_roundtrip() {
        roundtrip(Request::GetPw { mode: 2, uid: 1000, name: "alice".into() });
        roundtrip(Request::GetGr { mode: 1, gid: 1000, name: "alice".into() });
    }

    #[test]
    fn attach_roundtrips() {
        roundtrip(Request::Attach {
            io_addr: "127.0.0.1:1".into(),
            resp_addr: "127.0.0.1:2".into(),
            key: [9u8; ATTACH_KEY_LEN],
            uid: 0,
            client_version: 1,
        });
    }
}
