// SPDX-License-Identifier: MIT

//! Reply payloads (spec.md §6). Unlike requests, a reply carries no
//! opcode of its own — the client already knows what it asked for.
//! `STEP_SUSPEND`/`STEP_RESUME` phase 0 has no reply at all: the client
//! simply does not read anything after writing the phase-0 payload.

use std::io::{Read, Write};

use stepd_core::RcErrno;

use crate::frame::*;
use crate::ProtocolError;

fn write_rc_errno(w: &mut impl Write, v: RcErrno) -> Result<(), ProtocolError> {
    write_i32(w, v.rc)?;
    write_i32(w, v.errno)
}

fn read_rc_errno(r: &mut impl Read) -> Result<RcErrno, ProtocolError> {
    Ok(RcErrno { rc: read_i32(r)?, errno: read_i32(r)? })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoReply {
    pub uid: u32,
    pub job_id: u32,
    pub step_id: u32,
    pub protocol_version: i32,
    pub node_id: u32,
    pub job_mem: u64,
    pub step_mem: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfoEntry {
    pub local_id: i32,
    pub global_id: u32,
    pub pid: i32,
    pub exited: bool,
    pub exit_status: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdReply {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub dir: String,
    pub shell: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReplyEntry {
    pub name: String,
    pub gid: u32,
    pub owner_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOk {
    pub pids: Vec<u32>,
    pub gtids: Vec<u32>,
    pub exe_names: Vec<String>,
}

fn write_passwd_field(w: &mut impl Write, p: &PasswdReply) -> Result<(), ProtocolError> {
    write_string(w, &p.name)?;
    write_string(w, "x")?;
    write_u32(w, p.uid)?;
    write_u32(w, p.gid)?;
    write_string(w, &p.gecos)?;
    write_string(w, &p.dir)?;
    write_string(w, &p.shell)
}

fn read_passwd_field(r: &mut impl Read) -> Result<PasswdReply, ProtocolError> {
    let name = read_string(r)?;
    let _placeholder = read_string(r)?; // always "x"
    let uid = read_u32(r)?;
    let gid = read_u32(r)?;
    let gecos = read_string(r)?;
    let dir = read_string(r)?;
    let shell = read_string(r)?;
    Ok(PasswdReply { name, uid, gid, gecos, dir, shell })
}

pub mod state {
    use super::*;
    pub fn write(w: &mut impl Write, state: u32) -> Result<(), ProtocolError> {
        write_u32(w, state)
    }
    pub fn read(r: &mut impl Read) -> Result<u32, ProtocolError> {
        read_u32(r)
    }
}

pub mod uid {
    use super::*;
    pub fn write(w: &mut impl Write, uid: u32) -> Result<(), ProtocolError> {
        write_u32(w, uid)
    }
    pub fn read(r: &mut impl Read) -> Result<u32, ProtocolError> {
        read_u32(r)
    }
}

pub mod node_id {
    use super::*;
    pub fn write(w: &mut impl Write, node_id: u32) -> Result<(), ProtocolError> {
        write_u32(w, node_id)
    }
    pub fn read(r: &mut impl Read) -> Result<u32, ProtocolError> {
        read_u32(r)
    }
}

pub mod daemon_pid {
    use super::*;
    pub fn write(w: &mut impl Write, pid: i32) -> Result<(), ProtocolError> {
        write_i32(w, pid)
    }
    pub fn read(r: &mut impl Read) -> Result<i32, ProtocolError> {
        read_i32(r)
    }
}

/// `JOB_NOTIFY`'s reply is a bare `i32 rc`, unlike every other fallible
/// handler's `(rc, errno)` pair (spec.md §6).
pub mod job_notify {
    use super::*;
    pub fn write(w: &mut impl Write, rc: i32) -> Result<(), ProtocolError> {
        write_i32(w, rc)
    }
    pub fn read(r: &mut impl Read) -> Result<i32, ProtocolError> {
        read_i32(r)
    }
}

pub mod info {
    use super::*;
    pub fn write(w: &mut impl Write, v: &InfoReply) -> Result<(), ProtocolError> {
        write_u32(w, v.uid)?;
        write_u32(w, v.job_id)?;
        write_u32(w, v.step_id)?;
        write_i32(w, v.protocol_version)?;
        write_u32(w, v.node_id)?;
        write_u64(w, v.job_mem)?;
        write_u64(w, v.step_mem)
    }
    pub fn read(r: &mut impl Read) -> Result<InfoReply, ProtocolError> {
        Ok(InfoReply {
            uid: read_u32(r)?,
            job_id: read_u32(r)?,
            step_id: read_u32(r)?,
            protocol_version: read_i32(r)?,
            node_id: read_u32(r)?,
            job_mem: read_u64(r)?,
            step_mem: read_u64(r)?,
        })
    }
}

pub mod mem_limits {
    use super::*;
    pub fn write(w: &mut impl Write, job_mem: u64, step_mem: u64) -> Result<(), ProtocolError> {
        write_u64(w, job_mem)?;
        write_u64(w, step_mem)
    }
    pub fn read(r: &mut impl Read) -> Result<(u64, u64), ProtocolError> {
        Ok((read_u64(r)?, read_u64(r)?))
    }
}

pub mod rc_errno {
    use super::*;
    pub fn write(w: &mut impl Write, v: RcErrno) -> Result<(), ProtocolError> {
        write_rc_errno(w, v)
    }
    pub fn read(r: &mut impl Read) -> Result<RcErrno, ProtocolError> {
        read_rc_errno(r)
    }
}

pub mod step_stat {
    use super::*;
    pub fn write(w: &mut impl Write, accounting: &[u8], num_live_tasks: i32) -> Result<(), ProtocolError> {
        write_blob(w, accounting)?;
        write_i32(w, num_live_tasks)
    }
    pub fn read(r: &mut impl Read) -> Result<(Vec<u8>, i32), ProtocolError> {
        Ok((read_blob(r)?, read_i32(r)?))
    }
}

pub mod task_info {
    use super::*;
    pub fn write(w: &mut impl Write, tasks: &[TaskInfoEntry]) -> Result<(), ProtocolError> {
        write_u32(w, tasks.len() as u32)?;
        for t in tasks {
            write_i32(w, t.local_id)?;
            write_u32(w, t.global_id)?;
            write_i32(w, t.pid)?;
            write_u8(w, t.exited as u8)?;
            write_i32(w, t.exit_status)?;
        }
        Ok(())
    }
    pub fn read(r: &mut impl Read) -> Result<Vec<TaskInfoEntry>, ProtocolError> {
        let n = read_u32(r)?;
        (0..n)
            .map(|_| {
                Ok(TaskInfoEntry {
                    local_id: read_i32(r)?,
                    global_id: read_u32(r)?,
                    pid: read_i32(r)?,
                    exited: read_u8(r)? != 0,
                    exit_status: read_i32(r)?,
                })
            })
            .collect()
    }
}

pub mod list_pids {
    use super::*;
    pub fn write(w: &mut impl Write, pids: &[u32]) -> Result<(), ProtocolError> {
        write_u32(w, pids.len() as u32)?;
        for &pid in pids {
            write_u32(w, pid)?;
        }
        Ok(())
    }
    pub fn read(r: &mut impl Read) -> Result<Vec<u32>, ProtocolError> {
        let n = read_u32(r)?;
        (0..n).map(|_| read_u32(r)).collect()
    }
}

pub mod pid_in_container {
    use super::*;
    pub fn write(w: &mut impl Write, v: bool) -> Result<(), ProtocolError> {
        write_u8(w, v as u8)
    }
    pub fn read(r: &mut impl Read) -> Result<bool, ProtocolError> {
        Ok(read_u8(r)? != 0)
    }
}

pub mod add_extern_pid {
    use super::*;
    pub fn write(w: &mut impl Write, rc: i32) -> Result<(), ProtocolError> {
        write_i32(w, rc)
    }
    pub fn read(r: &mut impl Read) -> Result<i32, ProtocolError> {
        read_i32(r)
    }
}

pub mod x11_display {
    use super::*;
    pub fn write(w: &mut impl Write, display: i32, xauthority_path: &str) -> Result<(), ProtocolError> {
        write_i32(w, display)?;
        write_string(w, xauthority_path)
    }
    pub fn read(r: &mut impl Read) -> Result<(i32, String), ProtocolError> {
        Ok((read_i32(r)?, read_string(r)?))
    }
}

pub mod getpw {
    use super::*;
    pub fn write(w: &mut impl Write, found: Option<&PasswdReply>) -> Result<(), ProtocolError> {
        match found {
            None => write_i32(w, 0),
            Some(p) => {
                write_i32(w, 1)?;
                write_passwd_field(w, p)
            }
        }
    }
    pub fn read(r: &mut impl Read) -> Result<Option<PasswdReply>, ProtocolError> {
        if read_i32(r)? == 0 {
            Ok(None)
        } else {
            Ok(Some(read_passwd_field(r)?))
        }
    }
}

pub mod getgr {
    use super::*;
    pub fn write(w: &mut impl Write, entries: &[GroupReplyEntry]) -> Result<(), ProtocolError> {
        write_i32(w, entries.len() as i32)?;
        for e in entries {
            write_string(w, &e.name)?;
            write_string(w, "x")?;
            write_u32(w, e.gid)?;
            write_string(w, &e.owner_name)?;
        }
        Ok(())
    }
    pub fn read(r: &mut impl Read) -> Result<Vec<GroupReplyEntry>, ProtocolError> {
        let n = read_i32(r)?;
        if n < 0 {
            return Err(ProtocolError::Malformed("negative group count".into()));
        }
        (0..n)
            .map(|_| {
                let name = read_string(r)?;
                let _placeholder = read_string(r)?;
                let gid = read_u32(r)?;
                let owner_name = read_string(r)?;
                Ok(GroupReplyEntry { name, gid, owner_name })
            })
            .collect()
    }
}

pub mod attach {
    use super::*;
    pub fn write(w: &mut impl Write, result: Result<&AttachOk, i32>) -> Result<(), ProtocolError> {
        match result {
            Err(rc) => write_i32(w, rc),
            Ok(ok) => {
                write_i32(w, 0)?;
                write_u32(w, ok.pids.len() as u32)?;
                for &pid in &ok.pids {
                    write_u32(w, pid)?;
                }
                for &gtid in &ok.gtids {
                    write_u32(w, gtid)?;
                }
                for name in &ok.exe_names {
                    write_string(w, name)?;
                }
                Ok(())
            }
        }
    }
    pub fn read(r: &mut impl Read) -> Result<Result<AttachOk, i32>, ProtocolError> {
        let rc = read_i32(r)?;
        if rc != 0 {
            return Ok(Err(rc));
        }
        let n = read_u32(r)?;
        let pids = (0..n).map(|_| read_u32(r)).collect::<Result<Vec<_>, _>>()?;
        let gtids = (0..n).map(|_| read_u32(r)).collect::<Result<Vec<_>, _>>()?;
        let exe_names = (0..n).map(|_| read_string(r)).collect::<Result<Vec<_>, _>>()?;
        Ok(Ok(AttachOk { pids, gtids, exe_names }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rc_errno_roundtrip() {
        let mut buf = Vec::new();
        rc_errno::write(&mut buf, RcErrno::OK).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(rc_errno::read(&mut cur).unwrap(), RcErrno::OK);
    }

    #[test]
    fn task_info_roundtrip() {
        let tasks = vec![
            TaskInfoEntry { local_id: 0, global_id: 0, pid: 111, exited: false, exit_status: 0 },
            TaskInfoEntry { local_id: 1, global_id: 1, pid: 222, exited: true, exit_status: 9 },
        ];
        let mut buf = Vec::new();
        task_info::write(&mut buf, &tasks).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(task_info::read(&mut cur).unwrap(), tasks);
    }

    /// spec.md E1.
    #[test]
    fn e1_list_pids_roundtrip() {
        let mut buf = Vec::new();
        list_pids::write(&mut buf, &[111, 222]).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(list_pids::read(&mut cur).unwrap(), vec![111, 222]);
    }

    #[test]
    fn getpw_not_found_roundtrip() {
        let mut buf = Vec::new();
        getpw::write(&mut buf, None).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(getpw::read(&mut cur).unwrap(), None);
    }

    #[test]
    fn getpw_found_carries_literal_x_placeholder() {
        let p = PasswdReply {
            name: "alice".into(),
            uid: 1000,
            gid: 1000,
            gecos: "".into(),
            dir: "/home/alice".into(),
            shell: "/bin/bash".into(),
        };
        let mut buf = Vec::new();
        getpw::write(&mut buf, Some(&p)).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(getpw::read(&mut cur).unwrap(), Some(p));
    }

    #[test]
    fn attach_failure_writes_no_task_fields() {
        let mut buf = Vec::new();
        attach::write(&mut buf, Err(-1)).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(attach::read(&mut cur).unwrap(), Err(-1));
    }

    #[test]
    fn attach_success_roundtrip() {
        let ok = AttachOk { pids: vec![1, 2], gtids: vec![0, 1], exe_names: vec!["a".into(), "b".into()] };
        let mut buf = Vec::new();
        attach::write(&mut buf, Ok(&ok)).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(attach::read(&mut cur).unwrap(), Ok(ok));
    }
}
