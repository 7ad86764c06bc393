// SPDX-License-Identifier: MIT

//! Client Session (spec.md §4.3 "Connect"): the caller side of the wire
//! protocol `stepd-wire` describes. One [`ClientSession`] wraps one
//! connected, handshaken Unix-domain socket; every opcode in spec.md §6
//! gets one typed method here.

use std::io::{BufReader, BufWriter};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use stepd_core::{MatchMode, RcErrno};
use stepd_wire::{
    add_extern_pid, attach as attach_wire, daemon_pid, getgr, getpw, info, job_notify, list_pids, mem_limits,
    node_id, pid_in_container, rc_errno, read_client_version, read_server_version, state as state_wire, step_stat,
    task_info, uid, write_client_version, x11_display, AttachOk, GroupReplyEntry, InfoReply, PasswdReply,
    ProtocolError, Request, TaskInfoEntry, ATTACH_KEY_LEN, MIN_VERSION, PROTOCOL_VERSION,
};

use crate::error::ClientError;

/// One connected, handshaken session (spec.md §4.3). Request/reply is
/// always synchronous: write a request, then block for its reply, never
/// pipelined.
pub struct ClientSession {
    reader: BufReader<UnixStream>,
    writer: BufWriter<UnixStream>,
}

impl ClientSession {
    /// Connect to the socket at `path` and perform the version handshake
    /// (spec.md §4.3). `connect()` failing with `ECONNREFUSED`/`ENOENT`
    /// surfaces as [`ClientError::NotFound`] so batch scanning can tell a
    /// dead socket from a live one that rejected the version.
    pub fn connect(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => ClientError::NotFound,
            _ => ClientError::Transport(e),
        })?;
        Self::handshake(stream)
    }

    /// Same as [`Self::connect`], but waits up to `timeout` for the step
    /// daemon to finish starting up before giving up (a launcher racing
    /// the daemon's own bind can otherwise see a transient `ENOENT`).
    pub fn connect_with_timeout(path: &Path, timeout: Duration) -> Result<Self, ClientError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match Self::connect(path) {
                Err(ClientError::NotFound) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                other => return other,
            }
        }
    }

    fn handshake(stream: UnixStream) -> Result<Self, ClientError> {
        let mut writer = BufWriter::new(stream.try_clone()?);
        write_client_version(&mut writer, PROTOCOL_VERSION)?;
        std::io::Write::flush(&mut writer)?;

        let mut reader = BufReader::new(stream);
        let server_version = read_server_version(&mut reader)?;
        if server_version < 0 || (server_version as u32) < MIN_VERSION {
            return Err(ClientError::VersionRejected(server_version));
        }
        Ok(Self { reader, writer })
    }

    fn roundtrip<T>(
        &mut self,
        req: Request,
        read: impl FnOnce(&mut BufReader<UnixStream>) -> Result<T, ProtocolError>,
    ) -> Result<T, ClientError> {
        req.write(&mut self.writer)?;
        std::io::Write::flush(&mut self.writer)?;
        Ok(read(&mut self.reader)?)
    }

    fn rc_errno_call(&mut self, req: Request) -> Result<(), ClientError> {
        let v: RcErrno = self.roundtrip(req, rc_errno::read)?;
        ClientError::from_rc_errno(v)
    }

    pub fn state(&mut self) -> Result<u32, ClientError> {
        self.roundtrip(Request::State, state_wire::read)
    }

    pub fn info(&mut self) -> Result<InfoReply, ClientError> {
        self.roundtrip(Request::Info, info::read)
    }

    pub fn mem_limits(&mut self) -> Result<(u64, u64), ClientError> {
        self.roundtrip(Request::MemLimits, mem_limits::read)
    }

    pub fn uid(&mut self) -> Result<u32, ClientError> {
        self.roundtrip(Request::Uid, uid::read)
    }

    pub fn node_id(&mut self) -> Result<u32, ClientError> {
        self.roundtrip(Request::NodeId, node_id::read)
    }

    pub fn daemon_pid(&mut self) -> Result<i32, ClientError> {
        self.roundtrip(Request::DaemonPid, daemon_pid::read)
    }

    pub fn signal_container(&mut self, sig: i32, flags: i32, requestor_uid: u32) -> Result<(), ClientError> {
        self.rc_errno_call(Request::SignalContainer { sig, flags, requestor_uid })
    }

    pub fn notify(&mut self, msg: &str) -> Result<(), ClientError> {
        let rc: i32 = self.roundtrip(Request::JobNotify { msg: msg.to_string() }, job_notify::read)?;
        if rc < 0 {
            return Err(ClientError::Rpc { rc, errno: 0 });
        }
        Ok(())
    }

    /// Two-phase `STEP_SUSPEND` (spec.md §4.7 "Two-Phase Toggle"): phase 0
    /// has no reply at all, so only phase 1's `(rc, errno)` is awaited.
    pub fn suspend(&mut self, core_spec: u16) -> Result<(), ClientError> {
        Request::StepSuspendPhase0 { core_spec }.write(&mut self.writer)?;
        std::io::Write::flush(&mut self.writer)?;
        self.rc_errno_call(Request::StepSuspendPhase1)
    }

    pub fn resume(&mut self, core_spec: u16) -> Result<(), ClientError> {
        Request::StepResumePhase0 { core_spec }.write(&mut self.writer)?;
        std::io::Write::flush(&mut self.writer)?;
        self.rc_errno_call(Request::StepResumePhase1)
    }

    pub fn terminate(&mut self) -> Result<(), ClientError> {
        self.rc_errno_call(Request::StepTerminate)
    }

    pub fn reconfigure(&mut self) -> Result<(), ClientError> {
        self.rc_errno_call(Request::StepReconfigure)
    }

    pub fn completion(&mut self, first: i32, last: i32, step_rc: i32, accounting: &[u8]) -> Result<(), ClientError> {
        self.rc_errno_call(Request::StepCompletion {
            first,
            last,
            step_rc,
            accounting: accounting.to_vec(),
        })
    }

    pub fn step_stat(&mut self) -> Result<(Vec<u8>, i32), ClientError> {
        self.roundtrip(Request::StepStat, step_stat::read)
    }

    pub fn task_info(&mut self) -> Result<Vec<TaskInfoEntry>, ClientError> {
        self.roundtrip(Request::StepTaskInfo, task_info::read)
    }

    pub fn list_pids(&mut self) -> Result<Vec<u32>, ClientError> {
        self.roundtrip(Request::StepListPids, list_pids::read)
    }

    pub fn pid_in_container(&mut self, pid: i32) -> Result<bool, ClientError> {
        self.roundtrip(Request::PidInContainer { pid }, pid_in_container::read)
    }

    pub fn add_extern_pid(&mut self, pid: i32) -> Result<(), ClientError> {
        let rc: i32 = self.roundtrip(Request::AddExternPid { pid }, add_extern_pid::read)?;
        if rc < 0 {
            return Err(ClientError::Rpc { rc, errno: 0 });
        }
        Ok(())
    }

    /// `(display, xauthority_path)`; `display < 0` means no X11
    /// forwarding was set up for this step.
    pub fn x11_display(&mut self) -> Result<(i32, String), ClientError> {
        self.roundtrip(Request::X11Display, x11_display::read)
    }

    pub fn getpw(&mut self, mode: MatchMode, uid: u32, name: &str) -> Result<Option<PasswdReply>, ClientError> {
        self.roundtrip(Request::GetPw { mode: mode.as_wire(), uid, name: name.to_string() }, getpw::read)
    }

    pub fn getgr(&mut self, mode: MatchMode, gid: u32, name: &str) -> Result<Vec<GroupReplyEntry>, ClientError> {
        self.roundtrip(Request::GetGr { mode: mode.as_wire(), gid, name: name.to_string() }, getgr::read)
    }

    pub fn attach(
        &mut self,
        io_addr: &str,
        resp_addr: &str,
        key: [u8; ATTACH_KEY_LEN],
        uid: u32,
    ) -> Result<AttachOk, ClientError> {
        let result = self.roundtrip(
            Request::Attach {
                io_addr: io_addr.to_string(),
                resp_addr: resp_addr.to_string(),
                key,
                uid,
                client_version: PROTOCOL_VERSION as u16,
            },
            attach_wire::read,
        )?;
        result.map_err(|rc| ClientError::Rpc { rc, errno: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;
    use std::os::unix::net::UnixListener;

    /// Spawn a fake daemon that performs the handshake and writes a fixed
    /// `STATE` reply, returning its socket path.
    fn fake_daemon(reply_state: u32) -> (tempfile::TempDir, std::path::PathBuf, std::thread::JoinHandle<()>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _client_version = read_client_version(&mut stream).unwrap();
            write_server_version_for_test(&mut stream, PROTOCOL_VERSION as i32);
            let mut opcode_buf = [0u8; 4];
            stream.read_exact(&mut opcode_buf).unwrap();
            state_wire::write(&mut stream, reply_state).unwrap();
        });
        (dir, path, handle)
    }

    fn write_server_version_for_test(stream: &mut UnixStream, v: i32) {
        std::io::Write::write_all(stream, &v.to_ne_bytes()).unwrap();
    }

    #[test]
    fn connect_and_state_roundtrip() {
        let (_dir, path, handle) = fake_daemon(2);
        let mut session = ClientSession::connect(&path).unwrap();
        assert_eq!(session.state().unwrap(), 2);
        handle.join().unwrap();
    }

    #[test]
    fn connect_to_missing_socket_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientSession::connect(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ClientError::NotFound));
    }

    #[test]
    fn version_below_minimum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _client_version = read_client_version(&mut stream).unwrap();
            write_server_version_for_test(&mut stream, -1);
        });
        let err = ClientSession::connect(&path).unwrap_err();
        assert!(matches!(err, ClientError::VersionRejected(-1)));
        handle.join().unwrap();
    }
}
