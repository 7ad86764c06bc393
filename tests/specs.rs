// SPDX-License-Identifier: MIT

//! Workspace-level integration tests: a real daemon over a real
//! Unix-domain socket, driven by a real client session (spec.md §8
//! "Testable properties", concrete scenarios E1-E6).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use stepd_client::{batch, ClientSession};
use stepd_core::StepLifecycle;
use stepd_daemon::config::Config;
use stepd_daemon::listener::ConnectionCounter;
use stepd_daemon::state::StepDaemonState;
use stepd_daemon::{lifecycle, listener};

struct RunningDaemon {
    socket: PathBuf,
    shutdown: lifecycle::ShutdownFlag,
    accept_thread: Option<std::thread::JoinHandle<()>>,
    state: Arc<StepDaemonState>,
    _dir: tempfile::TempDir,
}

impl RunningDaemon {
    fn start(cfg_extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut text = String::from(
            r#"
            job_id = 42
            step_id = 0
            node_name = "node_A"
            node_id = 3
            owner_uid = 1000
            service_uid = 0
            suspend_timeout_secs = 5
            resume_timeout_secs = 5
            "#,
        );
        text.push_str(&format!("socket_dir = {:?}\n", dir.path()));
        text.push_str(cfg_extra);

        let config = Config::from_toml(&text).unwrap();
        let bound = lifecycle::startup(&config).unwrap();
        let socket = config.socket_path();
        let state = Arc::new(StepDaemonState::new(config, Arc::new(stepd_collab::LocalCollab::new())));
        let shutdown = lifecycle::ShutdownFlag::new();
        let counter = Arc::new(ConnectionCounter::new());

        let accept_state = Arc::clone(&state);
        let accept_shutdown = shutdown.clone();
        let accept_thread = std::thread::spawn(move || {
            listener::serve(bound.listener, accept_state, accept_shutdown, counter);
        });

        Self { socket, shutdown, accept_thread: Some(accept_thread), state, _dir: dir }
    }

    fn connect(&self) -> ClientSession {
        ClientSession::connect_with_timeout(&self.socket, Duration::from_secs(2)).unwrap()
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        self.shutdown.request();
        if let Some(h) = self.accept_thread.take() {
            let _ = h.join();
        }
    }
}

/// spec.md E1.
#[test]
#[serial]
fn e1_list_pids_of_a_running_step() {
    let daemon = RunningDaemon::start("");
    daemon.state.collaborators.container().add_pid(daemon.state.container, 111).unwrap();
    daemon.state.collaborators.container().add_pid(daemon.state.container, 222).unwrap();

    let mut session = daemon.connect();
    assert_eq!(session.list_pids().unwrap(), vec![111, 222]);
}

/// spec.md E2.
#[test]
#[serial]
fn e2_owner_signals_a_running_step() {
    let daemon = RunningDaemon::start("");
    daemon.state.lifecycle.advance(StepLifecycle::Running);
    daemon.state.collaborators.container().add_pid(daemon.state.container, std::process::id()).unwrap();

    let mut session = daemon.connect();
    session.signal_container(15, 0, 1000).unwrap();
}

/// spec.md E3 / property 4.
#[test]
#[serial]
fn e3_third_party_signal_is_denied() {
    let daemon = RunningDaemon::start("");
    daemon.state.lifecycle.advance(StepLifecycle::Running);

    let mut session = daemon.connect();
    let err = session.signal_container(15, 0, 1001).unwrap_err();
    assert!(matches!(err, stepd_client::ClientError::Rpc { rc: -1, errno } if errno == stepd_core::error::libc_errno::EPERM));
}

/// spec.md E4 / property 5.
#[test]
#[serial]
fn e4_suspend_then_resume_twice() {
    let daemon = RunningDaemon::start("");
    let mut session = daemon.connect();

    session.suspend(0).unwrap();
    let err = session.suspend(0).unwrap_err();
    assert!(matches!(err, stepd_client::ClientError::Rpc { errno, .. } if errno == stepd_core::StepErrno::StepSuspended.code()));

    session.resume(0).unwrap();
    let err = session.resume(0).unwrap_err();
    assert!(matches!(err, stepd_client::ClientError::Rpc { errno, .. } if errno == stepd_core::StepErrno::StepNotSuspended.code()));
}

/// spec.md property 1: a version below `MIN_VERSION` is rejected.
#[test]
#[serial]
fn handshake_rejects_low_version() {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    let daemon = RunningDaemon::start("");
    let mut stream = UnixStream::connect(&daemon.socket).unwrap();
    stream.write_all(&0u32.to_ne_bytes()).unwrap();
    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).unwrap();
    assert!(i32::from_ne_bytes(reply) < 0);
}

/// spec.md E6 / property 3.
#[test]
#[serial]
fn e6_stray_socket_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let path = stepd_client::socket::build(dir.path(), "node_A", 42, 1, None);
    std::fs::write(&path, []).unwrap();

    let old = std::time::SystemTime::now() - Duration::from_secs(11 * 60);
    let epoch = old.duration_since(std::time::UNIX_EPOCH).unwrap();
    let spec = nix::sys::time::TimeVal::new(epoch.as_secs() as i64, epoch.subsec_micros() as i64);
    nix::sys::stat::utimes(&path, &spec, &spec).unwrap();

    assert!(ClientSession::connect(&path).is_err());

    let caller_uid = nix::unistd::getuid().as_raw();
    let service_uid = nix::unistd::geteuid().as_raw();
    let removed = batch::cleanup_all_sockets_for_node(dir.path(), caller_uid, service_uid).unwrap();
    assert_eq!(removed, vec![path.clone()]);
    assert!(!path.exists());
}

/// spec.md property 12: shutdown drains in-flight connections rather
/// than aborting them.
#[test]
#[serial]
fn connection_drain_lets_in_flight_work_finish() {
    let daemon = RunningDaemon::start("");
    daemon.state.lifecycle.advance(StepLifecycle::Running);

    let mut session = daemon.connect();
    // Suspend's phase 0/phase 1 round trip touches the background
    // worker thread the accept loop must let finish draining.
    session.suspend(0).unwrap();
    assert_eq!(session.state().unwrap(), StepLifecycle::Running.as_wire());
}
