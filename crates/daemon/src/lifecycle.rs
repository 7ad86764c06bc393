// SPDX-License-Identifier: MIT

// `sigaction` has no safe wrapper; confined to `install_signal_handlers`.
#![allow(unsafe_code)]

//! Daemon startup and shutdown (spec.md §4.1 "Accept Loop" bullets 1-2,
//! 6; SPEC_FULL.md §14 "graceful shutdown"). Mirrors the bind-then-
//! unlink-stale / lock-file pattern this workspace's other daemon uses
//! for its own socket and pidfile.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use tracing::info;

use crate::config::Config;
use crate::error::LifecycleError;

pub struct BoundSocket {
    pub listener: UnixListener,
    _lock_file: std::fs::File,
}

/// Bind the step's socket, performing the "one creator, one destroyer"
/// dance spec.md §4.1 describes: create the spool dir, take an exclusive
/// lock on the per-step lock file (so two daemons never bind the same
/// step), unlink any leftover socket file, bind, then `chmod 0777`.
pub fn startup(config: &Config) -> Result<BoundSocket, LifecycleError> {
    std::fs::create_dir_all(&config.socket_dir)?;

    let lock_file = OpenOptions::new().write(true).create(true).truncate(false).open(config.lock_path())?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let socket_path = config.socket_path();
    if socket_path.exists() {
        std::fs::remove_file(&socket_path).map_err(LifecycleError::StepExists)?;
    }
    let listener = UnixListener::bind(&socket_path)
        .map_err(|e| LifecycleError::BindFailed(socket_path.clone(), e))?;

    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o777))?;

    info!(path = %socket_path.display(), "step daemon socket bound");
    Ok(BoundSocket { listener, _lock_file: lock_file })
}

/// Unlink the socket (spec.md §4.1 bullet 6: "at shutdown, unlink the
/// socket ... and wait up to ~5s for the connection counter to drain").
pub fn unlink_socket(config: &Config) {
    let path = config.socket_path();
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to unlink socket on shutdown");
        }
    }
}

/// Shared flag flipped by the `SIGTERM`/`SIGINT` handler, observed by the
/// accept loop between `accept()` calls (SPEC_FULL.md §14).
#[derive(Clone)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_term_signal(_sig: nix::libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install `SIGTERM`/`SIGINT` handlers that flip a process-wide flag.
/// Polled by [`poll_shutdown_requested`] rather than doing any work
/// inside the signal handler itself.
pub fn install_signal_handlers() -> Result<(), nix::Error> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    let action = SigAction::new(SigHandler::Handler(handle_term_signal), SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(Signal::SIGTERM, &action)?;
        sigaction(Signal::SIGINT, &action)?;
    }
    Ok(())
}

pub fn poll_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}
