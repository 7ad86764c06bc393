// SPDX-License-Identifier: MIT

//! Scanning-based batch dispatch (spec.md §4.3 "Scanning-Based
//! Dispatch", §4.2 "Stray cleanup"): operations that fan out over every
//! socket a `scan()` of the spool directory turns up, rather than
//! talking to one known step.

use std::path::Path;

use crate::error::ClientError;
use crate::session::ClientSession;
use crate::socket::{self, StepLoc};

/// One scanned step's outcome: either the rpc succeeded, or connecting
/// to / talking to it failed. A dead or stray socket never aborts the
/// whole batch (spec.md §4.3: "best-effort fan-out").
pub struct BatchResult<T> {
    pub loc: StepLoc,
    pub outcome: Result<T, ClientError>,
}

/// `STEP_LIST_PIDS` against every step socket belonging to `job_id`
/// (spec.md §4.3).
pub fn list_pids_for_job(spool_dir: &Path, job_id: u32) -> std::io::Result<Vec<BatchResult<Vec<u32>>>> {
    Ok(for_each_step_of_job(spool_dir, job_id, |session| session.list_pids())?)
}

/// `SIGNAL_CONTAINER` against every step socket belonging to `job_id`
/// (spec.md §4.3, e.g. a job-wide cancellation fan-out).
pub fn signal_all_steps_of_job(
    spool_dir: &Path,
    job_id: u32,
    sig: i32,
    flags: i32,
    requestor_uid: u32,
) -> std::io::Result<Vec<BatchResult<()>>> {
    Ok(for_each_step_of_job(spool_dir, job_id, |session| {
        session.signal_container(sig, flags, requestor_uid)
    })?)
}

fn for_each_step_of_job<T>(
    spool_dir: &Path,
    job_id: u32,
    mut call: impl FnMut(&mut ClientSession) -> Result<T, ClientError>,
) -> std::io::Result<Vec<BatchResult<T>>> {
    let locs = socket::scan(spool_dir)?.into_iter().filter(|loc| loc.job_id == job_id);
    Ok(locs
        .map(|loc| {
            let outcome = ClientSession::connect(&loc.path).and_then(|mut s| call(&mut s));
            BatchResult { loc, outcome }
        })
        .collect())
}

/// Unlink every socket under `spool_dir` that is both owned by
/// `caller_uid` and stray (idle past [`socket::STALE_AGE`] with no
/// listener behind it). Returns the paths actually removed (spec.md §8
/// property 3, E6). Does nothing when run unprivileged (spec.md §4.2
/// "Do not attempt cleanup when running unprivileged").
pub fn cleanup_all_sockets_for_node(
    spool_dir: &Path,
    caller_uid: u32,
    service_uid: u32,
) -> std::io::Result<Vec<std::path::PathBuf>> {
    if !socket::is_privileged_caller(service_uid) {
        return Ok(Vec::new());
    }
    let mut removed = Vec::new();
    for loc in socket::scan(spool_dir)? {
        if ClientSession::connect(&loc.path).is_ok() {
            continue;
        }
        if socket::is_stray(&loc.path, caller_uid, service_uid).unwrap_or(false) {
            if std::fs::remove_file(&loc.path).is_ok() {
                removed.push(loc.path);
            }
        }
    }
    Ok(removed)
}
