// SPDX-License-Identifier: MIT

//! Socket Locator, client side (spec.md §4.2): the same
//! `<node_name>_<job_id>.<step_id>[.<het_component>]` grammar the daemon
//! binds to, scanned from the privileged tooling side rather than bound.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A step descriptor recovered from scanning the spool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLoc {
    pub path: PathBuf,
    pub node_name: String,
    pub job_id: u32,
    pub step_id: u32,
    pub het_component: Option<u32>,
}

/// Build the socket path for a step id triple (spec.md §4.2 "Build").
pub fn build(spool_dir: &Path, node_name: &str, job_id: u32, step_id: u32, het_component: Option<u32>) -> PathBuf {
    let name = match het_component {
        Some(h) => format!("{node_name}_{job_id}.{step_id}.{h}"),
        None => format!("{node_name}_{job_id}.{step_id}"),
    };
    spool_dir.join(name)
}

fn parse_file_name(name: &str) -> Option<(String, u32, u32, Option<u32>)> {
    let underscore = name.rfind('_')?;
    let (node_name, rest) = (&name[..underscore], &name[underscore + 1..]);
    if node_name.is_empty() {
        return None;
    }
    let mut parts = rest.splitn(3, '.');
    let job_id: u32 = parts.next()?.parse().ok()?;
    let step_id: u32 = parts.next()?.parse().ok()?;
    let het_component = match parts.next() {
        Some(s) => Some(s.parse::<u32>().ok()?),
        None => None,
    };
    Some((node_name.to_string(), job_id, step_id, het_component))
}

/// Enumerate `spool_dir`, yielding a [`StepLoc`] for every matching
/// socket (spec.md §4.2 "Scan", §4.3 "Scanning-Based Dispatch").
pub fn scan(spool_dir: &Path) -> std::io::Result<Vec<StepLoc>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(spool_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some((node_name, job_id, step_id, het_component)) = parse_file_name(name) {
            out.push(StepLoc { path: entry.path(), node_name, job_id, step_id, het_component });
        }
    }
    Ok(out)
}

/// Same staleness window the daemon side uses to decide a socket with no
/// listener behind it is abandoned rather than mid-startup (spec.md §8
/// property 3).
pub const STALE_AGE: Duration = Duration::from_secs(10 * 60);

/// True if the invoking process is root or the configured service uid
/// (spec.md §4.2 "Stray cleanup": "Do not attempt cleanup when running
/// unprivileged").
pub fn is_privileged_caller(service_uid: u32) -> bool {
    let euid = nix::unistd::geteuid().as_raw();
    euid == 0 || euid == service_uid
}

/// True if `path` is owned by `caller_uid` and idle past [`STALE_AGE`].
/// Callers should only treat this as "safe to unlink" after `connect()`
/// has already returned `ECONNREFUSED`, and only when
/// [`is_privileged_caller`] holds.
pub fn is_stray(path: &Path, caller_uid: u32, service_uid: u32) -> std::io::Result<bool> {
    if !is_privileged_caller(service_uid) {
        return Ok(false);
    }
    let meta = std::fs::symlink_metadata(path)?;
    if meta.uid() != caller_uid {
        return Ok(false);
    }
    let age = SystemTime::now().duration_since(meta.modified()?).unwrap_or(Duration::ZERO);
    Ok(age > STALE_AGE)
}
