// SPDX-License-Identifier: MIT

//! Socket Locator (spec.md §4.2): build / scan / parse the per-step
//! socket filename, and stray-socket cleanup.
//!
//! The filename grammar is fixed by spec.md §4.2:
//! `^<node_name>_([0-9]+)\.([0-9]+)(?:\.([0-9]+))?$`. This is parsed by
//! hand rather than pulling in a regex engine for one fixed pattern,
//! following the rest of this workspace's own hand-rolled string parsing
//! (`stepd-core`'s id/string handling).

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Maximum socket path length accepted by `sockaddr_un` on Linux.
pub const MAX_SOCKET_PATH_LEN: usize = 108;

/// A step descriptor recovered from scanning the spool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLoc {
    pub path: PathBuf,
    pub node_name: String,
    pub job_id: u32,
    pub step_id: u32,
    pub het_component: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket path exceeds platform limit ({0} > {MAX_SOCKET_PATH_LEN})")]
    InvalidSocketNameLen(usize),
}

/// Build the socket filename (not the full path) for a step id triple.
pub fn file_name(node_name: &str, job_id: u32, step_id: u32, het_component: Option<u32>) -> String {
    match het_component {
        Some(h) => format!("{node_name}_{job_id}.{step_id}.{h}"),
        None => format!("{node_name}_{job_id}.{step_id}"),
    }
}

/// Compose the full socket path, failing if it would exceed the
/// platform's `sockaddr_un` length limit (spec.md §4.2 "Build").
pub fn build(
    spool_dir: &Path,
    node_name: &str,
    job_id: u32,
    step_id: u32,
    het_component: Option<u32>,
) -> Result<PathBuf, SocketError> {
    let path = spool_dir.join(file_name(node_name, job_id, step_id, het_component));
    let len = path.as_os_str().len();
    if len > MAX_SOCKET_PATH_LEN {
        return Err(SocketError::InvalidSocketNameLen(len));
    }
    Ok(path)
}

/// Parse one filename against the grammar `<node_name>_<job>.<step>[.<het>]`.
/// `node_name` itself may contain underscores, so the split point is the
/// *last* underscore before the numeric suffix, found by scanning from
/// the end for `_<digits>.<digits>(.<digits>)?`.
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

/// Enumerate `spool_dir`, yielding a [`StepLoc`] for every entry matching
/// the socket filename grammar. Non-matching entries are silently
/// skipped (spec.md §4.2 "Scan").
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

/// How old (by mtime) an orphan socket must be before it's considered
/// stray (spec.md §4.2 "Stray cleanup").
pub const STALE_AGE: Duration = Duration::from_secs(10 * 60);

/// True if `path` is a stray socket: owned by `caller_uid` and older than
/// [`STALE_AGE`] (spec.md §8 property 3). Caller is responsible for
/// having already confirmed `connect()` returned `ECONNREFUSED` and that
/// it is running privileged.
pub fn is_stray(path: &Path, caller_uid: u32) -> std::io::Result<bool> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.uid() != caller_uid {
        return Ok(false);
    }
    let age = SystemTime::now()
        .duration_since(meta.modified()?)
        .unwrap_or(Duration::ZERO);
    Ok(age > STALE_AGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_without_het_component() {
        let name = file_name("node_A", 42, 1, None);
        assert_eq!(name, "node_A_42.1");
        assert_eq!(parse_file_name(&name), Some(("node_A".to_string(), 42, 1, None)));
    }

    #[test]
    fn roundtrip_with_het_component() {
        let name = file_name("node_A", 42, 1, Some(3));
        assert_eq!(name, "node_A_42.1.3");
        assert_eq!(parse_file_name(&name), Some(("node_A".to_string(), 42, 1, Some(3))));
    }

    /// spec.md §8 property 2: `build(scan(dir)[i])` is idempotent.
    #[test]
    fn build_scan_idempotence() {
        let dir = tempfile::tempdir().unwrap();
        let original = build(dir.path(), "node_A", 42, 1, Some(3)).unwrap();
        std::fs::write(&original, []).unwrap();
        let scanned = scan(dir.path()).unwrap();
        assert_eq!(scanned.len(), 1);
        let loc = &scanned[0];
        let rebuilt =
            build(dir.path(), &loc.node_name, loc.job_id, loc.step_id, loc.het_component).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn non_matching_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("not-a-socket"), []).unwrap();
        std::fs::write(dir.path().join("node_A_42.1"), []).unwrap();
        let scanned = scan(dir.path()).unwrap();
        assert_eq!(scanned.len(), 1);
    }

    #[test]
    fn oversized_path_is_rejected() {
        let huge_dir = PathBuf::from("/").join("x".repeat(200));
        assert!(build(&huge_dir, "node_A", 1, 1, None).is_err());
    }

    /// spec.md E6.
    #[test]
    fn e6_stray_socket_aged_past_threshold_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_A_42.1");
        std::fs::write(&path, []).unwrap();
        let old = SystemTime::now() - Duration::from_secs(11 * 60);
        set_mtime(&path, old);
        let caller_uid = std::fs::metadata(&path).unwrap().uid();
        assert!(is_stray(&path, caller_uid).unwrap());
    }

    #[test]
    fn fresh_socket_is_not_stray() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_A_42.1");
        std::fs::write(&path, []).unwrap();
        let caller_uid = std::fs::metadata(&path).unwrap().uid();
        assert!(!is_stray(&path, caller_uid).unwrap());
    }

    fn set_mtime(path: &Path, t: SystemTime) {
        let epoch = t.duration_since(std::time::UNIX_EPOCH).unwrap();
        let spec = nix::sys::time::TimeVal::new(epoch.as_secs() as i64, epoch.subsec_micros() as i64);
        nix::sys::stat::utimes(path, &spec, &spec).unwrap();
    }
}
