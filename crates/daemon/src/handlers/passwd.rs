// SPDX-License-Identifier: MIT

//! `GETPW`/`GETGR` (spec.md §4.9): composed passwd/group lookups over the
//! step's cached user record, filtered by `MatchMode`.

use stepd_core::MatchMode;
use stepd_wire::{GroupReplyEntry, PasswdReply};

use crate::state::StepDaemonState;

/// `pid` is the caller's pid from peer credentials, never a payload field
/// (spec.md §7: authorization and identity checks use the credential, not
/// anything the client claims). `MatchMode::Pid` and its stricter variants
/// all require the caller's pid to currently be in the step's container.
fn pid_authorized(state: &StepDaemonState, mode: MatchMode, pid: i32) -> bool {
    if mode == MatchMode::Always {
        return true;
    }
    matches!(state.collaborators.container().pids(state.container), Ok(pids) if pids.contains(&(pid as u32)))
}

pub fn getpw(state: &StepDaemonState, mode: MatchMode, uid: u32, name: &str, pid: i32) -> Option<PasswdReply> {
    if !pid_authorized(state, mode, pid) {
        return None;
    }
    let user = state.user.lock();
    let user = user.as_ref()?;
    if !user.matches(mode, uid, name) {
        return None;
    }
    Some(PasswdReply {
        name: user.passwd.name.clone(),
        uid: user.passwd.uid,
        gid: user.passwd.gid,
        gecos: user.passwd.gecos.clone(),
        dir: user.passwd.dir.clone(),
        shell: user.passwd.shell.clone(),
    })
}

pub fn getgr(state: &StepDaemonState, mode: MatchMode, uid: u32, name: &str, pid: i32) -> Vec<GroupReplyEntry> {
    if !pid_authorized(state, mode, pid) {
        return Vec::new();
    }
    let user = state.user.lock();
    let Some(user) = user.as_ref() else { return Vec::new() };
    if !user.matches(mode, uid, name) {
        return Vec::new();
    }
    user.groups
        .iter()
        .map(|g| GroupReplyEntry { name: g.name.clone(), gid: g.gid, owner_name: g.owner_name.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use stepd_collab::LocalCollab;
    use stepd_core::{CachedUserRecord, GroupRecord, PasswdRecord};

    fn state_with_user() -> StepDaemonState {
        let cfg = Config::from_toml(
            r#"
            job_id = 1
            step_id = 0
            node_name = "node_A"
            node_id = 0
            owner_uid = 1000
            service_uid = 0
            "#,
        )
        .unwrap();
        let state = StepDaemonState::new(cfg, Arc::new(LocalCollab::new()));
        *state.user.lock() = Some(CachedUserRecord {
            passwd: PasswdRecord {
                name: "alice".into(),
                uid: 1000,
                gid: 1000,
                gecos: String::new(),
                dir: "/home/alice".into(),
                shell: "/bin/bash".into(),
            },
            groups: vec![GroupRecord { name: "alice".into(), gid: 1000, owner_name: "alice".into() }],
        });
        state
    }

    #[test]
    fn getpw_always_ignores_caller_pid() {
        let state = state_with_user();
        let found = getpw(&state, MatchMode::Always, 0, "", 999_999);
        assert_eq!(found.unwrap().name, "alice");
    }

    #[test]
    fn getpw_pid_mode_requires_container_membership() {
        let state = state_with_user();
        assert!(getpw(&state, MatchMode::Pid, 0, "", 999_999).is_none());
        state.collaborators.container().add_pid(state.container, 4242).unwrap();
        assert!(getpw(&state, MatchMode::Pid, 0, "", 4242).is_some());
    }

    #[test]
    fn getgr_user_and_pid_filters_by_identity() {
        let state = state_with_user();
        state.collaborators.container().add_pid(state.container, 4242).unwrap();
        assert!(!getgr(&state, MatchMode::UserAndPid, 1000, "alice", 4242).is_empty());
        assert!(getgr(&state, MatchMode::UserAndPid, 1, "bob", 4242).is_empty());
    }
}
