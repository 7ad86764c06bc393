// SPDX-License-Identifier: MIT

//! Passwd/group emulation records (spec.md §4.9).

/// Match mode carried by `GETPW`/`GETGR` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Always,
    Pid,
    UserAndPid,
    GroupAndPid,
}

impl MatchMode {
    pub fn from_wire(v: i32) -> Option<Self> {
        match v {
            0 => Some(MatchMode::Always),
            1 => Some(MatchMode::Pid),
            2 => Some(MatchMode::UserAndPid),
            3 => Some(MatchMode::GroupAndPid),
            _ => None,
        }
    }

    pub fn as_wire(self) -> i32 {
        match self {
            MatchMode::Always => 0,
            MatchMode::Pid => 1,
            MatchMode::UserAndPid => 2,
            MatchMode::GroupAndPid => 3,
        }
    }
}

/// A composed `passwd`-like record. The placeholder password field is
/// always literally `"x"` on the wire (spec.md §4.9) and is not stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdRecord {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub dir: String,
    pub shell: String,
}

/// A composed `group`-like record. Each group entry has exactly one
/// member: the step owner (spec.md §4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub name: String,
    pub gid: u32,
    pub owner_name: String,
}

/// The step's cached user record, consulted by `GETPW`/`GETGR`
/// (spec.md §6 Configuration: "pw_* cached user record").
#[derive(Debug, Clone)]
pub struct CachedUserRecord {
    pub passwd: PasswdRecord,
    pub groups: Vec<GroupRecord>,
}

impl CachedUserRecord {
    pub fn matches(&self, mode: MatchMode, uid: u32, name: &str) -> bool {
        match mode {
            MatchMode::Always | MatchMode::Pid => true,
            MatchMode::UserAndPid => self.passwd.uid == uid && self.passwd.name == name,
            MatchMode::GroupAndPid => {
                self.groups.iter().any(|g| g.gid == uid) && self.groups.iter().any(|g| g.name == name)
            }
        }
    }
}
