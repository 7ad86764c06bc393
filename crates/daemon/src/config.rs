// SPDX-License-Identifier: MIT

//! Daemon configuration (SPEC_FULL.md "Ambient stack: configuration").
//! Loaded from a TOML file at startup; every field also has a sane
//! default so a step launcher can start a daemon from flags alone.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

fn default_socket_dir() -> PathBuf {
    PathBuf::from("/var/spool/stepd")
}

fn default_suspend_timeout_secs() -> u64 {
    10
}

fn default_completion_timeout_secs() -> u64 {
    30
}

fn default_kill_wait_secs() -> u64 {
    2
}

/// One step daemon's static identity and tree position, read once at
/// startup (spec.md §3 "Ownership": uid/gid/job_id/step_id are immutable
/// for the life of the step daemon).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub job_id: u32,
    pub step_id: u32,
    #[serde(default)]
    pub het_component: Option<u32>,
    /// Name segment of the socket filename (spec.md §4.2: `<node_name>_<job_id>.<step_id>`).
    pub node_name: String,
    /// Numeric node identifier returned by `NODEID`/`INFO` (spec.md §6).
    pub node_id: u32,
    /// The one node, by `node_id`, that logs the cancellation-reason
    /// message for this step (spec.md §4.6 bullet 3: only the designated
    /// messenger node logs, and only once). Defaults to `0`, matching
    /// the original implementation's default before any
    /// `SLURM_STEP_KILLED_MSG_NODE_ID` override is applied.
    #[serde(default)]
    pub msg_target_node_id: u32,
    pub owner_uid: u32,
    /// uid allowed to invoke service-only/owner-or-service opcodes in
    /// addition to the owner (spec.md §4.5).
    pub service_uid: u32,
    #[serde(default)]
    pub job_mem_kb: u64,
    #[serde(default)]
    pub step_mem_kb: u64,

    /// This daemon's rank in the completion-reduction tree and the number
    /// of descendant ranks it aggregates (spec.md §4.7).
    #[serde(default)]
    pub rank: i32,
    #[serde(default)]
    pub subtree_len: usize,

    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,

    #[serde(default = "default_suspend_timeout_secs")]
    pub suspend_timeout_secs: u64,
    #[serde(default = "default_suspend_timeout_secs")]
    pub resume_timeout_secs: u64,
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
    #[serde(default = "default_kill_wait_secs")]
    pub kill_wait_secs: u64,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn suspend_timeout(&self) -> Duration {
        Duration::from_secs(self.suspend_timeout_secs)
    }

    pub fn resume_timeout(&self) -> Duration {
        Duration::from_secs(self.resume_timeout_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_secs(self.kill_wait_secs)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.socket_dir.join(format!("{}.lock", self.socket_file_stem()))
    }

    fn socket_file_stem(&self) -> String {
        crate::socket::file_name(&self.node_name, self.job_id, self.step_id, self.het_component)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.join(self.socket_file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let cfg = Config::from_toml(
            r#"
            job_id = 42
            step_id = 0
            node_name = "node_A"
            node_id = 3
            owner_uid = 1000
            service_uid = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.suspend_timeout_secs, 10);
        assert_eq!(cfg.socket_dir, PathBuf::from("/var/spool/stepd"));
    }
}
