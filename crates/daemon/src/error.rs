// SPDX-License-Identifier: MIT

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another step daemon already holds the lock for this step")]
    LockFailed(std::io::Error),
    #[error("another step daemon already bound this step's socket: {0}")]
    StepExists(std::io::Error),
    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),
    #[error("socket path invalid: {0}")]
    Socket(#[from] crate::socket::SocketError),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}
