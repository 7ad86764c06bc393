// SPDX-License-Identifier: MIT

//! Step identity: `(job_id, step_id, het_component)` and the two reserved
//! pseudo-step ids, `BATCH_SCRIPT` and `EXTERN`.

use std::fmt;

/// Reserved step id naming the job's batch-script step.
pub const BATCH_SCRIPT: u32 = u32::MAX;
/// Reserved step id naming the "adopted processes" pseudo-step.
pub const EXTERN: u32 = u32::MAX - 1;

/// Identity of a step on this node. Immutable for the life of the step daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId {
    pub job_id: u32,
    pub step_id: u32,
    pub het_component: Option<u32>,
}

impl StepId {
    pub const fn new(job_id: u32, step_id: u32, het_component: Option<u32>) -> Self {
        Self { job_id, step_id, het_component }
    }

    /// True if this identity names the batch-script pseudo-step.
    pub fn is_batch_script(&self) -> bool {
        self.step_id == BATCH_SCRIPT
    }

    /// True if this identity names the extern (adopted-process) pseudo-step.
    pub fn is_extern(&self) -> bool {
        self.step_id == EXTERN
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.het_component {
            Some(h) => write!(f, "{}.{}.{}", self.job_id, self.step_id, h),
            None => write!(f, "{}.{}", self.job_id, self.step_id),
        }
    }
}
