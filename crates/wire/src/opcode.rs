// SPDX-License-Identifier: MIT

//! Opcode catalogue (spec.md §6). Numeric values are this implementation's
//! own assignment — spec.md does not fix them, only the ordering of the
//! catalogue and the existence of reserved/defunct slots (spec.md §9).

use crate::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    State,
    Info,
    MemLimits,
    Uid,
    NodeId,
    DaemonPid,
    SignalContainer,
    JobNotify,
    StepSuspend,
    StepResume,
    StepTerminate,
    StepReconfigure,
    StepCompletion,
    StepStat,
    StepTaskInfo,
    StepListPids,
    PidInContainer,
    AddExternPid,
    X11Display,
    GetPw,
    GetGr,
    Attach,
}

impl Opcode {
    pub const fn wire(self) -> u32 {
        match self {
            Opcode::State => 1,
            Opcode::Info => 2,
            Opcode::MemLimits => 3,
            Opcode::Uid => 4,
            Opcode::NodeId => 5,
            Opcode::DaemonPid => 6,
            Opcode::SignalContainer => 7,
            Opcode::JobNotify => 8,
            Opcode::StepSuspend => 9,
            Opcode::StepResume => 10,
            Opcode::StepTerminate => 11,
            Opcode::StepReconfigure => 12,
            Opcode::StepCompletion => 13,
            Opcode::StepStat => 14,
            Opcode::StepTaskInfo => 15,
            Opcode::StepListPids => 16,
            Opcode::PidInContainer => 17,
            Opcode::AddExternPid => 18,
            Opcode::X11Display => 19,
            Opcode::GetPw => 20,
            Opcode::GetGr => 21,
            Opcode::Attach => 22,
        }
    }

    /// Slots that exist only to preserve historical numbering
    /// (spec.md §9 "Defunct opcodes"). The dispatcher rejects these with
    /// [`ProtocolError::UnknownOpcode`], same as any other unrecognized
    /// value.
    pub const DEFUNCT: &'static [u32] = &[0, 23, 24, 25];

    pub fn from_wire(v: u32) -> Result<Self, ProtocolError> {
        use Opcode::*;
        Ok(match v {
            1 => State,
            2 => Info,
            3 => MemLimits,
            4 => Uid,
            5 => NodeId,
            6 => DaemonPid,
            7 => SignalContainer,
            8 => JobNotify,
            9 => StepSuspend,
            10 => StepResume,
            11 => StepTerminate,
            12 => StepReconfigure,
            13 => StepCompletion,
            14 => StepStat,
            15 => StepTaskInfo,
            16 => StepListPids,
            17 => PidInContainer,
            18 => AddExternPid,
            19 => X11Display,
            20 => GetPw,
            21 => GetGr,
            22 => Attach,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        })
    }

    /// True for the opcodes spec.md §4.5 allows any caller to invoke.
    pub fn is_query_only(self) -> bool {
        matches!(
            self,
            Opcode::State
                | Opcode::Info
                | Opcode::MemLimits
                | Opcode::Uid
                | Opcode::NodeId
                | Opcode::DaemonPid
                | Opcode::StepTaskInfo
                | Opcode::StepListPids
                | Opcode::PidInContainer
                | Opcode::X11Display
                | Opcode::GetPw
                | Opcode::GetGr
        )
    }

    /// True for opcodes requiring `uid == step_owner_uid` OR the
    /// authorized service user (spec.md §4.5 bullet 2).
    pub fn requires_owner_or_service(self) -> bool {
        matches!(
            self,
            Opcode::SignalContainer | Opcode::JobNotify
        )
    }

    /// True for opcodes requiring the authorized service user only
    /// (spec.md §4.5 bullet 3).
    pub fn requires_service_only(self) -> bool {
        matches!(
            self,
            Opcode::StepSuspend
                | Opcode::StepResume
                | Opcode::StepTerminate
                | Opcode::StepCompletion
                | Opcode::StepReconfigure
                | Opcode::AddExternPid
                | Opcode::Attach
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_documented_opcode_round_trips() {
        let all = [
            Opcode::State, Opcode::Info, Opcode::MemLimits, Opcode::Uid, Opcode::NodeId,
            Opcode::DaemonPid, Opcode::SignalContainer, Opcode::JobNotify, Opcode::StepSuspend,
            Opcode::StepResume, Opcode::StepTerminate, Opcode::StepReconfigure,
            Opcode::StepCompletion, Opcode::StepStat, Opcode::StepTaskInfo, Opcode::StepListPids,
            Opcode::PidInContainer, Opcode::AddExternPid, Opcode::X11Display, Opcode::GetPw,
            Opcode::GetGr, Opcode::Attach,
        ];
        for op in all {
            assert_eq!(Opcode::from_wire(op.wire()).unwrap(), op);
        }
    }

    #[test]
    fn defunct_and_unknown_opcodes_are_rejected() {
        for &v in Opcode::DEFUNCT {
            assert!(Opcode::from_wire(v).is_err());
        }
        assert!(Opcode::from_wire(999).is_err());
    }

    #[test]
    fn authorization_partition_matches_spec_table() {
        assert!(Opcode::State.is_query_only());
        assert!(Opcode::SignalContainer.requires_owner_or_service());
        assert!(Opcode::StepSuspend.requires_service_only());
        assert!(!Opcode::SignalContainer.is_query_only());
        assert!(!Opcode::StepSuspend.requires_owner_or_service());
    }
}
