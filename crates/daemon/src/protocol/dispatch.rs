// SPDX-License-Identifier: MIT

//! Opcode dispatch (spec.md §4.5 "Authorization", §6 "Message
//! catalogue"). Authorization is checked against the opcode's category
//! before any handler runs; a failure replies in that opcode's own reply
//! shape and the session loop continues (spec.md §7: "reply (rc=-1,
//! errno=EPERM) and continue the session" — this is not a fatal error).

use std::io::Write;
use std::sync::Arc;

use stepd_core::error::libc_errno::EPERM;
use stepd_core::{MatchMode, RcErrno};
use stepd_wire::{
    add_extern_pid, attach as attach_wire, daemon_pid, getgr, getpw, info, job_notify, list_pids, mem_limits,
    node_id, pid_in_container, rc_errno, state as state_wire, step_stat, task_info, uid, x11_display, Opcode,
    ProtocolError, Request,
};

use crate::handlers::{
    attach, completion, extern_pid, notify, passwd, query, reconfigure, signal_container, suspend_resume, terminate,
};
use crate::state::StepDaemonState;

/// `true` if `uid` is authorized to invoke `opcode` on `state`
/// (spec.md §4.5's three-way partition).
fn authorized(state: &StepDaemonState, opcode: Opcode, uid: u32) -> bool {
    if opcode.is_query_only() {
        return true;
    }
    if opcode.requires_owner_or_service() {
        return state.is_owner_or_service(uid);
    }
    debug_assert!(opcode.requires_service_only());
    state.is_service(uid)
}

/// Opcodes whose reply has no errno slot at all (spec.md §6), so an
/// authorization failure can only report a bare negative rc.
fn bare_rc_only(opcode: Opcode) -> bool {
    matches!(opcode, Opcode::JobNotify | Opcode::AddExternPid)
}

pub fn dispatch(
    state: &Arc<StepDaemonState>,
    uid: u32,
    pid: i32,
    opcode: Opcode,
    request: Request,
    stream: &mut (impl Write + Send),
) -> Result<(), ProtocolError> {
    if !authorized(state, opcode, uid) {
        return reply_unauthorized(opcode, request, stream);
    }

    match request {
        Request::State => state_wire::write(stream, query::state_wire(state)),
        Request::Info => info::write(stream, &query::info(state)),
        Request::MemLimits => {
            let (job_mem, step_mem) = query::mem_limits(state);
            mem_limits::write(stream, job_mem, step_mem)
        }
        Request::Uid => uid::write(stream, query::uid(state)),
        Request::NodeId => node_id::write(stream, query::node_id(state)),
        Request::DaemonPid => daemon_pid::write(stream, query::daemon_pid(state)),
        Request::SignalContainer { sig, flags, requestor_uid: _ } => {
            let rc = signal_container::handle(state, sig, flags, uid);
            rc_errno::write(stream, rc)
        }
        Request::JobNotify { msg } => job_notify::write(stream, notify::handle(state, &msg)),
        Request::StepSuspendPhase0 { core_spec } => {
            suspend_resume::suspend_phase0(state, core_spec);
            Ok(())
        }
        Request::StepSuspendPhase1 => rc_errno::write(stream, suspend_resume::suspend_phase1(state)),
        Request::StepResumePhase0 { core_spec } => {
            suspend_resume::resume_phase0(state, core_spec);
            Ok(())
        }
        Request::StepResumePhase1 => rc_errno::write(stream, suspend_resume::resume_phase1(state)),
        Request::StepTerminate => rc_errno::write(stream, terminate::handle(state)),
        Request::StepReconfigure => rc_errno::write(stream, reconfigure::handle(state)),
        Request::StepCompletion { first, last, step_rc, accounting } => {
            completion::handle(state, first, last, step_rc, &accounting, stream)
        }
        Request::StepStat => {
            let (accounting, num_live) = query::step_stat(state);
            step_stat::write(stream, &accounting, num_live)
        }
        Request::StepTaskInfo => task_info::write(stream, &query::task_info(state)),
        Request::StepListPids => list_pids::write(stream, &query::list_pids(state)),
        Request::PidInContainer { pid } => pid_in_container::write(stream, query::pid_in_container(state, pid)),
        Request::AddExternPid { pid } => add_extern_pid::write(stream, extern_pid::handle(state, pid)),
        Request::X11Display => {
            let (display, xauthority_path) = query::x11_display(state);
            x11_display::write(stream, display, &xauthority_path)
        }
        Request::GetPw { mode, uid: filter_uid, name } => {
            let mode = MatchMode::from_wire(mode).unwrap_or(MatchMode::Always);
            let found = passwd::getpw(state, mode, filter_uid, &name, pid);
            getpw::write(stream, found.as_ref())
        }
        Request::GetGr { mode, gid, name } => {
            let mode = MatchMode::from_wire(mode).unwrap_or(MatchMode::Always);
            let entries = passwd::getgr(state, mode, gid, &name, pid);
            getgr::write(stream, &entries)
        }
        Request::Attach { io_addr, resp_addr, key, uid: client_uid, client_version } => {
            let result = attach::handle(state, &io_addr, &resp_addr, key, client_uid, client_version);
            attach_wire::write(stream, result.as_ref().map_err(|rc| *rc))
        }
    }
}

fn reply_unauthorized(
    opcode: Opcode,
    request: Request,
    stream: &mut (impl Write + Send),
) -> Result<(), ProtocolError> {
    // Phase 0 of suspend/resume has no reply at all (spec.md §6); an
    // unauthorized phase-0 call is silently dropped the same way a
    // successful one produces no reply.
    if matches!(request, Request::StepSuspendPhase0 { .. } | Request::StepResumePhase0 { .. }) {
        return Ok(());
    }
    if opcode == Opcode::Attach {
        return attach_wire::write(stream, Err(-EPERM));
    }
    if bare_rc_only(opcode) {
        return match opcode {
            Opcode::JobNotify => job_notify::write(stream, -1),
            Opcode::AddExternPid => add_extern_pid::write(stream, -1),
            _ => unreachable!(),
        };
    }
    rc_errno::write(stream, RcErrno::err(EPERM))
}
