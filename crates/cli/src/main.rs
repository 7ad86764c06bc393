// SPDX-License-Identifier: MIT

//! `stepctl`: administrative front end over the step-daemon protocol
//! (spec.md §4.3, SPEC_FULL.md §5). A thin `clap` wrapper over
//! `stepd-client` — every subcommand is one RPC or one batch scan.

mod commands;
mod exit_error;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stepd_core::MatchMode;

#[derive(Parser)]
#[command(name = "stepctl", version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH")))]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MatchModeArg {
    Always,
    Pid,
    UserAndPid,
    GroupAndPid,
}

impl From<MatchModeArg> for MatchMode {
    fn from(v: MatchModeArg) -> Self {
        match v {
            MatchModeArg::Always => MatchMode::Always,
            MatchModeArg::Pid => MatchMode::Pid,
            MatchModeArg::UserAndPid => MatchMode::UserAndPid,
            MatchModeArg::GroupAndPid => MatchMode::GroupAndPid,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the step's lifecycle state (as its wire code).
    State { socket: PathBuf },
    /// Print uid/job_id/step_id/protocol_version/node_id/memory limits.
    Info { socket: PathBuf },
    /// Print the job and step memory limits in KB.
    MemLimits { socket: PathBuf },
    /// Print the step owner's uid.
    Uid { socket: PathBuf },
    /// Print this node's numeric id.
    NodeId { socket: PathBuf },
    /// Print the step daemon's own pid.
    DaemonPid { socket: PathBuf },
    /// Signal every process in the step's container.
    Signal {
        socket: PathBuf,
        sig: i32,
        #[arg(long, default_value_t = 0)]
        flags: i32,
        #[arg(long)]
        requestor_uid: u32,
    },
    /// Deliver a job-control notification message.
    Notify { socket: PathBuf, msg: String },
    /// Suspend the step (two-phase under the hood).
    Suspend {
        socket: PathBuf,
        #[arg(long, default_value_t = 0)]
        core_spec: u16,
    },
    /// Resume a suspended step.
    Resume {
        socket: PathBuf,
        #[arg(long, default_value_t = 0)]
        core_spec: u16,
    },
    /// Request step termination.
    Terminate { socket: PathBuf },
    /// Ask the step daemon to reopen its log file.
    Reconfigure { socket: PathBuf },
    /// List the step's tasks and their exit status.
    TaskInfo { socket: PathBuf },
    /// List every pid in the step's container.
    ListPids { socket: PathBuf },
    /// Check whether a pid belongs to the step's container.
    PidInContainer { socket: PathBuf, pid: i32 },
    /// Register a pid adopted outside any job step (the `EXTERN` step only).
    AddExternPid { socket: PathBuf, pid: i32 },
    /// Print the step's X11 forwarding display, if any.
    X11Display { socket: PathBuf },
    /// Look up a passwd-style record cached for the step.
    GetPw {
        socket: PathBuf,
        #[arg(long, value_enum, default_value = "always")]
        mode: MatchModeArg,
        #[arg(long, default_value_t = 0)]
        uid: u32,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Look up group-style records cached for the step.
    GetGr {
        socket: PathBuf,
        #[arg(long, value_enum, default_value = "always")]
        mode: MatchModeArg,
        #[arg(long, default_value_t = 0)]
        gid: u32,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Scan a spool directory and list pids for every step of a job.
    BatchListPids { spool_dir: PathBuf, job_id: u32 },
    /// Scan a spool directory and signal every step of a job.
    BatchSignal {
        spool_dir: PathBuf,
        job_id: u32,
        sig: i32,
        #[arg(long, default_value_t = 0)]
        flags: i32,
        #[arg(long)]
        requestor_uid: u32,
    },
    /// Unlink stray sockets (dead, owned by us, idle past the staleness window).
    /// Refuses to do anything unless run as root or the configured service uid.
    Cleanup {
        spool_dir: PathBuf,
        #[arg(long)]
        caller_uid: u32,
        #[arg(long, default_value_t = 0)]
        service_uid: u32,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::State { socket } => commands::state(socket),
        Command::Info { socket } => commands::info(socket),
        Command::MemLimits { socket } => commands::mem_limits(socket),
        Command::Uid { socket } => commands::uid(socket),
        Command::NodeId { socket } => commands::node_id(socket),
        Command::DaemonPid { socket } => commands::daemon_pid(socket),
        Command::Signal { socket, sig, flags, requestor_uid } => commands::signal(socket, sig, flags, requestor_uid),
        Command::Notify { socket, msg } => commands::notify(socket, msg),
        Command::Suspend { socket, core_spec } => commands::suspend(socket, core_spec),
        Command::Resume { socket, core_spec } => commands::resume(socket, core_spec),
        Command::Terminate { socket } => commands::terminate(socket),
        Command::Reconfigure { socket } => commands::reconfigure(socket),
        Command::TaskInfo { socket } => commands::task_info(socket),
        Command::ListPids { socket } => commands::list_pids(socket),
        Command::PidInContainer { socket, pid } => commands::pid_in_container(socket, pid),
        Command::AddExternPid { socket, pid } => commands::add_extern_pid(socket, pid),
        Command::X11Display { socket } => commands::x11_display(socket),
        Command::GetPw { socket, mode, uid, name } => commands::getpw(socket, mode.into(), uid, name),
        Command::GetGr { socket, mode, gid, name } => commands::getgr(socket, mode.into(), gid, name),
        Command::BatchListPids { spool_dir, job_id } => commands::batch_list_pids(spool_dir, job_id),
        Command::BatchSignal { spool_dir, job_id, sig, flags, requestor_uid } => {
            commands::batch_signal(spool_dir, job_id, sig, flags, requestor_uid)
        }
        Command::Cleanup { spool_dir, caller_uid, service_uid } => commands::cleanup(spool_dir, caller_uid, service_uid),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("stepctl: {e}");
            let code = e.downcast_ref::<exit_error::ExitError>().map(|e| e.code).unwrap_or(1);
            std::process::ExitCode::from(code.clamp(1, 255) as u8)
        }
    }
}
