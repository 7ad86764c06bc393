// SPDX-License-Identifier: MIT

//! `stepctl` subcommand implementations. Each handler connects to one
//! step socket (or scans a spool directory for a batch op), issues the
//! matching RPC, and prints a human-readable line — this is the
//! "node agent's shell-outs" front end spec.md §4.3 and SPEC_FULL.md §5
//! describe, not a scripting API.

use std::path::PathBuf;

use anyhow::Result;
use stepd_client::{batch, ClientSession};
use stepd_core::MatchMode;

use crate::exit_error::from_client_error;

fn connect(socket: &PathBuf) -> Result<ClientSession> {
    ClientSession::connect(socket).map_err(|e| from_client_error(e).into())
}

pub fn state(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    let state = session.state().map_err(from_client_error)?;
    println!("{state}");
    Ok(())
}

pub fn info(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    let info = session.info().map_err(from_client_error)?;
    println!(
        "uid={} job_id={} step_id={} protocol_version={} node_id={} job_mem={} step_mem={}",
        info.uid, info.job_id, info.step_id, info.protocol_version, info.node_id, info.job_mem, info.step_mem
    );
    Ok(())
}

pub fn mem_limits(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    let (job_mem, step_mem) = session.mem_limits().map_err(from_client_error)?;
    println!("job_mem_kb={job_mem} step_mem_kb={step_mem}");
    Ok(())
}

pub fn uid(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    println!("{}", session.uid().map_err(from_client_error)?);
    Ok(())
}

pub fn node_id(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    println!("{}", session.node_id().map_err(from_client_error)?);
    Ok(())
}

pub fn daemon_pid(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    println!("{}", session.daemon_pid().map_err(from_client_error)?);
    Ok(())
}

pub fn signal(socket: PathBuf, sig: i32, flags: i32, requestor_uid: u32) -> Result<()> {
    let mut session = connect(&socket)?;
    session.signal_container(sig, flags, requestor_uid).map_err(from_client_error)?;
    Ok(())
}

pub fn notify(socket: PathBuf, msg: String) -> Result<()> {
    let mut session = connect(&socket)?;
    session.notify(&msg).map_err(from_client_error)?;
    Ok(())
}

pub fn suspend(socket: PathBuf, core_spec: u16) -> Result<()> {
    let mut session = connect(&socket)?;
    session.suspend(core_spec).map_err(from_client_error)?;
    Ok(())
}

pub fn resume(socket: PathBuf, core_spec: u16) -> Result<()> {
    let mut session = connect(&socket)?;
    session.resume(core_spec).map_err(from_client_error)?;
    Ok(())
}

pub fn terminate(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    session.terminate().map_err(from_client_error)?;
    Ok(())
}

pub fn reconfigure(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    session.reconfigure().map_err(from_client_error)?;
    Ok(())
}

pub fn task_info(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    for t in session.task_info().map_err(from_client_error)? {
        println!(
            "local_id={} global_id={} pid={} exited={} exit_status={}",
            t.local_id, t.global_id, t.pid, t.exited, t.exit_status
        );
    }
    Ok(())
}

pub fn list_pids(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    for pid in session.list_pids().map_err(from_client_error)? {
        println!("{pid}");
    }
    Ok(())
}

pub fn pid_in_container(socket: PathBuf, pid: i32) -> Result<()> {
    let mut session = connect(&socket)?;
    println!("{}", session.pid_in_container(pid).map_err(from_client_error)?);
    Ok(())
}

pub fn add_extern_pid(socket: PathBuf, pid: i32) -> Result<()> {
    let mut session = connect(&socket)?;
    session.add_extern_pid(pid).map_err(from_client_error)?;
    Ok(())
}

pub fn x11_display(socket: PathBuf) -> Result<()> {
    let mut session = connect(&socket)?;
    let (display, xauthority_path) = session.x11_display().map_err(from_client_error)?;
    if display < 0 {
        println!("no X11 forwarding");
    } else {
        println!("display={display} xauthority={xauthority_path}");
    }
    Ok(())
}

pub fn getpw(socket: PathBuf, mode: MatchMode, uid: u32, name: String) -> Result<()> {
    let mut session = connect(&socket)?;
    match session.getpw(mode, uid, &name).map_err(from_client_error)? {
        Some(p) => println!("{}:x:{}:{}:{}:{}:{}", p.name, p.uid, p.gid, p.gecos, p.dir, p.shell),
        None => println!("not found"),
    }
    Ok(())
}

pub fn getgr(socket: PathBuf, mode: MatchMode, gid: u32, name: String) -> Result<()> {
    let mut session = connect(&socket)?;
    for g in session.getgr(mode, gid, &name).map_err(from_client_error)? {
        println!("{}:x:{}:{}", g.name, g.gid, g.owner_name);
    }
    Ok(())
}

pub fn batch_list_pids(spool_dir: PathBuf, job_id: u32) -> Result<()> {
    for result in batch::list_pids_for_job(&spool_dir, job_id)? {
        match result.outcome {
            Ok(pids) => println!("{}.{}: {:?}", result.loc.job_id, result.loc.step_id, pids),
            Err(e) => eprintln!("{}.{}: {e}", result.loc.job_id, result.loc.step_id),
        }
    }
    Ok(())
}

pub fn batch_signal(spool_dir: PathBuf, job_id: u32, sig: i32, flags: i32, requestor_uid: u32) -> Result<()> {
    for result in batch::signal_all_steps_of_job(&spool_dir, job_id, sig, flags, requestor_uid)? {
        if let Err(e) = result.outcome {
            eprintln!("{}.{}: {e}", result.loc.job_id, result.loc.step_id);
        }
    }
    Ok(())
}

pub fn cleanup(spool_dir: PathBuf, caller_uid: u32, service_uid: u32) -> Result<()> {
    for path in batch::cleanup_all_sockets_for_node(&spool_dir, caller_uid, service_uid)? {
        println!("removed {}", path.display());
    }
    Ok(())
}
