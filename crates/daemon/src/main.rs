// SPDX-License-Identifier: MIT

//! `stepd`: one process per step, listening on a Unix-domain socket for
//! the protocol spec.md describes (spec.md §1 "Overview").

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use stepd_collab::LocalCollab;
use tracing::{error, info};

use stepd_daemon::config::Config;
use stepd_daemon::listener::ConnectionCounter;
use stepd_daemon::state::StepDaemonState;
use stepd_daemon::{lifecycle, listener, logging};

#[derive(Parser, Debug)]
#[command(name = "stepd", about = "Per-step IPC daemon")]
struct Args {
    /// Path to this step's TOML configuration file.
    #[arg(long)]
    config: PathBuf,
}

fn main() {
    let args = Args::parse();
    let config_text = match std::fs::read_to_string(&args.config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("reading {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };
    let config = match Config::from_toml(&config_text) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("parsing {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };

    let log = logging::init(config.log_dir.clone());

    if let Err(e) = lifecycle::install_signal_handlers() {
        error!(error = %e, "failed to install signal handlers");
        std::process::exit(1);
    }

    let bound = match lifecycle::startup(&config) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    let state = Arc::new(StepDaemonState::new(config.clone(), Arc::new(LocalCollab::new())).with_log(log));
    let counter = Arc::new(ConnectionCounter::new());
    let shutdown = lifecycle::ShutdownFlag::new();

    info!(job = state.step_id.job_id, step = %state.step_id, "step daemon starting");

    let poll_shutdown = std::thread::spawn({
        let shutdown = shutdown.clone();
        move || {
            while !lifecycle::poll_shutdown_requested() {
                std::thread::sleep(Duration::from_millis(100));
            }
            shutdown.request();
        }
    });

    listener::serve(bound.listener, state, shutdown, counter);
    lifecycle::unlink_socket(&config);
    let _ = poll_shutdown.join();
    info!("step daemon exited");
}
