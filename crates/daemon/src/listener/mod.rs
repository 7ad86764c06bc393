// SPDX-License-Identifier: MIT

//! Accept Loop (spec.md §4.1): one blocking `accept()` loop, a worker
//! thread per connection, and a connection counter the main loop drains
//! before exiting.

mod counter;

pub use counter::ConnectionCounter;

use std::os::unix::net::UnixListener;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::lifecycle::ShutdownFlag;
use crate::protocol::session;
use crate::state::StepDaemonState;

/// How long the main loop waits, on socket teardown, for in-flight
/// workers to drain before exiting (spec.md §4.1 bullet on
/// `message_connections`).
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the accept loop until `shutdown` is requested. The listener must
/// be in non-blocking-adjacent mode via a short accept timeout so the
/// loop can observe the shutdown flag between connections; std's
/// `UnixListener` has no built-in accept timeout, so this polls with a
/// short sleep when `accept` would otherwise block forever — acceptable
/// since a step daemon accepts at most a handful of connections.
pub fn serve(
    listener: UnixListener,
    state: Arc<StepDaemonState>,
    shutdown: ShutdownFlag,
    counter: Arc<ConnectionCounter>,
) {
    listener.set_nonblocking(true).expect("set_nonblocking on step socket");
    loop {
        if shutdown.requested() {
            break;
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                let state = Arc::clone(&state);
                let counter = Arc::clone(&counter);
                counter.increment();
                std::thread::spawn(move || {
                    if let Err(e) = session::handle_connection(stream, &state) {
                        warn!(error = %e, "connection worker exited with error");
                    }
                    counter.decrement();
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                warn!(error = %e, "accept() failed");
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
    info!("accept loop exiting, draining in-flight connections");
    counter.wait_drain(DRAIN_TIMEOUT);
}
