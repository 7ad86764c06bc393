// SPDX-License-Identifier: MIT

//! Logging setup (SPEC_FULL.md ambient stack: structured logging via
//! `tracing` + `tracing-subscriber`, file output via `tracing-appender`).
//! `STEP_RECONFIGURE` needs to re-open the log file after external log
//! rotation (spec.md §4.6); `tracing_appender::rolling` writers reopen
//! their target path lazily on the next write, so "reopen" here just
//! means swapping in a fresh writer bound to the same path.

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::reload;

type ReloadHandle = reload::Handle<BoxMakeWriter, tracing_subscriber::Registry>;

/// Holds the pieces needed to rebuild the log writer on `STEP_RECONFIGURE`
/// without restarting the process.
pub struct LogHandle {
    log_dir: Option<PathBuf>,
    handle: ReloadHandle,
    // Keeps the non-blocking writer's flush thread alive for the daemon's
    // lifetime; dropping it would silently stop flushing.
    _guard: Mutex<Option<WorkerGuard>>,
}

fn make_writer(log_dir: Option<&PathBuf>) -> (BoxMakeWriter, Option<WorkerGuard>) {
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "stepd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    }
}

/// Build a [`LogHandle`] and install it as the global subscriber. The
/// daemon binary calls this once at startup; tests that only need a
/// handle to pass to a reconfigure handler can call [`LogHandle::detached`]
/// instead, which skips the (process-global, one-shot) subscriber install.
pub fn init(log_dir: Option<PathBuf>) -> LogHandle {
    let (handle, layer) = build(log_dir);
    let subscriber = tracing_subscriber::registry().with(LevelFilter::INFO).with(layer);
    tracing::subscriber::set_global_default(subscriber).expect("install global tracing subscriber");
    handle
}

fn build(log_dir: Option<PathBuf>) -> (LogHandle, impl tracing_subscriber::Layer<tracing_subscriber::Registry>) {
    let (writer, guard) = make_writer(log_dir.as_ref());
    let (reload_layer, handle) = reload::Layer::new(writer);
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(reload_layer);
    (LogHandle { log_dir, handle, _guard: Mutex::new(guard) }, fmt_layer)
}

impl LogHandle {
    /// A [`LogHandle`] not wired into any installed subscriber. `reopen`
    /// still works (it just reloads a layer nothing reads from), which is
    /// all `StepDaemonState` construction in tests needs.
    pub fn detached(log_dir: Option<PathBuf>) -> Self {
        build(log_dir).0
    }

    pub fn reopen(&self) -> Result<(), reload::Error> {
        let (writer, guard) = make_writer(self.log_dir.as_ref());
        self.handle.reload(writer)?;
        *self._guard.lock() = guard;
        tracing::info!(log_dir = ?self.log_dir, "log file reopened");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::Layer;

    /// Flips to true the first time an `INFO`-level event passes through.
    struct InfoSeen(Arc<AtomicBool>);

    impl<S: tracing::Subscriber> Layer<S> for InfoSeen {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::INFO {
                self.0.store(true, Ordering::SeqCst);
            }
        }
    }

    /// spec.md §2 "Reconfigure log-reopen observability", property 13: a
    /// successful reopen emits an info-level tracing event.
    #[test]
    fn reopen_emits_info_event_on_success() {
        let seen = Arc::new(AtomicBool::new(false));
        let subscriber = tracing_subscriber::registry().with(InfoSeen(seen.clone()));
        let handle = LogHandle::detached(None);
        tracing::subscriber::with_default(subscriber, || {
            handle.reopen().unwrap();
        });
        assert!(seen.load(Ordering::SeqCst));
    }
}
