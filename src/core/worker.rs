//! # The worker: boot, accept loop, drain.
//!
//! A worker is one incarnation serving requests from the shared listening
//! socket. Cancellation is checked at suspension points only:
//!
//! ```text
//! boot() ──► WorkerReady ──► loop {
//!   select! {
//!     stop  ─► exit Stopped (drain in-flight, bounded)
//!     kill  ─► exit Killed  (drop in-flight immediately)
//!     fatal ─► exit Fatal   (in-flight finish on their own)
//!     accept ─► spawn serve_connection on the tracker
//!   }
//! }
//! ```
//!
//! ## Rules
//! - The accept call is the worker's sole steady-state suspension point.
//! - Transient accept errors pause briefly and never propagate; sibling
//!   workers are unaffected because each runs its own loop.
//! - A graceful exit drains tracked connections within the drain timeout,
//!   then force-terminates the rest and reports `DrainExceeded`.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::app::HandlerRef;
use crate::core::conn::{serve_connection, ConnShared};
use crate::core::pool::{KillRegistry, WorkerId};
use crate::events::{Bus, Event, EventKind};
use crate::logs::{error_line, LogSink};
use crate::policies::BackoffPolicy;

/// Pause after a failed `accept()` before retrying.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Everything a generation of workers shares; built once per `run_on`.
pub(crate) struct WorkerShared {
    pub listener: Arc<TcpListener>,
    pub handler: HandlerRef,
    pub bus: Bus,
    pub access: LogSink,
    pub errors: LogSink,
    pub capture: bool,
    pub drain_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub kills: KillRegistry,
}

/// How a worker ended.
#[derive(Debug, Clone)]
pub(crate) enum WorkerExit {
    /// Graceful retirement (generation stop).
    Stopped,
    /// Kill token fired (operator kill or forced shutdown).
    Killed,
    /// Fatal classification: boot failure or fatal handler error.
    Fatal(String),
}

impl WorkerExit {
    /// Reason string carried on the `WorkerExited` event.
    pub(crate) fn reason(&self) -> String {
        match self {
            WorkerExit::Stopped => "stopped".into(),
            WorkerExit::Killed => "killed".into(),
            WorkerExit::Fatal(msg) => format!("fatal: {msg}"),
        }
    }

    /// True for exits the slot actor must respawn after.
    pub(crate) fn is_unexpected(&self) -> bool {
        !matches!(self, WorkerExit::Stopped)
    }
}

/// One worker incarnation.
pub(crate) struct Worker {
    pub id: WorkerId,
    pub slot: usize,
    pub generation: u32,
    pub shared: Arc<WorkerShared>,
    /// Generation-level graceful stop (stop accepting, drain).
    pub stop: CancellationToken,
    /// Incarnation kill (immediate, drops connections).
    pub kill: CancellationToken,
    /// Fired by a connection on a fatal handler error.
    pub fatal: CancellationToken,
}

impl Worker {
    /// Runs the worker to completion and returns how it ended.
    pub(crate) async fn run(self) -> WorkerExit {
        match self.boot().await {
            Ok(()) => {}
            Err(exit) => return exit,
        }

        self.publish(EventKind::WorkerReady);

        let tracker = TaskTracker::new();
        let conn_shared = Arc::new(ConnShared {
            handler: Arc::clone(&self.shared.handler),
            access: self.shared.access.clone(),
            errors: self.shared.errors.clone(),
            capture: self.shared.capture,
            worker: self.id,
            fatal: self.fatal.clone(),
        });

        let mut running = false;
        let exit = loop {
            tokio::select! {
                _ = self.stop.cancelled() => break WorkerExit::Stopped,
                _ = self.kill.cancelled() => break WorkerExit::Killed,
                _ = self.fatal.cancelled() => {
                    break WorkerExit::Fatal("handler reported an unrecoverable error".into());
                }
                accepted = self.shared.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if !running {
                            running = true;
                            self.publish(EventKind::WorkerRunning);
                        }
                        tracker.spawn(serve_connection(
                            Arc::clone(&conn_shared),
                            stream,
                            peer,
                            self.stop.clone(),
                            self.kill.clone(),
                        ));
                    }
                    Err(err) => {
                        self.shared.errors.write_line(&error_line(
                            "warning",
                            &format!("worker {}: accept failed: {err}; pausing", self.id),
                        ));
                        tokio::select! {
                            _ = time::sleep(ACCEPT_ERROR_PAUSE) => {}
                            _ = self.stop.cancelled() => break WorkerExit::Stopped,
                            _ = self.kill.cancelled() => break WorkerExit::Killed,
                        }
                    }
                }
            }
        };

        tracker.close();
        if matches!(exit, WorkerExit::Stopped) {
            self.drain(&tracker).await;
        }
        // Killed: connections die with the kill token. Fatal: in-flight
        // responses flush on their own while the replacement boots.
        exit
    }

    /// Runs the application's per-worker boot hook, cancellable.
    async fn boot(&self) -> Result<(), WorkerExit> {
        tokio::select! {
            res = self.shared.handler.boot() => match res {
                Ok(()) => Ok(()),
                Err(err) => {
                    self.shared.errors.write_line(&error_line(
                        "error",
                        &format!("worker {}: boot failed: {err}", self.id),
                    ));
                    Err(WorkerExit::Fatal(format!("boot failed: {err}")))
                }
            },
            _ = self.stop.cancelled() => Err(WorkerExit::Stopped),
            _ = self.kill.cancelled() => Err(WorkerExit::Killed),
        }
    }

    /// Bounded drain: in-flight requests get `drain_timeout`, the rest
    /// are forcibly terminated.
    async fn drain(&self, tracker: &TaskTracker) {
        self.publish(EventKind::WorkerDraining);
        if time::timeout(self.shared.drain_timeout, tracker.wait())
            .await
            .is_err()
        {
            self.publish(EventKind::DrainExceeded);
            self.kill.cancel();
            tracker.wait().await;
        }
    }

    fn publish(&self, kind: EventKind) {
        self.shared.bus.publish(
            Event::now(kind)
                .with_worker(self.id)
                .with_slot(self.slot)
                .with_generation(self.generation),
        );
    }
}
