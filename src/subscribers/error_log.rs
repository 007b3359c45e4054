//! # Error-log writer: renders lifecycle events as error-log lines.
//!
//! [`ErrorLogWriter`] is the built-in subscriber that turns bus events
//! into operator-facing lines on the error sink:
//!
//! ```text
//! [2026-08-06T12:00:00.000Z] [info] worker w3 ready (slot 1, gen 1)
//! [2026-08-06T12:00:07.412Z] [error] worker w3 exited: killed (slot 1, gen 1, restarts 0)
//! [2026-08-06T12:00:07.412Z] [info] respawning slot 1 in 0ms (restarts 1)
//! ```
//!
//! Per-request failure lines are not produced here: workers write those
//! directly so that every handler failure yields exactly one line even
//! when the bus lags.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::logs::{error_line, LogSink};

use super::Subscribe;

/// Built-in subscriber writing lifecycle events to the error log.
pub struct ErrorLogWriter {
    sink: LogSink,
}

impl ErrorLogWriter {
    /// Creates a writer targeting the given sink.
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }

    fn render(event: &Event) -> Option<(&'static str, String)> {
        let worker = event
            .worker
            .map(|w| w.to_string())
            .unwrap_or_else(|| "?".into());
        let slot = event.slot.unwrap_or(usize::MAX);
        let gen = event.generation.unwrap_or(0);

        match event.kind {
            EventKind::WorkerStarting => Some((
                "info",
                format!(
                    "worker {worker} starting (slot {slot}, gen {gen}, restarts {})",
                    event.restarts.unwrap_or(0)
                ),
            )),
            EventKind::WorkerReady => Some((
                "info",
                format!("worker {worker} ready (slot {slot}, gen {gen})"),
            )),
            EventKind::WorkerRunning => Some((
                "info",
                format!("worker {worker} serving (slot {slot}, gen {gen})"),
            )),
            EventKind::WorkerDraining => Some((
                "info",
                format!("worker {worker} draining (slot {slot}, gen {gen})"),
            )),
            EventKind::WorkerExited => {
                let reason = event.reason.as_deref().unwrap_or("unknown");
                let level = if reason == "stopped" { "info" } else { "error" };
                Some((
                    level,
                    format!(
                        "worker {worker} exited: {reason} (slot {slot}, gen {gen}, restarts {})",
                        event.restarts.unwrap_or(0)
                    ),
                ))
            }
            EventKind::RespawnScheduled => Some((
                "info",
                format!(
                    "respawning slot {slot} in {}ms (restarts {})",
                    event.delay_ms.unwrap_or(0),
                    event.restarts.unwrap_or(0)
                ),
            )),
            EventKind::ReloadRequested => {
                Some(("info", format!("reload requested (next gen {gen})")))
            }
            EventKind::ReloadCompleted => Some((
                "info",
                format!("reload complete (gen {gen} serving, retiring previous)"),
            )),
            EventKind::ReloadAborted => Some((
                "error",
                format!(
                    "reload aborted: {} (keeping previous pool)",
                    event.reason.as_deref().unwrap_or("replacement not ready")
                ),
            )),
            EventKind::ShutdownRequested => Some((
                "info",
                format!(
                    "shutdown requested ({})",
                    event.reason.as_deref().unwrap_or("graceful")
                ),
            )),
            EventKind::DrainExceeded => Some((
                "error",
                format!("worker {worker} drain window exceeded; terminating in-flight requests"),
            )),
            EventKind::AllStoppedWithin => {
                Some(("info", "all workers stopped within shutdown window".into()))
            }
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => Some((
                "error",
                event.reason.as_deref().unwrap_or("subscriber fault").into(),
            )),
        }
    }
}

#[async_trait]
impl Subscribe for ErrorLogWriter {
    async fn on_event(&self, event: &Event) {
        if let Some((level, message)) = Self::render(event) {
            self.sink.write_line(&error_line(level, &message));
        }
    }

    fn name(&self) -> &'static str {
        "errorlog"
    }

    fn queue_capacity(&self) -> usize {
        2048
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkerId;

    #[test]
    fn exit_reason_drives_level() {
        let stopped = Event::now(EventKind::WorkerExited)
            .with_worker(WorkerId::next())
            .with_slot(0)
            .with_generation(1)
            .with_reason("stopped");
        let (level, _) = ErrorLogWriter::render(&stopped).unwrap();
        assert_eq!(level, "info");

        let killed = Event::now(EventKind::WorkerExited)
            .with_worker(WorkerId::next())
            .with_slot(0)
            .with_generation(1)
            .with_reason("killed");
        let (level, msg) = ErrorLogWriter::render(&killed).unwrap();
        assert_eq!(level, "error");
        assert!(msg.contains("exited: killed"));
    }

    #[test]
    fn every_kind_renders() {
        for kind in [
            EventKind::WorkerStarting,
            EventKind::WorkerReady,
            EventKind::WorkerRunning,
            EventKind::WorkerDraining,
            EventKind::WorkerExited,
            EventKind::RespawnScheduled,
            EventKind::ReloadRequested,
            EventKind::ReloadCompleted,
            EventKind::ReloadAborted,
            EventKind::ShutdownRequested,
            EventKind::DrainExceeded,
            EventKind::AllStoppedWithin,
        ] {
            assert!(ErrorLogWriter::render(&Event::now(kind)).is_some());
        }
    }
}
