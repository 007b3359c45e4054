//! # Runtime events emitted by the supervisor, slot actors, and workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker lifecycle**: the per-worker state machine (starting, ready,
//!   running, draining, exited) plus respawn scheduling.
//! - **Pool management**: reload handover and its outcomes.
//! - **Shutdown**: signal receipt and drain results.
//! - **Subscriber diagnostics**: fan-out overflow and panics.
//!
//! The [`Event`] struct carries metadata: worker id, slot index, pool
//! generation, restart count, delays, and human-readable reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Consumers that may observe events out of order (the pool
//! tracker) use `seq` to reject stale updates.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::WorkerId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle events ===
    /// A worker incarnation is being spawned into its slot.
    ///
    /// Sets: `worker`, `slot`, `generation`, `restarts`, `at`, `seq`.
    WorkerStarting,

    /// The worker booted and armed its accept loop.
    ///
    /// Sets: `worker`, `slot`, `generation`, `at`, `seq`.
    WorkerReady,

    /// The worker accepted its first connection.
    ///
    /// Sets: `worker`, `slot`, `generation`, `at`, `seq`.
    WorkerRunning,

    /// The worker stopped accepting and is draining in-flight requests.
    ///
    /// Sets: `worker`, `slot`, `generation`, `at`, `seq`.
    WorkerDraining,

    /// The worker exited (gracefully, killed, or fatally).
    ///
    /// Sets: `worker`, `slot`, `generation`, `restarts`, `reason`,
    /// `at`, `seq`.
    WorkerExited,

    /// A replacement incarnation was scheduled after an unexpected exit.
    ///
    /// Sets: `slot`, `generation`, `restarts`, `delay_ms`, `at`, `seq`.
    RespawnScheduled,

    // === Pool management events ===
    /// A zero-downtime reload was requested.
    ///
    /// Sets: `generation` (the replacement generation), `at`, `seq`.
    ReloadRequested,

    /// The replacement set became ready; the old set is being retired.
    ///
    /// Sets: `generation`, `at`, `seq`.
    ReloadCompleted,

    /// The replacement set never became ready; the old set was kept.
    ///
    /// Sets: `generation`, `reason`, `at`, `seq`.
    ReloadAborted,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or control command).
    ///
    /// Sets: `reason` ("graceful" / "forced"), `at`, `seq`.
    ShutdownRequested,

    /// A drain window closed with requests still in flight; they were
    /// forcibly terminated.
    ///
    /// Sets: `worker`, `slot`, `generation`, `at`, `seq`.
    DrainExceeded,

    /// All workers stopped within the shutdown window.
    ///
    /// Sets: `at`, `seq`.
    AllStoppedWithin,

    // === Subscriber diagnostics ===
    /// A subscriber panicked during event processing.
    ///
    /// Sets: `reason`, `at`, `seq`.
    SubscriberPanicked,

    /// A subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`, `at`, `seq`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker identity, if applicable.
    pub worker: Option<WorkerId>,
    /// Slot index within the pool.
    pub slot: Option<usize>,
    /// Pool generation the event belongs to.
    pub generation: Option<u32>,
    /// Restart count of the slot at event time.
    pub restarts: Option<u32>,
    /// Respawn delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (exit causes, abort details, ...).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp
    /// and the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            slot: None,
            generation: None,
            restarts: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a worker identity.
    #[inline]
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches a slot index.
    #[inline]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Attaches a pool generation.
    #[inline]
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a restart count.
    #[inline]
    pub fn with_restarts(mut self, restarts: u32) -> Self {
        self.restarts = Some(restarts);
        self
    }

    /// Attaches a respawn delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }
}
