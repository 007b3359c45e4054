//! # SlotActor: supervises one pool slot.
//!
//! Runs successive worker incarnations in a single slot. Each unexpected
//! exit is replaced with a fresh worker identity; graceful retirement
//! ends the actor.
//!
//! ## Event flow
//! For each incarnation, the actor publishes:
//! ```text
//! WorkerStarting → [worker runs] → WorkerExited (reason: stopped/killed/fatal)
//!
//! If respawn due:
//!   → RespawnScheduled → [cancellable sleep] → (next incarnation, fresh id)
//! ```
//!
//! ## Rules
//! - Incarnations run **sequentially** within one slot (never parallel).
//! - The restart counter increments on every unexpected exit and never
//!   resets for the lifetime of the slot.
//! - Cancellation is honored at safe points: between incarnations and
//!   during the respawn sleep; a running worker observes the same token
//!   through its own suspension points.
//! - A dead worker is **always** replaced unless the generation is being
//!   retired; there is no crash-loop limit.

use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::pool::WorkerId;
use crate::core::worker::{Worker, WorkerShared};
use crate::events::{Event, EventKind};

/// Supervises one slot: spawn, observe exit, respawn.
pub(crate) struct SlotActor {
    pub slot: usize,
    pub generation: u32,
    pub shared: Arc<WorkerShared>,
}

impl SlotActor {
    /// Runs the slot until graceful retirement.
    pub(crate) async fn run(self, stop: CancellationToken) {
        let mut restarts: u32 = 0;

        loop {
            if stop.is_cancelled() {
                break;
            }

            let id = WorkerId::next();
            let kill = CancellationToken::new();
            let fatal = CancellationToken::new();
            self.shared.kills.insert(id, kill.clone());

            self.publish_slot(
                Event::now(EventKind::WorkerStarting)
                    .with_worker(id)
                    .with_restarts(restarts),
            );

            let worker = Worker {
                id,
                slot: self.slot,
                generation: self.generation,
                shared: Arc::clone(&self.shared),
                stop: stop.clone(),
                kill,
                fatal,
            };
            let exit = worker.run().await;
            self.shared.kills.remove(id);

            self.publish_slot(
                Event::now(EventKind::WorkerExited)
                    .with_worker(id)
                    .with_restarts(restarts)
                    .with_reason(exit.reason()),
            );

            if !exit.is_unexpected() || stop.is_cancelled() {
                break;
            }

            let delay = self.shared.backoff.next(restarts);
            restarts += 1;
            self.publish_slot(
                Event::now(EventKind::RespawnScheduled)
                    .with_restarts(restarts)
                    .with_delay(delay),
            );

            if !delay.is_zero() {
                tokio::select! {
                    _ = time::sleep(delay) => {}
                    _ = stop.cancelled() => break,
                }
            }
        }
    }

    fn publish_slot(&self, ev: Event) {
        self.shared
            .bus
            .publish(ev.with_slot(self.slot).with_generation(self.generation));
    }
}
