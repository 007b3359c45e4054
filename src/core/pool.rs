//! # Worker identity and the pool state tracker.
//!
//! The tracker maintains the authoritative view of which workers exist and
//! what state they are in, using event sequence numbers to handle
//! out-of-order delivery.
//!
//! ## Architecture
//! ```text
//! Workers/SlotActors ──► Bus ──► supervisor listener ──► PoolTracker::update()
//!                                                              │
//!                                                              ▼
//!                                          HashMap<WorkerId, {seq, WorkerInfo}>
//! ```
//!
//! ## Rules
//! - Lifecycle events drive the five-state machine
//!   (Starting → Ready → Running → Terminating → Dead).
//! - Read operations (`snapshot`, `live`) are eventually consistent.
//! - Events with `seq <= last_seq` for a worker are rejected (stale).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Global counter backing worker identities.
static WORKER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity of one worker incarnation.
///
/// Monotonically increasing across the process: a respawned or reloaded
/// worker always carries a fresh id, the way a forked replacement carries
/// a fresh pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Allocates the next worker identity.
    pub fn next() -> Self {
        Self(WORKER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric form.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Lifecycle state of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned; boot hook in progress.
    Starting,
    /// Boot complete; accept loop armed.
    Ready,
    /// At least one connection accepted.
    Running,
    /// No longer accepting; draining in-flight requests.
    Terminating,
    /// Exited.
    Dead,
}

impl WorkerState {
    /// True for states that count toward the live pool size.
    pub fn is_live(&self) -> bool {
        matches!(self, WorkerState::Ready | WorkerState::Running)
    }
}

/// Point-in-time description of one worker.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Worker identity.
    pub id: WorkerId,
    /// Slot index within the pool.
    pub slot: usize,
    /// Pool generation the worker belongs to.
    pub generation: u32,
    /// Current state.
    pub state: WorkerState,
    /// Restart count of the slot when this worker was spawned.
    pub restarts: u32,
    /// When the worker was spawned.
    pub started_at: SystemTime,
}

struct Entry {
    last_seq: u64,
    info: WorkerInfo,
}

/// Sequence-ordered tracker of the worker pool.
///
/// Owned by the supervisor, fed through the subscriber fan-out, queried
/// by [`SupervisorHandle`](crate::SupervisorHandle).
pub struct PoolTracker {
    state: RwLock<HashMap<WorkerId, Entry>>,
}

impl PoolTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Applies one event if it is newer than the last seen for its worker.
    ///
    /// Returns true if the event was applied, false if it was stale or
    /// carried no state.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(id) = ev.worker else {
            return false;
        };
        let Some(next) = state_for(ev.kind) else {
            return false;
        };

        let mut state = self.state.write().await;
        let entry = state.entry(id).or_insert_with(|| Entry {
            last_seq: 0,
            info: WorkerInfo {
                id,
                slot: ev.slot.unwrap_or(0),
                generation: ev.generation.unwrap_or(0),
                state: WorkerState::Starting,
                restarts: ev.restarts.unwrap_or(0),
                started_at: ev.at,
            },
        });

        if ev.seq <= entry.last_seq && entry.last_seq != 0 {
            return false;
        }
        entry.last_seq = ev.seq;
        if let Some(slot) = ev.slot {
            entry.info.slot = slot;
        }
        if let Some(gen) = ev.generation {
            entry.info.generation = gen;
        }
        if let Some(restarts) = ev.restarts {
            entry.info.restarts = restarts;
        }
        entry.info.state = next;
        true
    }

    /// Returns all known workers, sorted by id.
    pub async fn snapshot(&self) -> Vec<WorkerInfo> {
        let state = self.state.read().await;
        let mut all: Vec<WorkerInfo> = state.values().map(|e| e.info.clone()).collect();
        all.sort_unstable_by_key(|w| w.id);
        all
    }

    /// Returns Ready/Running workers, sorted by id.
    pub async fn live(&self) -> Vec<WorkerInfo> {
        let state = self.state.read().await;
        let mut live: Vec<WorkerInfo> = state
            .values()
            .filter(|e| e.info.state.is_live())
            .map(|e| e.info.clone())
            .collect();
        live.sort_unstable_by_key(|w| w.id);
        live
    }

    /// Number of Ready/Running workers.
    pub async fn live_count(&self) -> usize {
        let state = self.state.read().await;
        state.values().filter(|e| e.info.state.is_live()).count()
    }
}

impl Default for PoolTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for PoolTracker {
    async fn on_event(&self, event: &Event) {
        self.update(event).await;
    }

    fn name(&self) -> &'static str {
        "pool-tracker"
    }

    fn queue_capacity(&self) -> usize {
        2048
    }
}

fn state_for(kind: EventKind) -> Option<WorkerState> {
    match kind {
        EventKind::WorkerStarting => Some(WorkerState::Starting),
        EventKind::WorkerReady => Some(WorkerState::Ready),
        EventKind::WorkerRunning => Some(WorkerState::Running),
        EventKind::WorkerDraining => Some(WorkerState::Terminating),
        EventKind::WorkerExited => Some(WorkerState::Dead),
        _ => None,
    }
}

/// Map from live worker ids to their incarnation kill tokens.
///
/// Lets the control surface terminate a specific worker the way a signal
/// would terminate a process: the token drops the worker's accept loop
/// and its in-flight connections immediately.
#[derive(Clone, Default)]
pub(crate) struct KillRegistry {
    inner: Arc<std::sync::RwLock<HashMap<WorkerId, CancellationToken>>>,
}

impl KillRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, id: WorkerId, token: CancellationToken) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(id, token);
        }
    }

    pub(crate) fn remove(&self, id: WorkerId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&id);
        }
    }

    /// Fires the kill token for `id`. Returns false for unknown ids.
    pub(crate) fn kill(&self, id: WorkerId) -> bool {
        let Ok(map) = self.inner.read() else {
            return false;
        };
        match map.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Fires every registered kill token (forced shutdown).
    pub(crate) fn kill_all(&self) {
        if let Ok(map) = self.inner.read() {
            for token in map.values() {
                token.cancel();
            }
        }
    }
}
