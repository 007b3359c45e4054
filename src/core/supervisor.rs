//! # Supervisor: owns the pool lifecycle.
//!
//! The [`Supervisor`] binds the listening socket, spawns slot actors,
//! fans out events to subscribers, and runs the single control loop that
//! implements monitor/reload/shutdown.
//!
//! ## High-level architecture
//! ```text
//! run():
//!   bind listener ──► spawn generation 1 ──► wait for N × WorkerReady
//!                                                   │
//!                  ┌────────────────────────────────┘
//!                  ▼
//!   control loop (single task):
//!     select! {
//!       OS signal     ─► graceful/forced shutdown, reload
//!       Kill(id)      ─► fire the worker's kill token
//!       Reload        ─► spawn gen g+1, wait ready, retire gen g
//!       Shutdown      ─► break
//!     }
//!                  │
//!                  ▼
//!   retire current generation (drain-bounded) ──► AllStoppedWithin
//!                                             └─► DrainExceeded error
//! ```
//!
//! ## Rules
//! - All pool mutation happens on the control loop; workers communicate
//!   back only through exit events and the shared socket handle.
//! - Worker deaths are respawned by slot actors without supervisor
//!   involvement; the control loop merely observes the events.
//! - A failed reload leaves the prior generation untouched (no partial
//!   state).

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::app::HandlerRef;
use crate::config::PoolConfig;
use crate::core::pool::{KillRegistry, PoolTracker, WorkerId, WorkerInfo};
use crate::core::shutdown::{Signal, Signals};
use crate::core::slot::SlotActor;
use crate::core::worker::WorkerShared;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::logs::LogSink;
use crate::subscribers::SubscriberSet;

/// One spawned worker set. Reload replaces the whole generation.
struct Generation {
    number: u32,
    stop: CancellationToken,
    actors: Vec<JoinHandle<()>>,
}

/// Control commands accepted while running.
enum Command {
    Kill {
        id: WorkerId,
        reply: oneshot::Sender<bool>,
    },
    Reload {
        reply: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        graceful: bool,
    },
}

/// Coordinates slot actors, event delivery, and the shutdown/reload paths.
pub struct Supervisor {
    cfg: PoolConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    pool: Arc<PoolTracker>,
    handler: HandlerRef,
    access: LogSink,
    errors: LogSink,
    kills: KillRegistry,
    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: Mutex<Option<mpsc::Receiver<Command>>>,
    addr_tx: watch::Sender<Option<SocketAddr>>,
}

impl Supervisor {
    /// Starts building a supervisor for the given configuration.
    pub fn builder(cfg: PoolConfig) -> super::builder::SupervisorBuilder {
        super::builder::SupervisorBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: PoolConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        pool: Arc<PoolTracker>,
        handler: HandlerRef,
        access: LogSink,
        errors: LogSink,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (addr_tx, _) = watch::channel(None);
        Arc::new(Self {
            cfg,
            bus,
            subs,
            pool,
            handler,
            access,
            errors,
            kills: KillRegistry::new(),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            addr_tx,
        })
    }

    /// Returns a control handle, valid before and during `run`.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            cmd: self.cmd_tx.clone(),
            pool: Arc::clone(&self.pool),
            addr: self.addr_tx.subscribe(),
        }
    }

    /// The event bus (for custom integrations and tests).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Binds the configured address and serves until shutdown.
    ///
    /// Bind failures are fatal; see [`RuntimeError::is_startup_fatal`].
    pub async fn run(self: Arc<Self>) -> Result<(), RuntimeError> {
        let addr = self.cfg.bind;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RuntimeError::Bind { addr, source })?;
        self.run_on(listener).await
    }

    /// Serves on an already bound listener (useful for ephemeral ports).
    pub async fn run_on(self: Arc<Self>, listener: TcpListener) -> Result<(), RuntimeError> {
        let mut cmd_rx = self
            .cmd_rx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .ok_or(RuntimeError::AlreadyRunning)?;

        let mut signals = Signals::install().map_err(RuntimeError::SignalInstall)?;
        let _ = self.addr_tx.send(listener.local_addr().ok());
        self.spawn_subscriber_listener();

        let shared = Arc::new(WorkerShared {
            listener: Arc::new(listener),
            handler: Arc::clone(&self.handler),
            bus: self.bus.clone(),
            access: self.access.clone(),
            errors: self.errors.clone(),
            capture: self.cfg.capture_app_output,
            drain_timeout: self.cfg.drain_timeout,
            backoff: self.cfg.respawn_backoff,
            kills: self.kills.clone(),
        });

        // Boot the first generation; a pool that never becomes ready is a
        // startup failure.
        let ready_rx = self.bus.subscribe();
        let mut current = self.spawn_generation(&shared, 1);
        if !self.wait_ready(ready_rx, 1).await {
            current.stop.cancel();
            self.kills.kill_all();
            let _ = time::timeout(Duration::from_secs(1), join_all(current.actors)).await;
            return Err(RuntimeError::BootTimeout {
                timeout: self.cfg.boot_timeout,
            });
        }

        let graceful = loop {
            tokio::select! {
                sig = signals.recv() => match sig {
                    Signal::GracefulShutdown => {
                        self.bus
                            .publish(Event::now(EventKind::ShutdownRequested).with_reason("graceful"));
                        break true;
                    }
                    Signal::ForcedShutdown => {
                        self.bus
                            .publish(Event::now(EventKind::ShutdownRequested).with_reason("forced"));
                        break false;
                    }
                    Signal::Reload => {
                        // Outcome is reported through events and the error log.
                        let _ = self.do_reload(&shared, &mut current).await;
                    }
                },
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Kill { id, reply }) => {
                        let _ = reply.send(self.kills.kill(id));
                    }
                    Some(Command::Reload { reply }) => {
                        let _ = reply.send(self.do_reload(&shared, &mut current).await);
                    }
                    Some(Command::Shutdown { graceful }) => {
                        let reason = if graceful { "graceful" } else { "forced" };
                        self.bus
                            .publish(Event::now(EventKind::ShutdownRequested).with_reason(reason));
                        break graceful;
                    }
                    None => break true,
                },
            }
        };

        self.shutdown_pool(current, graceful).await
    }

    /// Forwards bus events to the subscriber fan-out.
    fn spawn_subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Spawns one slot actor per configured worker.
    fn spawn_generation(&self, shared: &Arc<WorkerShared>, number: u32) -> Generation {
        let stop = CancellationToken::new();
        let mut actors = Vec::with_capacity(self.cfg.workers);
        for slot in 0..self.cfg.workers {
            let actor = SlotActor {
                slot,
                generation: number,
                shared: Arc::clone(shared),
            };
            actors.push(tokio::spawn(actor.run(stop.child_token())));
        }
        Generation {
            number,
            stop,
            actors,
        }
    }

    /// Waits until `workers` distinct workers of `generation` report
    /// ready, bounded by the boot timeout.
    ///
    /// The receiver must have been subscribed before the generation was
    /// spawned so no ready event can be missed.
    async fn wait_ready(&self, mut rx: broadcast::Receiver<Event>, generation: u32) -> bool {
        let needed = self.cfg.workers;
        let outcome = time::timeout(self.cfg.boot_timeout, async move {
            let mut ready: HashSet<WorkerId> = HashSet::new();
            loop {
                match rx.recv().await {
                    Ok(ev)
                        if ev.kind == EventKind::WorkerReady
                            && ev.generation == Some(generation) =>
                    {
                        if let Some(id) = ev.worker {
                            ready.insert(id);
                            if ready.len() >= needed {
                                break true;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break false,
                }
            }
        })
        .await;
        matches!(outcome, Ok(true))
    }

    /// Zero-downtime reload: spawn a full replacement set, retire the old
    /// set only once the new one is ready; abort (keeping the old set) if
    /// it never is.
    async fn do_reload(
        &self,
        shared: &Arc<WorkerShared>,
        current: &mut Generation,
    ) -> Result<(), RuntimeError> {
        let next_number = current.number + 1;
        self.bus
            .publish(Event::now(EventKind::ReloadRequested).with_generation(next_number));

        let ready_rx = self.bus.subscribe();
        let next = self.spawn_generation(shared, next_number);

        if self.wait_ready(ready_rx, next_number).await {
            let old = std::mem::replace(current, next);
            self.bus
                .publish(Event::now(EventKind::ReloadCompleted).with_generation(next_number));
            self.retire(old).await;
            Ok(())
        } else {
            self.retire(next).await;
            self.bus.publish(
                Event::now(EventKind::ReloadAborted)
                    .with_generation(next_number)
                    .with_reason("replacement workers not ready"),
            );
            Err(RuntimeError::ReloadFailed {
                timeout: self.cfg.boot_timeout,
            })
        }
    }

    /// Stops a generation and waits for its actors.
    ///
    /// Workers enforce the drain timeout themselves; the extra margin here
    /// is a backstop against a wedged actor. Returns true if everything
    /// joined in time.
    async fn retire(&self, gen: Generation) -> bool {
        gen.stop.cancel();
        let backstop = self.cfg.drain_timeout + Duration::from_secs(2);
        time::timeout(backstop, join_all(gen.actors)).await.is_ok()
    }

    /// Final teardown of the serving generation.
    async fn shutdown_pool(
        &self,
        gen: Generation,
        graceful: bool,
    ) -> Result<(), RuntimeError> {
        if !graceful {
            self.kills.kill_all();
        }
        if self.retire(gen).await {
            self.bus.publish(Event::now(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            let stuck: Vec<WorkerId> = self.pool.live().await.into_iter().map(|w| w.id).collect();
            self.kills.kill_all();
            Err(RuntimeError::DrainExceeded {
                timeout: self.cfg.drain_timeout,
                stuck,
            })
        }
    }
}

/// Control surface over a running supervisor.
///
/// Cheap to clone pieces: commands go over the control channel, pool
/// queries read the tracker directly.
pub struct SupervisorHandle {
    cmd: mpsc::Sender<Command>,
    pool: Arc<PoolTracker>,
    addr: watch::Receiver<Option<SocketAddr>>,
}

impl SupervisorHandle {
    /// Waits for the listener to be bound and returns its address.
    ///
    /// Returns `None` if the supervisor stops before binding.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.addr.clone();
        loop {
            if let Some(addr) = *rx.borrow() {
                return Some(addr);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// All known workers (including dead ones), sorted by id.
    pub async fn snapshot(&self) -> Vec<WorkerInfo> {
        self.pool.snapshot().await
    }

    /// Ready/Running workers, sorted by id.
    pub async fn live_workers(&self) -> Vec<WorkerInfo> {
        self.pool.live().await
    }

    /// Number of Ready/Running workers.
    pub async fn live_count(&self) -> usize {
        self.pool.live_count().await
    }

    /// Terminates one worker as a crash (its slot respawns it).
    ///
    /// Returns false if the worker id is not currently live.
    pub async fn kill(&self, id: WorkerId) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd
            .send(Command::Kill { id, reply: tx })
            .await
            .map_err(|_| RuntimeError::NotRunning)?;
        rx.await.map_err(|_| RuntimeError::NotRunning)
    }

    /// Requests a zero-downtime reload and waits for its outcome.
    pub async fn reload(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd
            .send(Command::Reload { reply: tx })
            .await
            .map_err(|_| RuntimeError::NotRunning)?;
        rx.await.map_err(|_| RuntimeError::NotRunning)?
    }

    /// Requests shutdown; `run` returns once teardown completes.
    pub async fn shutdown(&self, graceful: bool) -> Result<(), RuntimeError> {
        self.cmd
            .send(Command::Shutdown { graceful })
            .await
            .map_err(|_| RuntimeError::NotRunning)
    }
}

impl Clone for SupervisorHandle {
    fn clone(&self) -> Self {
        Self {
            cmd: self.cmd.clone(),
            pool: Arc::clone(&self.pool),
            addr: self.addr.clone(),
        }
    }
}
