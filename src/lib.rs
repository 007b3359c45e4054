//! # servisor
//!
//! **Servisor** hosts a request/response application behind a supervised,
//! fixed-size worker pool — the operational model of a prefork WSGI
//! server, rendered on the async runtime.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                       ┌─────────────────────────────┐
//!                       │  Supervisor (control loop)  │
//!                       │  - binds the TcpListener    │
//!                       │  - Bus (broadcast events)   │
//!                       │  - PoolTracker (states)     │
//!                       │  - signal → action table    │
//!                       └──────┬──────┬──────┬────────┘
//!                              ▼      ▼      ▼
//!                       ┌─────────┐┌─────────┐┌─────────┐
//!                       │SlotActor││SlotActor││SlotActor│  (one per slot,
//!                       │(respawn)││(respawn)││(respawn)│   ×N)
//!                       └────┬────┘└────┬────┘└────┬────┘
//!                            ▼          ▼          ▼
//!                       ┌─────────┐┌─────────┐┌─────────┐
//!                       │ Worker  ││ Worker  ││ Worker  │  accept() on the
//!                       │ accept  ││ accept  ││ accept  │  shared listener,
//!                       │  loop   ││  loop   ││  loop   │  independently
//!                       └────┬────┘└────┬────┘└────┬────┘
//!                            ▼          ▼          ▼
//!                         Handler (the hosted application)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Supervisor::run()
//!   ├─► bind listener (BindError is fatal)
//!   ├─► spawn generation 1, wait for N × WorkerReady (boot timeout)
//!   └─► control loop:
//!         ├─ worker dies       ─► its SlotActor respawns it (fresh id,
//!         │                       restart count +1, optional backoff)
//!         ├─ SIGHUP / reload() ─► spawn generation g+1, wait ready,
//!         │                       then drain generation g
//!         │                       (not ready in time ─► keep g, report)
//!         ├─ SIGTERM / SIGINT  ─► graceful: drain within drain_timeout
//!         └─ SIGQUIT           ─► forced: drop connections immediately
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                              |
//! |-------------------|----------------------------------------------------------|----------------------------------------|
//! | **Application**   | The request/response contract the server hosts.          | [`Handler`], [`HandlerFn`], [`AppRequest`], [`AppResponse`] |
//! | **Supervision**   | Pool lifecycle, reload, shutdown, runtime control.       | [`Supervisor`], [`SupervisorHandle`]   |
//! | **Policies**      | Respawn delay growth and jitter.                         | [`BackoffPolicy`], [`JitterPolicy`]    |
//! | **Observability** | Lifecycle events, subscriber fan-out, log sinks.         | [`Event`], [`Subscribe`], [`LogSink`]  |
//! | **Errors**        | Runtime vs per-request failure taxonomy.                 | [`RuntimeError`], [`ServeError`]       |
//!
//! ## Example
//! ```no_run
//! use servisor::{AppRequest, AppResponse, HandlerFn, PoolConfig, ServeError, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = HandlerFn::arc(|_req: AppRequest| async {
//!         Ok::<_, ServeError>(AppResponse::text("hello"))
//!     });
//!
//!     let sup = Supervisor::builder(PoolConfig::default())
//!         .with_handler(app)
//!         .build()?;
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

mod app;
pub mod cli;
mod config;
mod core;
mod error;
mod events;
mod logs;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use app::{AppRequest, AppResponse, Handler, HandlerFn, HandlerRef};
pub use config::{PoolConfig, DEFAULT_PORT, DEFAULT_WORKERS};
pub use core::{
    Signal, Supervisor, SupervisorBuilder, SupervisorHandle, WorkerId, WorkerInfo, WorkerState,
};
pub use error::{RuntimeError, ServeError};
pub use events::{Bus, Event, EventKind};
pub use logs::{AccessRecord, LogSink, LogTarget};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use subscribers::{ErrorLogWriter, Subscribe, SubscriberSet};
