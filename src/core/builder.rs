//! Builder wiring the supervisor's runtime components together.

use std::sync::Arc;

use crate::app::HandlerRef;
use crate::config::PoolConfig;
use crate::core::pool::PoolTracker;
use crate::core::supervisor::Supervisor;
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::logs::LogSink;
use crate::subscribers::{ErrorLogWriter, Subscribe, SubscriberSet};

/// Builder for constructing a [`Supervisor`].
///
/// Must run inside a tokio runtime: building spawns the subscriber worker
/// tasks.
pub struct SupervisorBuilder {
    cfg: PoolConfig,
    handler: Option<HandlerRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            handler: None,
            subscribers: Vec::new(),
        }
    }

    /// Mounts the application (required).
    pub fn with_handler(mut self, handler: HandlerRef) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Adds custom event subscribers (metrics, audit, ...).
    ///
    /// The built-in error-log writer and pool tracker are always present.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration, opens the log sinks, and wires the
    /// event system.
    pub fn build(self) -> Result<Arc<Supervisor>, RuntimeError> {
        self.cfg.validate()?;
        let handler = self.handler.ok_or_else(|| RuntimeError::Config {
            reason: "no application handler mounted".into(),
        })?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let access = LogSink::open(&self.cfg.access_log)?;
        let errors = LogSink::open(&self.cfg.error_log)?;
        let pool = Arc::new(PoolTracker::new());

        let mut subscribers = self.subscribers;
        subscribers.push(Arc::new(ErrorLogWriter::new(errors.clone())));
        subscribers.push(Arc::clone(&pool) as Arc<dyn Subscribe>);
        let subs = Arc::new(SubscriberSet::new(subscribers));

        Ok(Supervisor::new_internal(
            self.cfg, bus, subs, pool, handler, access, errors,
        ))
    }
}
