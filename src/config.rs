//! # Worker-pool configuration.
//!
//! Provides [`PoolConfig`], the immutable settings the supervisor runs
//! with. Built once at startup (usually from CLI arguments via
//! [`crate::cli::Cli`]); never mutated afterwards.
//!
//! ## Field semantics
//! - `workers`: fixed pool size (must be >= 1; default 4)
//! - `bind`: listening address (default `0.0.0.0:8010`)
//! - `access_log` / `error_log`: line sinks (`-` convention handled by the CLI)
//! - `capture_app_output`: route handler error chains and panic payloads
//!   into the error log
//! - `drain_timeout`: bound on in-flight requests during shutdown/reload
//! - `boot_timeout`: bound on a worker set reaching ready (startup and reload)
//! - `respawn_backoff`: delay policy between deaths in one slot
//! - `bus_capacity`: event-bus ring buffer size (min 1; clamped)

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::logs::LogTarget;
use crate::policies::BackoffPolicy;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 4;
/// Default listening port.
pub const DEFAULT_PORT: u16 = 8010;

/// Immutable configuration for the supervisor runtime.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Fixed worker-pool size.
    pub workers: usize,

    /// Address the shared listening socket binds to.
    pub bind: SocketAddr,

    /// Destination for access-log lines (one per completed request).
    pub access_log: LogTarget,

    /// Destination for lifecycle and failure lines.
    pub error_log: LogTarget,

    /// When set, handler error chains and panic payloads are written to
    /// the error log; otherwise only summary lines are.
    pub capture_app_output: bool,

    /// Maximum time in-flight requests get to finish when a worker stops
    /// accepting (shutdown and reload). Requests over the bound are
    /// forcibly terminated.
    pub drain_timeout: Duration,

    /// Maximum time a worker set gets to reach ready. Exceeding it fails
    /// startup ([`RuntimeError::BootTimeout`]) or aborts a reload
    /// ([`RuntimeError::ReloadFailed`]).
    pub boot_timeout: Duration,

    /// Delay policy between worker deaths in one slot. The default
    /// respawns immediately.
    pub respawn_backoff: BackoffPolicy,

    /// Capacity of the event bus ring buffer. Slow subscribers that lag
    /// behind further than this skip older events.
    pub bus_capacity: usize,
}

impl PoolConfig {
    /// Validates the configuration; called by the builder.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.workers == 0 {
            return Err(RuntimeError::Config {
                reason: "worker count must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `workers = 4`
    /// - `bind = 0.0.0.0:8010`
    /// - `access_log = stdout`, `error_log = stderr`
    /// - `capture_app_output = false`
    /// - `drain_timeout = 30s`, `boot_timeout = 30s`
    /// - `respawn_backoff = immediate`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            access_log: LogTarget::Stdout,
            error_log: LogTarget::Stderr,
            capture_app_output: false,
            drain_timeout: Duration::from_secs(30),
            boot_timeout: Duration::from_secs(30),
            respawn_backoff: BackoffPolicy::default(),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_launch_contract() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.bind.port(), 8010);
        assert_eq!(cfg.access_log, LogTarget::Stdout);
        assert_eq!(cfg.error_log, LogTarget::Stderr);
        assert!(cfg.respawn_backoff.is_immediate());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let cfg = PoolConfig {
            workers: 0,
            ..PoolConfig::default()
        };
        let err = cfg.validate().expect_err("must reject");
        assert_eq!(err.as_label(), "config_error");
    }

    #[test]
    fn bus_capacity_clamps_to_one() {
        let cfg = PoolConfig {
            bus_capacity: 0,
            ..PoolConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
