//! Error types used by the servisor runtime and request serving.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the supervision runtime itself.
//! - [`ServeError`] — errors raised while serving individual requests.
//!
//! Both types provide `as_label()` for stable log labels. Per-request
//! errors never cross the worker boundary as anything but a log line;
//! only whole-worker exit is visible to the supervisor.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::core::WorkerId;

/// # Errors produced by the supervision runtime.
///
/// Startup errors (`Bind`, `LogOpen`, `BootTimeout`, `SignalInstall`,
/// `Config`) are fatal: the process exits non-zero. `ReloadFailed` and
/// `DrainExceeded` are operational: they are reported and the runtime
/// keeps (or finishes with) a consistent pool.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Listening socket could not be bound (address in use, permissions).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configured log destination could not be opened.
    #[error("failed to open log destination {target}: {source}")]
    LogOpen {
        /// Display form of the destination.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The initial worker pool never became ready.
    #[error("worker pool failed to become ready within {timeout:?}")]
    BootTimeout {
        /// The configured boot timeout.
        timeout: Duration,
    },

    /// A reload was aborted: the replacement set never became ready.
    /// The previous pool is kept running.
    #[error("reload aborted: replacement workers not ready within {timeout:?}; keeping previous pool")]
    ReloadFailed {
        /// The configured boot timeout.
        timeout: Duration,
    },

    /// Graceful shutdown overran the drain window; remaining workers were
    /// force-terminated.
    #[error("drain timeout {timeout:?} exceeded; stuck workers: {stuck:?}; forcing termination")]
    DrainExceeded {
        /// The configured drain timeout.
        timeout: Duration,
        /// Workers still live when the window closed.
        stuck: Vec<WorkerId>,
    },

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    SignalInstall(#[source] std::io::Error),

    /// Invalid configuration (zero workers, unparseable bind address, ...).
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong.
        reason: String,
    },

    /// `run()` was called on a supervisor that is already running.
    #[error("supervisor is already running")]
    AlreadyRunning,

    /// A control operation was issued but the supervisor is not running.
    #[error("supervisor is not running")]
    NotRunning,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Bind { .. } => "bind_error",
            RuntimeError::LogOpen { .. } => "log_open_error",
            RuntimeError::BootTimeout { .. } => "boot_timeout",
            RuntimeError::ReloadFailed { .. } => "reload_failed",
            RuntimeError::DrainExceeded { .. } => "drain_exceeded",
            RuntimeError::SignalInstall(_) => "signal_install_error",
            RuntimeError::Config { .. } => "config_error",
            RuntimeError::AlreadyRunning => "already_running",
            RuntimeError::NotRunning => "not_running",
        }
    }

    /// True for errors that prevent the server from starting at all.
    ///
    /// The binary maps these to a non-zero exit code; operational errors
    /// (failed reload, drain overrun) still end in a completed shutdown.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::Bind { .. }
                | RuntimeError::LogOpen { .. }
                | RuntimeError::BootTimeout { .. }
                | RuntimeError::SignalInstall(_)
                | RuntimeError::Config { .. }
                | RuntimeError::AlreadyRunning
        )
    }
}

/// # Errors produced while serving a request.
///
/// `Fail` is contained: the client gets a generic error response and the
/// worker keeps serving. `Fatal` also produces the error response, but the
/// worker then exits and is respawned by its slot actor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServeError {
    /// Handler failed for this request; the worker survives.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable handler failure (e.g. resource exhaustion); the
    /// worker exits after responding.
    #[error("fatal handler error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Request was canceled by a drain during shutdown or reload.
    #[error("request canceled during drain")]
    Canceled,
}

impl ServeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServeError::Fail { .. } => "handler_failed",
            ServeError::Fatal { .. } => "handler_fatal",
            ServeError::Canceled => "request_canceled",
        }
    }

    /// True if this failure should take the worker down with it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServeError::Fatal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_labels_are_stable() {
        let err = RuntimeError::BootTimeout {
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.as_label(), "boot_timeout");

        let err = RuntimeError::DrainExceeded {
            timeout: Duration::from_secs(30),
            stuck: vec![],
        };
        assert_eq!(err.as_label(), "drain_exceeded");
    }

    #[test]
    fn startup_classification() {
        let bind = RuntimeError::Bind {
            addr: "127.0.0.1:8010".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_startup_fatal());

        let reload = RuntimeError::ReloadFailed {
            timeout: Duration::from_secs(30),
        };
        assert!(!reload.is_startup_fatal());
    }

    #[test]
    fn fatal_serve_errors_take_the_worker_down() {
        assert!(!ServeError::Fail { error: "boom".into() }.is_fatal());
        assert!(ServeError::Fatal { error: "oom".into() }.is_fatal());
        assert!(!ServeError::Canceled.is_fatal());
    }
}
