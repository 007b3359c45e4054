//! # OS signal handling and the signal → action mapping table.
//!
//! Translates process signals into supervisor actions. The mapping is a
//! pure table, evaluated synchronously by the control loop; no hidden
//! global handlers.
//!
//! ## Mapping
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C) → graceful shutdown
//! - `SIGTERM` (default kill, systemd/Kubernetes) → graceful shutdown
//! - `SIGQUIT` → forced shutdown
//! - `SIGHUP` → zero-downtime reload
//!
//! **Non-Unix platforms:**
//! - `Ctrl-C` → graceful shutdown (the only signal available)

use std::io;

/// Raw signal classification, decoupled from the OS layer for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SigKind {
    Interrupt,
    Terminate,
    Quit,
    Hangup,
}

/// Supervisor action requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop accepting, drain in-flight requests, then exit.
    GracefulShutdown,
    /// Terminate workers immediately.
    ForcedShutdown,
    /// Replace the worker set without dropping in-flight requests.
    Reload,
}

impl Signal {
    /// The signal → action table.
    pub(crate) fn for_kind(kind: SigKind) -> Signal {
        match kind {
            SigKind::Interrupt | SigKind::Terminate => Signal::GracefulShutdown,
            SigKind::Quit => Signal::ForcedShutdown,
            SigKind::Hangup => Signal::Reload,
        }
    }
}

/// Installed signal listeners, polled by the control loop.
#[cfg(unix)]
pub(crate) struct Signals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    /// Installs listeners for all mapped signals.
    pub(crate) fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Waits for the next signal and returns the mapped action.
    pub(crate) async fn recv(&mut self) -> Signal {
        let kind = tokio::select! {
            _ = self.sigint.recv() => SigKind::Interrupt,
            _ = self.sigterm.recv() => SigKind::Terminate,
            _ = self.sigquit.recv() => SigKind::Quit,
            _ = self.sighup.recv() => SigKind::Hangup,
        };
        Signal::for_kind(kind)
    }
}

/// Installed signal listeners, polled by the control loop.
#[cfg(not(unix))]
pub(crate) struct Signals;

#[cfg(not(unix))]
impl Signals {
    /// Installs the Ctrl-C listener.
    pub(crate) fn install() -> io::Result<Self> {
        Ok(Self)
    }

    /// Waits for Ctrl-C and maps it to a graceful shutdown.
    pub(crate) async fn recv(&mut self) -> Signal {
        let _ = tokio::signal::ctrl_c().await;
        Signal::for_kind(SigKind::Interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_table() {
        assert_eq!(Signal::for_kind(SigKind::Interrupt), Signal::GracefulShutdown);
        assert_eq!(Signal::for_kind(SigKind::Terminate), Signal::GracefulShutdown);
        assert_eq!(Signal::for_kind(SigKind::Quit), Signal::ForcedShutdown);
        assert_eq!(Signal::for_kind(SigKind::Hangup), Signal::Reload);
    }
}
