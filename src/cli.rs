//! Command-line interface definitions using clap.

use clap::Parser;
use std::time::Duration;

use crate::config::PoolConfig;
use crate::error::RuntimeError;
use crate::logs::LogTarget;

/// Supervised worker-pool HTTP server.
///
/// Binds one listening socket, spawns a fixed pool of workers that accept
/// from it independently, and hosts the mounted application behind a
/// request/response contract. SIGHUP reloads the pool without dropping
/// in-flight requests; SIGTERM/SIGINT drain and exit; SIGQUIT exits
/// immediately.
#[derive(Parser, Debug)]
#[command(name = "servisor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of worker processes in the pool.
    #[arg(short = 'w', long, default_value_t = crate::config::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Address to bind, as host:port.
    #[arg(short = 'b', long, default_value = "0.0.0.0:8010")]
    pub bind: String,

    /// Access log destination: a file path, or `-` for stdout.
    #[arg(long, default_value = "-")]
    pub access_log: String,

    /// Error log destination: a file path, or `-` for stderr.
    #[arg(long, default_value = "-")]
    pub error_log: String,

    /// Capture application error output into the error log.
    #[arg(long)]
    pub capture_output: bool,

    /// Seconds in-flight requests get to finish during shutdown/reload.
    #[arg(long, default_value_t = 30)]
    pub drain_timeout: u64,

    /// Seconds a worker set gets to become ready (startup and reload).
    #[arg(long, default_value_t = 30)]
    pub boot_timeout: u64,
}

impl Cli {
    /// Translates parsed arguments into a validated [`PoolConfig`].
    pub fn into_config(self) -> Result<PoolConfig, RuntimeError> {
        let bind = self.bind.parse().map_err(|_| RuntimeError::Config {
            reason: format!("invalid bind address '{}' (expected host:port)", self.bind),
        })?;

        let cfg = PoolConfig {
            workers: self.workers,
            bind,
            access_log: LogTarget::parse(&self.access_log, LogTarget::Stdout),
            error_log: LogTarget::parse(&self.error_log, LogTarget::Stderr),
            capture_app_output: self.capture_output,
            drain_timeout: Duration::from_secs(self.drain_timeout),
            boot_timeout: Duration::from_secs(self.boot_timeout),
            ..PoolConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_the_stock_config() {
        let cli = Cli::parse_from(["servisor"]);
        let cfg = cli.into_config().expect("valid");
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.bind.port(), 8010);
        assert_eq!(cfg.access_log, LogTarget::Stdout);
        assert_eq!(cfg.error_log, LogTarget::Stderr);
        assert!(!cfg.capture_app_output);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "servisor",
            "-w",
            "8",
            "-b",
            "127.0.0.1:9000",
            "--access-log",
            "/tmp/access.log",
            "--error-log",
            "-",
            "--capture-output",
            "--drain-timeout",
            "5",
        ]);
        let cfg = cli.into_config().expect("valid");
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(
            cfg.access_log,
            LogTarget::File(std::path::PathBuf::from("/tmp/access.log"))
        );
        assert_eq!(cfg.error_log, LogTarget::Stderr);
        assert!(cfg.capture_app_output);
        assert_eq!(cfg.drain_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_bind_address_is_a_config_error() {
        let cli = Cli::parse_from(["servisor", "-b", "not-an-address"]);
        let err = cli.into_config().expect_err("must fail");
        assert_eq!(err.as_label(), "config_error");
    }

    #[test]
    fn zero_workers_rejected_at_translation() {
        let cli = Cli::parse_from(["servisor", "-w", "0"]);
        assert!(cli.into_config().is_err());
    }
}
