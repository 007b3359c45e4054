//! # Log destinations and the shared line sink.
//!
//! [`LogTarget`] names where a log stream goes: standard output, standard
//! error, or an append-mode file. The CLI convention is the usual `-`
//! placeholder (stdout for the access log, stderr for the error log).
//!
//! [`LogSink`] is a cheaply cloneable handle writing whole lines to one
//! target. Writes are best-effort: a full disk or closed pipe must never
//! take a worker down, so write errors are swallowed.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::RuntimeError;

/// Where a log stream is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogTarget {
    /// The process' standard output.
    Stdout,
    /// The process' standard error.
    Stderr,
    /// An append-mode file at the given path.
    File(PathBuf),
}

impl LogTarget {
    /// Parses a CLI destination: `-` maps to `default_stream`, anything
    /// else is a file path.
    pub fn parse(raw: &str, default_stream: LogTarget) -> LogTarget {
        if raw == "-" {
            default_stream
        } else {
            LogTarget::File(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTarget::Stdout => f.write_str("<stdout>"),
            LogTarget::Stderr => f.write_str("<stderr>"),
            LogTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

enum SinkInner {
    Stdout,
    Stderr,
    File(BufWriter<File>),
}

/// Shared handle to one log destination.
///
/// Clones share the same underlying writer; each `write_line` appends a
/// newline and flushes, so a line is the unit of interleaving between
/// workers.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<SinkInner>>,
}

impl LogSink {
    /// Opens the sink for the given target.
    ///
    /// File targets are created if missing and opened in append mode, so
    /// a restarted server keeps extending its previous logs.
    pub fn open(target: &LogTarget) -> Result<Self, RuntimeError> {
        let inner = match target {
            LogTarget::Stdout => SinkInner::Stdout,
            LogTarget::Stderr => SinkInner::Stderr,
            LogTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| RuntimeError::LogOpen {
                        target: target.to_string(),
                        source,
                    })?;
                SinkInner::File(BufWriter::new(file))
            }
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Writes one line (a trailing newline is appended) and flushes.
    ///
    /// Best-effort: write failures are ignored.
    pub fn write_line(&self, line: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let _ = match &mut *inner {
            SinkInner::Stdout => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                writeln!(out, "{line}").and_then(|_| out.flush())
            }
            SinkInner::Stderr => {
                let stderr = io::stderr();
                let mut out = stderr.lock();
                writeln!(out, "{line}").and_then(|_| out.flush())
            }
            SinkInner::File(writer) => writeln!(writer, "{line}").and_then(|_| writer.flush()),
        };
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("servisor-sink-{}-{name}.log", std::process::id()))
    }

    #[test]
    fn dash_maps_to_default_stream() {
        assert_eq!(LogTarget::parse("-", LogTarget::Stdout), LogTarget::Stdout);
        assert_eq!(LogTarget::parse("-", LogTarget::Stderr), LogTarget::Stderr);
        assert_eq!(
            LogTarget::parse("/var/log/app.log", LogTarget::Stdout),
            LogTarget::File(PathBuf::from("/var/log/app.log"))
        );
    }

    #[test]
    fn file_sink_appends_lines() {
        let path = temp_path("append");
        let _ = std::fs::remove_file(&path);

        let sink = LogSink::open(&LogTarget::File(path.clone())).expect("open");
        sink.write_line("first");
        sink.clone().write_line("second");

        let contents = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(contents, "first\nsecond\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unopenable_file_is_a_startup_error() {
        let target = LogTarget::File(PathBuf::from("/nonexistent-dir/servisor.log"));
        let err = LogSink::open(&target).expect_err("should fail");
        assert_eq!(err.as_label(), "log_open_error");
        assert!(err.is_startup_fatal());
    }
}
