//! Log streams: destinations, access records, and line formatting.
//!
//! Two streams exist, mirroring the classic prefork server layout:
//! - the **access log** gets exactly one line per completed request,
//!   written directly by the worker that served it;
//! - the **error log** gets lifecycle lines (via the error-log subscriber)
//!   and per-request failure lines (written directly by workers).

mod access;
mod sink;

pub use access::AccessRecord;
pub use sink::{LogSink, LogTarget};

use chrono::{SecondsFormat, Utc};

/// Formats one error-log line: `[timestamp] [level] message`.
pub fn error_line(level: &str, message: &str) -> String {
    format!(
        "[{}] [{level}] {message}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_line_shape() {
        let line = error_line("error", "worker w3 exited: killed");
        assert!(line.contains("] [error] worker w3 exited: killed"));
        assert!(line.starts_with('['));
    }
}
