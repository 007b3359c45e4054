//! # Access-log records.
//!
//! One [`AccessRecord`] is produced per completed request and rendered as
//! a single line on the access sink:
//!
//! ```text
//! 127.0.0.1:54321 - [2026-08-06T12:00:00.123Z] "GET /lobby HTTP/1.1" 200 512 3.418ms
//! ```
//!
//! Fields: peer address, timestamp, request line, status code, response
//! body size in bytes, and wall-clock duration.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use http::Version;

/// Everything needed to render one access-log line.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    /// Completion timestamp.
    pub at: DateTime<Utc>,
    /// Client address as seen by `accept()`.
    pub peer: SocketAddr,
    /// Request method.
    pub method: String,
    /// Request target (path and query).
    pub uri: String,
    /// HTTP protocol version.
    pub version: Version,
    /// Response status code.
    pub status: u16,
    /// Response body size in bytes.
    pub bytes: u64,
    /// Wall-clock time from first byte of the request to the response.
    pub duration: Duration,
}

impl AccessRecord {
    /// Renders the record as one access-log line.
    pub fn format_line(&self) -> String {
        format!(
            "{peer} - [{at}] \"{method} {uri} {proto}\" {status} {bytes} {ms:.3}ms",
            peer = self.peer,
            at = self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            method = self.method,
            uri = self.uri,
            proto = version_str(self.version),
            status = self.status,
            bytes = self.bytes,
            ms = self.duration.as_secs_f64() * 1000.0,
        )
    }
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_carries_all_fields() {
        let record = AccessRecord {
            at: Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap(),
            peer: "127.0.0.1:54321".parse().unwrap(),
            method: "GET".into(),
            uri: "/lobby?page=2".into(),
            version: Version::HTTP_11,
            status: 200,
            bytes: 512,
            duration: Duration::from_micros(3418),
        };

        let line = record.format_line();
        assert!(line.starts_with("127.0.0.1:54321 - ["));
        assert!(line.contains("\"GET /lobby?page=2 HTTP/1.1\""));
        assert!(line.contains(" 200 512 "));
        assert!(line.ends_with("3.418ms"));
    }

    #[test]
    fn status_and_duration_always_present() {
        let record = AccessRecord {
            at: Utc::now(),
            peer: "10.0.0.1:80".parse().unwrap(),
            method: "POST".into(),
            uri: "/".into(),
            version: Version::HTTP_10,
            status: 500,
            bytes: 0,
            duration: Duration::ZERO,
        };
        let line = record.format_line();
        assert!(line.contains(" 500 0 "));
        assert!(line.ends_with("ms"));
    }
}
