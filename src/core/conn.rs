//! # Serve one connection.
//!
//! Runs the HTTP/1.1 protocol over an accepted stream and dispatches each
//! request to the hosted application, with the containment rules the
//! worker relies on:
//!
//! ```text
//! Success:
//!   handler.handle() → Ok(resp) → resp + access line
//!
//! Failure:
//!   handler.handle() → Err(Fail)  → 500 + error line + access line
//!   handler.handle() → Err(Fatal) → 500 + error line + access line,
//!                                   then the worker's fatal token fires
//!   handler panics               → caught → 500 + error line + access line
//! ```
//!
//! ## Rules
//! - Every **completed** request writes exactly one access line.
//! - Every handler failure writes exactly one error line.
//! - Soft cancellation (drain start) finishes the in-flight request and
//!   closes the connection; hard cancellation drops it immediately.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use futures::FutureExt;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::app::{AppRequest, AppResponse, HandlerRef};
use crate::core::pool::WorkerId;
use crate::logs::{error_line, AccessRecord, LogSink};

/// Per-worker state shared by all of its connections.
pub(crate) struct ConnShared {
    pub handler: HandlerRef,
    pub access: LogSink,
    pub errors: LogSink,
    pub capture: bool,
    pub worker: WorkerId,
    /// Fired when a fatal handler error must take the worker down.
    pub fatal: CancellationToken,
}

enum ConnOutcome {
    Done(hyper::Result<()>),
    Soft,
    Hard,
}

/// Serves one accepted connection until it closes or is cancelled.
///
/// `soft` starts a drain: the in-flight request completes, keep-alive
/// ends. The worker's fatal token drains the same way, so a dying worker
/// still flushes its last response. `hard` drops the connection
/// immediately (forced drain, kill).
pub(crate) async fn serve_connection(
    shared: Arc<ConnShared>,
    stream: TcpStream,
    peer: SocketAddr,
    soft: CancellationToken,
    hard: CancellationToken,
) {
    let io = TokioIo::new(stream);
    let svc_shared = Arc::clone(&shared);
    let service = service_fn(move |req| {
        let shared = Arc::clone(&svc_shared);
        async move { handle_request(shared, peer, req).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let outcome = tokio::select! {
        res = conn.as_mut() => ConnOutcome::Done(res),
        _ = soft.cancelled() => ConnOutcome::Soft,
        _ = shared.fatal.cancelled() => ConnOutcome::Soft,
        _ = hard.cancelled() => ConnOutcome::Hard,
    };

    match outcome {
        ConnOutcome::Done(res) => report(&shared, peer, res),
        ConnOutcome::Soft => {
            conn.as_mut().graceful_shutdown();
            tokio::select! {
                res = conn.as_mut() => report(&shared, peer, res),
                _ = hard.cancelled() => {}
            }
        }
        ConnOutcome::Hard => {}
    }
}

/// Protocol-level connection errors (client resets, malformed framing)
/// are only interesting when output capture is on.
fn report(shared: &ConnShared, peer: SocketAddr, res: hyper::Result<()>) {
    if let Err(err) = res {
        if shared.capture {
            shared.errors.write_line(&error_line(
                "warning",
                &format!("worker {}: connection error from {peer}: {err}", shared.worker),
            ));
        }
    }
}

/// Handles one request: collect body, dispatch, log, respond.
async fn handle_request(
    shared: Arc<ConnShared>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let (parts, body) = req.into_parts();
    let app_resp = match body.collect().await {
        Ok(collected) => {
            let app_req = AppRequest {
                method: method.clone(),
                uri: uri.clone(),
                version,
                headers: parts.headers,
                body: collected.to_bytes(),
                peer,
            };
            dispatch(&shared, app_req).await
        }
        Err(err) => {
            shared.errors.write_line(&error_line(
                "error",
                &format!(
                    "worker {}: failed to read request body from {peer}: {err}",
                    shared.worker
                ),
            ));
            AppResponse::new(StatusCode::BAD_REQUEST).with_body(Bytes::from_static(b"Bad Request\n"))
        }
    };

    let record = AccessRecord {
        at: Utc::now(),
        peer,
        method: method.to_string(),
        uri: uri.to_string(),
        version,
        status: app_resp.status.as_u16(),
        bytes: app_resp.body.len() as u64,
        duration: started.elapsed(),
    };
    shared.access.write_line(&record.format_line());

    Ok(into_http(app_resp))
}

/// Invokes the handler with panic isolation and failure containment.
async fn dispatch(shared: &ConnShared, req: AppRequest) -> AppResponse {
    let fut = shared.handler.handle(req);
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(resp)) => resp,
        Ok(Err(err)) => {
            let detail = if shared.capture {
                format!(": {err}")
            } else {
                String::new()
            };
            shared.errors.write_line(&error_line(
                "error",
                &format!("worker {}: {}{detail}", shared.worker, err.as_label()),
            ));
            if err.is_fatal() {
                shared.fatal.cancel();
            }
            generic_error()
        }
        Err(panic) => {
            let detail = if shared.capture {
                format!(": {}", panic_message(&panic))
            } else {
                String::new()
            };
            shared.errors.write_line(&error_line(
                "error",
                &format!("worker {}: handler_panicked{detail}", shared.worker),
            ));
            generic_error()
        }
    }
}

/// The generic failure response clients see; details stay in the logs.
fn generic_error() -> AppResponse {
    AppResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body(Bytes::from_static(b"Internal Server Error\n"))
}

fn into_http(resp: AppResponse) -> Response<Full<Bytes>> {
    let mut http_resp = Response::new(Full::new(resp.body));
    *http_resp.status_mut() = resp.status;
    *http_resp.headers_mut() = resp.headers;
    http_resp
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_error_is_a_plain_500() {
        let resp = generic_error();
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&resp.body[..], b"Internal Server Error\n");
    }

    #[test]
    fn panic_payloads_render() {
        let s: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&s), "boom");
        let owned: Box<dyn std::any::Any + Send> = Box::new("later".to_string());
        assert_eq!(panic_message(&owned), "later");
        let opaque: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&opaque), "opaque panic payload");
    }
}
