//! # The application contract and a function-backed implementation.
//!
//! This module defines the [`Handler`] trait — the entire boundary between
//! the server and the application it hosts — and [`HandlerFn`], a
//! closure-backed implementation convenient for small apps and tests. The
//! common handle type is [`HandlerRef`], an `Arc<dyn Handler>` shared by
//! every worker.
//!
//! The contract is deliberately narrow, in the WSGI tradition: the server
//! hands the application request metadata plus the fully collected body,
//! and receives status, headers, and body back. Streaming, routing, and
//! middleware all live on the application side of the boundary.
//!
//! [`Handler::boot`] runs once per worker incarnation before the worker
//! starts accepting; it is where an application loads per-worker state.
//! A worker only reports ready after `boot` returns `Ok`.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, Version};

use crate::error::ServeError;

/// A fully read inbound request, as handed to the application.
#[derive(Debug, Clone)]
pub struct AppRequest {
    /// Request method.
    pub method: Method,
    /// Request target.
    pub uri: Uri,
    /// HTTP protocol version.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
    /// Collected request body.
    pub body: Bytes,
    /// Client address as seen by `accept()`.
    pub peer: SocketAddr,
}

/// The application's answer: status, headers, body.
#[derive(Debug, Clone)]
pub struct AppResponse {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl AppResponse {
    /// Creates an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A `200 OK` plain-text response.
    pub fn text(body: impl Into<String>) -> Self {
        let mut resp = Self::new(StatusCode::OK).with_body(Bytes::from(body.into()));
        resp.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        resp
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Adds a header; invalid names/values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// # The request/response callable the server hosts.
///
/// Implementations must be shareable across workers and must not assume
/// any ordering between concurrent calls: every worker invokes the same
/// handler instance independently.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use servisor::{AppRequest, AppResponse, Handler, ServeError};
///
/// struct Hello;
///
/// #[async_trait]
/// impl Handler for Hello {
///     async fn handle(&self, req: AppRequest) -> Result<AppResponse, ServeError> {
///         Ok(AppResponse::text(format!("hello, {}", req.uri.path())))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Per-worker initialization, run before the worker reports ready.
    ///
    /// The default is a no-op. Returning an error (or hanging past the
    /// boot timeout) keeps the worker out of the pool; during a reload
    /// this is what aborts the handover.
    async fn boot(&self) -> Result<(), ServeError> {
        Ok(())
    }

    /// Handles one request.
    ///
    /// A `Fail` error becomes a generic error response; `Fatal`
    /// additionally makes the serving worker exit (and be respawned).
    async fn handle(&self, req: AppRequest) -> Result<AppResponse, ServeError>;
}

/// Shared handle to the hosted application.
pub type HandlerRef = Arc<dyn Handler>;

/// Function-backed handler implementation.
///
/// Wraps a closure that creates a fresh future per request; shared state
/// goes through an explicit `Arc` inside the closure.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a
    /// [`HandlerRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    ///
    /// ## Example
    /// ```
    /// use servisor::{AppRequest, AppResponse, HandlerFn, HandlerRef, ServeError};
    ///
    /// let app: HandlerRef = HandlerFn::arc(|_req: AppRequest| async {
    ///     Ok::<_, ServeError>(AppResponse::text("ok"))
    /// });
    /// ```
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(AppRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<AppResponse, ServeError>> + Send + 'static,
{
    async fn handle(&self, req: AppRequest) -> Result<AppResponse, ServeError> {
        (self.f)(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> AppRequest {
        AppRequest {
            method: Method::GET,
            uri: path.parse().unwrap(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            peer: "127.0.0.1:9999".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn handler_fn_adapts_closures() {
        let app: HandlerRef = HandlerFn::arc(|req: AppRequest| async move {
            Ok::<_, ServeError>(AppResponse::text(req.uri.path().to_string()))
        });

        assert!(app.boot().await.is_ok());
        let resp = app.handle(request("/ping")).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(&resp.body[..], b"/ping");
    }

    #[tokio::test]
    async fn response_builders() {
        let resp = AppResponse::new(StatusCode::NO_CONTENT).with_header("x-pool", "servisor");
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert_eq!(resp.headers.get("x-pool").unwrap(), "servisor");
        assert!(resp.body.is_empty());
    }
}
