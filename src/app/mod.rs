//! The hosted application boundary.

mod handler;

pub use handler::{AppRequest, AppResponse, Handler, HandlerFn, HandlerRef};
