//! Runtime event system: classification, metadata, and broadcasting.
//!
//! - [`event`]: event kinds and the metadata-carrying [`Event`] struct;
//! - [`bus`]: broadcast channel wrapper used by all publishers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
