//! Respawn policies: how quickly dead workers are replaced.
//!
//! - [`backoff`]: delay growth across repeated deaths in one slot;
//! - [`jitter`]: randomization to avoid synchronized respawns.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
