//! Event fan-out: the subscriber trait, the bounded-queue set, and the
//! built-in error-log writer.

mod error_log;
mod set;
mod subscribe;

pub use error_log::ErrorLogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
