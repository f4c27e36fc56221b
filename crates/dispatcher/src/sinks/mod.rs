//! Sink implementations
//!
//! Contains LogSink and AlertSink.

mod alert;
mod log;

pub use self::alert::{AlertCounts, AlertSink};
pub use self::log::LogSink;
