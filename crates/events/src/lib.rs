//! Sysobserver notification infrastructure.
//!
//! - [`NotificationSink`]: the seam the evaluation engine delivers alert
//!   and recovery messages through.
//! - [`delivery`]: concrete sinks (webhook, log, fan-out).

pub mod delivery;
pub mod sink;

pub use delivery::fanout::FanoutSink;
pub use delivery::log::LogSink;
pub use delivery::webhook::WebhookSink;
pub use sink::{NotificationSink, SinkError};
