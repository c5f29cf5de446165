//! Sink that only writes notifications to the tracing log.
//!
//! Used when no external endpoint is configured, so alerts are still
//! visible in the daemon output.

use async_trait::async_trait;

use crate::sink::{NotificationSink, SinkError};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, message: &str) -> Result<(), SinkError> {
        tracing::info!(target: "sysobserver::notification", %message, "Notification");
        Ok(())
    }
}
