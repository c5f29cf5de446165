//! Deliver every message to several sinks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::sink::{NotificationSink, SinkError};

/// Sends each message to all inner sinks in order.
///
/// A failing sink does not stop delivery to the rest; the first error is
/// returned once every sink has been tried.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn send(&self, message: &str) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.send(message).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Ready once every inner sink is ready.
    async fn wait_ready(&self) {
        for sink in &self.sinks {
            sink.wait_ready().await;
        }
    }
}
