//! The notification sink seam.
//!
//! The evaluation engine hands finished alert and recovery messages to a
//! [`NotificationSink`] and does not retry on failure. Sinks that need
//! delivery guarantees retry internally (see
//! [`WebhookSink`](crate::delivery::webhook::WebhookSink)).

use std::sync::Arc;

use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for notification delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),

    /// The sink can no longer accept messages.
    #[error("Sink closed: {0}")]
    Closed(String),
}

// ---------------------------------------------------------------------------
// NotificationSink
// ---------------------------------------------------------------------------

/// Destination for alert and recovery messages.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message.
    async fn send(&self, message: &str) -> Result<(), SinkError>;

    /// Resolve once the sink is able to deliver. Awaited once before the
    /// first evaluation tick; the default is immediately ready.
    async fn wait_ready(&self) {}
}

#[async_trait]
impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    async fn send(&self, message: &str) -> Result<(), SinkError> {
        (**self).send(message).await
    }

    async fn wait_ready(&self) {
        (**self).wait_ready().await
    }
}
