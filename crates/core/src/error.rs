#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to retrieve {metric}: {reason}")]
    Retrieval { metric: String, reason: String },

    #[error("Snapshot collection failed: {0}")]
    Snapshot(String),

    #[error("Limit registry could not be built: {0}")]
    Registry(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::Retrieval`] naming the failing metric.
    pub fn retrieval(metric: impl Into<String>, reason: impl ToString) -> Self {
        Self::Retrieval {
            metric: metric.into(),
            reason: reason.to_string(),
        }
    }
}
