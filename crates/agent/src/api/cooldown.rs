//! Per-command rate limiting for the control endpoints.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::api::error::AppError;

/// Rejects a command issued again within `window` of its last accepted
/// invocation. Each command name has its own window.
#[derive(Debug)]
pub struct CommandCooldown {
    window: Duration,
    last: Mutex<HashMap<&'static str, Instant>>,
}

impl CommandCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Accept the command and record its time, or fail with
    /// [`AppError::Cooldown`].
    pub fn acquire(&self, command: &'static str) -> Result<(), AppError> {
        if self.window.is_zero() {
            return Ok(());
        }
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = last.get(command) {
            let elapsed = now.saturating_duration_since(*prev);
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                return Err(AppError::Cooldown {
                    command: command.to_string(),
                    retry_after_secs: remaining.as_secs_f64().ceil() as u64,
                });
            }
        }
        last.insert(command, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeated_command_is_rejected_until_window_passes() {
        let cooldown = CommandCooldown::new(Duration::from_secs(10));

        assert!(cooldown.acquire("start").is_ok());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_matches!(
            cooldown.acquire("start"),
            Err(AppError::Cooldown { retry_after_secs: 7, .. })
        );

        // Other commands have their own window.
        assert!(cooldown.acquire("stop").is_ok());

        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(cooldown.acquire("start").is_ok());
    }

    #[tokio::test]
    async fn zero_window_never_rejects() {
        let cooldown = CommandCooldown::new(Duration::ZERO);
        assert!(cooldown.acquire("restart").is_ok());
        assert!(cooldown.acquire("restart").is_ok());
    }
}
