use std::collections::BTreeSet;
use std::time::Duration;

use sysobserver_core::category::{parse_categories, Category};
use sysobserver_core::error::CoreError;

/// Default categories when `OBSERVER_CATEGORIES` is unset.
const DEFAULT_CATEGORIES: &str =
    "cpu,memory,disk-usage,disk-free,accelerator-load,accelerator-temperature";

/// Observer configuration loaded from environment variables.
///
/// All fields have defaults suitable for a single workstation. The machine
/// name is resolved here once and passed to everything that formats
/// messages.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Name appended to every notification.
    pub machine_name: String,
    /// Limit categories to observe.
    pub categories: BTreeSet<Category>,
    /// Period of the evaluation scheduler.
    pub check_interval: Duration,
    /// Period of the history sampler.
    pub history_interval: Duration,
    /// Webhook endpoint for notifications; `None` logs them only.
    pub webhook_url: Option<String>,
    /// Start both schedulers at boot.
    pub autostart: bool,
    /// Minimum spacing between start/stop/restart commands.
    pub command_cooldown: Duration,
    /// Control surface bind address.
    pub host: String,
    pub port: u16,
}

impl ObserverConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                          | Default             |
    /// |----------------------------------|---------------------|
    /// | `OBSERVER_MACHINE_NAME`          | host node name      |
    /// | `OBSERVER_CATEGORIES`            | all categories      |
    /// | `OBSERVER_CHECK_INTERVAL_SECS`   | `300`               |
    /// | `OBSERVER_HISTORY_INTERVAL_SECS` | `300`               |
    /// | `OBSERVER_WEBHOOK_URL`           | unset               |
    /// | `OBSERVER_AUTOSTART`             | `true`              |
    /// | `OBSERVER_COMMAND_COOLDOWN_SECS` | `10`                |
    /// | `HOST`                           | `127.0.0.1`         |
    /// | `PORT`                           | `3030`              |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let machine_name =
            get("OBSERVER_MACHINE_NAME").unwrap_or_else(crate::host::machine_name);

        let categories = parse_categories(
            &get("OBSERVER_CATEGORIES").unwrap_or_else(|| DEFAULT_CATEGORIES.into()),
        );

        let check_interval = parse_secs(
            get("OBSERVER_CHECK_INTERVAL_SECS"),
            "OBSERVER_CHECK_INTERVAL_SECS",
            300,
        )?;
        let history_interval = parse_secs(
            get("OBSERVER_HISTORY_INTERVAL_SECS"),
            "OBSERVER_HISTORY_INTERVAL_SECS",
            300,
        )?;

        let autostart = match get("OBSERVER_AUTOSTART").as_deref() {
            None => true,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                return Err(CoreError::Validation(format!(
                    "OBSERVER_AUTOSTART must be a boolean, got {other}"
                )))
            }
        };

        let command_cooldown = match get("OBSERVER_COMMAND_COOLDOWN_SECS") {
            None => Duration::from_secs(10),
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                CoreError::Validation(format!(
                    "OBSERVER_COMMAND_COOLDOWN_SECS must be a valid u64, got {raw}"
                ))
            })?),
        };

        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".into());
        let port = match get("PORT") {
            None => 3030,
            Some(raw) => raw
                .parse()
                .map_err(|_| CoreError::Validation(format!("PORT must be a valid u16, got {raw}")))?,
        };

        Ok(Self {
            machine_name,
            categories,
            check_interval,
            history_interval,
            webhook_url: get("OBSERVER_WEBHOOK_URL"),
            autostart,
            command_cooldown,
            host,
            port,
        })
    }
}

/// Parse a whole number of seconds, at least 1.
fn parse_secs(raw: Option<String>, name: &str, default: u64) -> Result<Duration, CoreError> {
    let secs = match raw {
        None => default,
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| CoreError::Validation(format!("{name} must be a valid u64, got {raw}")))?,
    };
    if secs == 0 {
        return Err(CoreError::Validation(format!("{name} must be at least 1")));
    }
    Ok(Duration::from_secs(secs))
}
