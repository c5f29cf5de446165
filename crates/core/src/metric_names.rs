//! Well-known metric keys used in history snapshots.
//!
//! Per-device and per-mount keys are suffixed with `:{path}` or `:{device}`
//! so a single snapshot map can hold every mount and accelerator.

/// 1-minute load average as a percentage of logical CPU count.
pub const LOAD_AVG_1M: &str = "load_avg_1m_perc_percpu";

/// 5-minute load average as a percentage of logical CPU count.
pub const LOAD_AVG_5M: &str = "load_avg_5m_perc_percpu";

/// 15-minute load average as a percentage of logical CPU count.
pub const LOAD_AVG_15M: &str = "load_avg_15m_perc_percpu";

/// Used memory as a percentage of total memory.
pub const MEM_UTIL_PERC: &str = "mem_util_perc";

/// Used memory in GiB.
pub const MEM_USED_GB: &str = "mem_used_gb";

pub const DISK_USAGE_PERC: &str = "disk_usage_perc";
pub const DISK_FREE_GB: &str = "disk_free_gb";

pub const ACCEL_UTIL_PERC: &str = "accel_util_perc";
pub const ACCEL_MEM_PERC: &str = "accel_mem_perc";
pub const ACCEL_TEMP: &str = "accel_temp";
pub const ACCEL_MEM_USED_MB: &str = "accel_mem_used_mb";
pub const ACCEL_MEM_TOTAL_MB: &str = "accel_mem_total_mb";

/// Build a per-mount or per-device key, e.g. `disk_free_gb:/home`.
pub fn keyed(metric: &str, key: impl std::fmt::Display) -> String {
    format!("{metric}:{key}")
}

/// Round a raw reading to one decimal place for display and storage.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_joins_with_colon() {
        assert_eq!(keyed(DISK_FREE_GB, "/home"), "disk_free_gb:/home");
        assert_eq!(keyed(ACCEL_TEMP, 1), "accel_temp:1");
    }

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(12.345), 12.3);
        assert_eq!(round1(99.96), 100.0);
        assert_eq!(round1(0.0), 0.0);
    }
}
