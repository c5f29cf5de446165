//! Host information report.
//!
//! A one-shot summary of the machine (uptime, CPUs, memory, load, disks
//! and accelerators), returned as JSON by the control surface and
//! rendered as monospace tables for text consumers.

use serde::Serialize;
use sysobserver_core::error::CoreError;
use sysobserver_core::table::{Align, Table, TableStyle};

use crate::accel::AcceleratorMetrics;
use crate::host::{self, LocalHost};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Serialize)]
pub struct DiskReport {
    pub device: String,
    pub mountpoint: String,
    pub percent: f64,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub machine_name: String,
    pub uptime_secs: u64,
    pub cpu_count: usize,
    pub mem_total_bytes: u64,
    pub mem_used_bytes: u64,
    pub mem_available_bytes: u64,
    /// 1/5/15-minute load as a percentage of CPU count.
    pub load_percent: [f64; 3],
    pub disks: Vec<DiskReport>,
    pub accelerators: Vec<AcceleratorMetrics>,
}

/// Source of host reports; implemented by [`LocalHost`] and by fakes in
/// tests.
pub trait HostReporter: Send + Sync {
    fn report(&self, machine_name: &str) -> Result<HostReport, CoreError>;
}

impl HostReporter for LocalHost {
    fn report(&self, machine_name: &str) -> Result<HostReport, CoreError> {
        let mem = host::read_meminfo()?;
        let disks = self
            .observable_mounts()?
            .into_iter()
            .map(|mount| {
                let usage = host::disk_usage(&mount.mountpoint)?;
                Ok(DiskReport {
                    device: mount.device,
                    mountpoint: mount.mountpoint,
                    percent: usage.percent(),
                    total_bytes: usage.total,
                    used_bytes: usage.used,
                    free_bytes: usage.free,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(HostReport {
            machine_name: machine_name.to_string(),
            uptime_secs: host::uptime_secs(),
            cpu_count: host::cpu_count(),
            mem_total_bytes: mem.total,
            mem_used_bytes: mem.used(),
            mem_available_bytes: mem.available,
            load_percent: host::load_avg_percent(),
            disks,
            accelerators: self.accelerators_collector().read_all()?,
        })
    }
}

impl HostReport {
    /// Render the CPU/memory summary followed by the disk and accelerator
    /// tables, each in its own code fence.
    pub fn render_text(&self) -> String {
        let gb = |bytes: u64| bytes as f64 / BYTES_PER_GB;
        let mem_percent = if self.mem_total_bytes == 0 {
            0.0
        } else {
            self.mem_used_bytes as f64 / self.mem_total_bytes as f64 * 100.0
        };
        let [l1, l5, l15] = self.load_percent;

        let summary = [
            format!("Uptime:  {}", format_uptime(self.uptime_secs)),
            format!("CPUs:    {}", self.cpu_count),
            format!("RAM:     {:.1} GB", gb(self.mem_total_bytes)),
            String::new(),
            format!("Load:    1min: {l1:.1}%, 5min: {l5:.1}%, 15min: {l15:.1}%"),
            format!(
                "Memory:  {mem_percent:.1}% [used: {:.1} / {:.1} GB] [available: {:.1} GB]",
                gb(self.mem_used_bytes),
                gb(self.mem_total_bytes),
                gb(self.mem_available_bytes),
            ),
        ]
        .join("\n");

        let mut sections = vec![format!("```\n{summary}\n```")];
        sections.extend(self.disk_table());
        sections.extend(self.accelerator_table());
        sections.join("\n")
    }

    fn disk_table(&self) -> Option<String> {
        if self.disks.is_empty() {
            return None;
        }
        let mut table = Table::new(["Device", "Mount", "Use", "Total", "Used", "Free"]).align([
            Align::Left,
            Align::Left,
            Align::Right,
            Align::Right,
            Align::Right,
            Align::Right,
        ]);
        for disk in &self.disks {
            table.push_row([
                disk.device.clone(),
                disk.mountpoint.clone(),
                format!("{:.1} %", disk.percent),
                human_bytes(disk.total_bytes),
                human_bytes(disk.used_bytes),
                human_bytes(disk.free_bytes),
            ]);
        }
        table.render(TableStyle::default())
    }

    fn accelerator_table(&self) -> Option<String> {
        if self.accelerators.is_empty() {
            return None;
        }
        let mut table = Table::new(["ID", "Util", "Mem", "Temp", "Memory"]).align([Align::Right; 5]);
        for accel in &self.accelerators {
            table.push_row([
                accel.index.to_string(),
                format!("{} %", accel.utilization_percent),
                format!("{:.1} %", accel.memory_percent()),
                format!("{} °C", accel.temperature_celsius),
                format!("{} / {} MB", accel.memory_used_mb, accel.memory_total_mb),
            ]);
        }
        table.render(TableStyle::default())
    }
}

/// `[D day[s], ]H:MM:SS`.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let rest = secs % 86_400;
    let hms = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    match days {
        0 => hms,
        1 => format!("1 day, {hms}"),
        n => format!("{n} days, {hms}"),
    }
}

/// Byte count with a binary-prefix suffix and one decimal, e.g. `9.8G`.
pub fn human_bytes(bytes: u64) -> String {
    const SYMBOLS: [&str; 8] = ["K", "M", "G", "T", "P", "E", "Z", "Y"];
    for (i, symbol) in SYMBOLS.iter().enumerate().rev() {
        let prefix = 1u128 << ((i + 1) * 10);
        if bytes as u128 >= prefix {
            return format!("{:.1}{symbol}", bytes as f64 / prefix as f64);
        }
    }
    format!("{bytes}B")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> HostReport {
        HostReport {
            machine_name: "box".into(),
            uptime_secs: 2 * 86_400 + 3 * 3600 + 4 * 60 + 5,
            cpu_count: 8,
            mem_total_bytes: 16 * 1024 * 1024 * 1024,
            mem_used_bytes: 4 * 1024 * 1024 * 1024,
            mem_available_bytes: 12 * 1024 * 1024 * 1024,
            load_percent: [12.5, 10.0, 7.3],
            disks: vec![DiskReport {
                device: "/dev/sda1".into(),
                mountpoint: "/".into(),
                percent: 50.0,
                total_bytes: 100 * 1024 * 1024 * 1024,
                used_bytes: 50 * 1024 * 1024 * 1024,
                free_bytes: 50 * 1024 * 1024 * 1024,
            }],
            accelerators: Vec::new(),
        }
    }

    #[test]
    fn uptime_formats_like_a_timedelta() {
        assert_eq!(format_uptime(59), "0:00:59");
        assert_eq!(format_uptime(86_400 + 61), "1 day, 0:01:01");
        assert_eq!(format_uptime(2 * 86_400 + 3 * 3600), "2 days, 3:00:00");
    }

    #[test]
    fn human_bytes_uses_binary_prefixes() {
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(1024), "1.0K");
        assert_eq!(human_bytes(10 * 1024 * 1024 + 512 * 1024), "10.5M");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.0G");
    }

    #[test]
    fn text_report_contains_summary_and_disk_table() {
        let text = report().render_text();
        assert!(text.starts_with("```\nUptime:  2 days, 3:04:05\nCPUs:    8\nRAM:     16.0 GB\n"));
        assert!(text.contains("Load:    1min: 12.5%, 5min: 10.0%, 15min: 7.3%"));
        assert!(text.contains("Memory:  25.0% [used: 4.0 / 16.0 GB] [available: 12.0 GB]"));
        assert!(text.contains("Device    | Mount | Use    | Total  | Used  | Free"));
        assert!(text.contains("/dev/sda1 | /     | 50.0 % | 100.0G | 50.0G | 50.0G"));
        assert!(!text.contains("Temp"));
    }
}
