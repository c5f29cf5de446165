//! Host metric probes.
//!
//! [`LocalHost`] implements [`HostProbes`] for the machine the agent runs
//! on. Load averages, memory, uptime, hostname and the mount list come
//! from `sysinfo`; per-mount usage is read with `statvfs` so the used and
//! unprivileged-free block counts stay separate. Accelerator probes are
//! delegated to [`AcceleratorCollector`].
//!
//! Every probe is a small struct bound to its target at registry build
//! time; calls perform blocking syscalls and are meant to run on a
//! blocking thread.

use std::sync::Arc;

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use sysobserver_core::error::CoreError;
use sysobserver_core::limits::{Probe, Retrieve};
use sysobserver_core::registry::{HostProbes, MountPoint};

use crate::accel::{AccelReading, AcceleratorCollector, AcceleratorProbe};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

// ---------------------------------------------------------------------------
// Machine identity
// ---------------------------------------------------------------------------

/// The host's node name, or `"localhost"` if it cannot be read.
pub fn machine_name() -> String {
    System::host_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Number of logical CPUs, at least 1.
pub fn cpu_count() -> usize {
    let sys = System::new_with_specifics(
        RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()),
    );
    sys.cpus().len().max(1)
}

/// Seconds since boot.
pub fn uptime_secs() -> u64 {
    System::uptime()
}

// ---------------------------------------------------------------------------
// Load average
// ---------------------------------------------------------------------------

/// Load average window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadWindow {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
}

impl LoadWindow {
    fn index(self) -> usize {
        match self {
            LoadWindow::OneMinute => 0,
            LoadWindow::FiveMinutes => 1,
            LoadWindow::FifteenMinutes => 2,
        }
    }
}

/// Scale raw load averages to a percentage of `cpus`.
pub fn load_percent(loads: [f64; 3], cpus: usize) -> [f64; 3] {
    let cpus = cpus.max(1) as f64;
    loads.map(|l| l / cpus * 100.0)
}

/// 1/5/15-minute load averages as a percentage of logical CPU count.
pub fn load_avg_percent() -> [f64; 3] {
    let load = System::load_average();
    load_percent([load.one, load.five, load.fifteen], cpu_count())
}

#[derive(Debug, Clone, Copy)]
pub struct LoadAverageProbe {
    pub window: LoadWindow,
}

impl Retrieve for LoadAverageProbe {
    fn retrieve(&self) -> Result<f64, CoreError> {
        Ok(load_avg_percent()[self.window.index()])
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    pub total: u64,
    pub available: u64,
}

impl MemInfo {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used() as f64 / self.total as f64 * 100.0
    }

    pub fn used_gb(&self) -> f64 {
        self.used() as f64 / BYTES_PER_GB
    }
}

pub fn read_meminfo() -> Result<MemInfo, CoreError> {
    let sys = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
    );
    let info = MemInfo {
        total: sys.total_memory(),
        available: sys.available_memory(),
    };
    if info.total == 0 {
        return Err(CoreError::retrieval("memory", "total memory reported as zero"));
    }
    Ok(info)
}

#[derive(Debug, Clone, Copy)]
pub struct MemUtilProbe;

impl Retrieve for MemUtilProbe {
    fn retrieve(&self) -> Result<f64, CoreError> {
        Ok(read_meminfo()?.used_percent())
    }
}

// ---------------------------------------------------------------------------
// Mounts and disk usage
// ---------------------------------------------------------------------------

/// Keep block-device-backed filesystems only, given `(device, mountpoint)`
/// pairs.
///
/// The first entry wins when a mount point is listed more than once.
pub fn block_device_mounts<I, D, M>(entries: I) -> Vec<MountPoint>
where
    I: IntoIterator<Item = (D, M)>,
    D: Into<String>,
    M: Into<String>,
{
    let mut mounts: Vec<MountPoint> = Vec::new();
    for (device, mountpoint) in entries {
        let device = device.into();
        let mountpoint = mountpoint.into();
        if !device.starts_with("/dev/") {
            continue;
        }
        if mounts.iter().any(|m| m.mountpoint == mountpoint) {
            continue;
        }
        mounts.push(MountPoint::new(device, mountpoint));
    }
    mounts
}

pub fn read_mounts() -> Vec<MountPoint> {
    let disks = Disks::new_with_refreshed_list();
    block_device_mounts(disks.list().iter().map(|disk| {
        (
            disk.name().to_string_lossy().into_owned(),
            disk.mount_point().to_string_lossy().into_owned(),
        )
    }))
}

/// Filesystem usage figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    /// Space available to unprivileged users.
    pub free: u64,
}

impl DiskUsage {
    /// Used share of the space visible to unprivileged users.
    pub fn percent(&self) -> f64 {
        let visible = self.used + self.free;
        if visible == 0 {
            return 0.0;
        }
        self.used as f64 / visible as f64 * 100.0
    }

    pub fn free_gb(&self) -> f64 {
        self.free as f64 / BYTES_PER_GB
    }
}

/// Read disk usage for a mount point via `statvfs`.
pub fn disk_usage(path: &str) -> Result<DiskUsage, CoreError> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;

    let metric = format!("disk usage of {path}");
    let c_path = CString::new(path).map_err(|e| CoreError::retrieval(&metric, e))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // Safety: `c_path` is NUL-terminated and `stat` is valid for writes.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return Err(CoreError::retrieval(metric, std::io::Error::last_os_error()));
    }
    // Safety: statvfs returned 0, so the struct is initialised.
    let stat = unsafe { stat.assume_init() };

    let block_size = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let used = (stat.f_blocks as u64).saturating_sub(stat.f_bfree as u64) * block_size;
    let free = stat.f_bavail as u64 * block_size;

    Ok(DiskUsage { total, used, free })
}

#[derive(Debug, Clone)]
pub struct DiskUsageProbe {
    pub mountpoint: String,
}

impl Retrieve for DiskUsageProbe {
    fn retrieve(&self) -> Result<f64, CoreError> {
        Ok(disk_usage(&self.mountpoint)?.percent())
    }
}

#[derive(Debug, Clone)]
pub struct DiskFreeProbe {
    pub mountpoint: String,
}

impl Retrieve for DiskFreeProbe {
    fn retrieve(&self) -> Result<f64, CoreError> {
        Ok(disk_usage(&self.mountpoint)?.free_gb())
    }
}

// ---------------------------------------------------------------------------
// LocalHost
// ---------------------------------------------------------------------------

/// The machine the agent runs on.
#[derive(Clone)]
pub struct LocalHost {
    accel: Arc<AcceleratorCollector>,
}

impl LocalHost {
    pub fn new(accel: Arc<AcceleratorCollector>) -> Self {
        Self { accel }
    }

    pub fn accelerators_collector(&self) -> &Arc<AcceleratorCollector> {
        &self.accel
    }

    /// Mounts after the registry's loop/boot filter.
    pub fn observable_mounts(&self) -> Result<Vec<MountPoint>, CoreError> {
        Ok(read_mounts()
            .into_iter()
            .filter(MountPoint::is_observable)
            .collect())
    }
}

impl HostProbes for LocalHost {
    fn mounts(&self) -> Result<Vec<MountPoint>, CoreError> {
        Ok(read_mounts())
    }

    fn accelerators(&self) -> Vec<u32> {
        self.accel.device_ids()
    }

    fn load_avg_5m(&self) -> Probe {
        Arc::new(LoadAverageProbe {
            window: LoadWindow::FiveMinutes,
        })
    }

    fn mem_util(&self) -> Probe {
        Arc::new(MemUtilProbe)
    }

    fn disk_usage(&self, mountpoint: &str) -> Probe {
        Arc::new(DiskUsageProbe {
            mountpoint: mountpoint.to_string(),
        })
    }

    fn disk_free_gb(&self, mountpoint: &str) -> Probe {
        Arc::new(DiskFreeProbe {
            mountpoint: mountpoint.to_string(),
        })
    }

    fn accelerator_load(&self, device: u32) -> Probe {
        Arc::new(AcceleratorProbe::new(
            self.accel.clone(),
            device,
            AccelReading::Utilization,
        ))
    }

    fn accelerator_temperature(&self, device: u32) -> Probe {
        Arc::new(AcceleratorProbe::new(
            self.accel.clone(),
            device,
            AccelReading::Temperature,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_used_is_total_minus_available() {
        let info = MemInfo {
            total: 16 * 1024 * 1024 * 1024,
            available: 8 * 1024 * 1024 * 1024,
        };
        assert_eq!(info.used(), 8 * 1024 * 1024 * 1024);
        assert!((info.used_percent() - 50.0).abs() < f64::EPSILON);
        assert!((info.used_gb() - 8.0).abs() < f64::EPSILON);
        assert_eq!(MemInfo { total: 0, available: 0 }.used_percent(), 0.0);
    }

    #[test]
    fn load_is_scaled_by_cpu_count() {
        assert_eq!(load_percent([2.0, 1.0, 0.5], 4), [50.0, 25.0, 12.5]);
        assert_eq!(load_percent([1.0, 1.0, 1.0], 0), [100.0; 3]);
    }

    #[test]
    fn mounts_keep_block_devices_only() {
        let mounts = block_device_mounts([
            ("sysfs", "/sys"),
            ("/dev/nvme0n1p2", "/"),
            ("/dev/nvme0n1p1", "/boot/efi"),
            ("/dev/loop0", "/snap/core20/1822"),
            ("/dev/sdb1", "/mnt/backup disk"),
            ("/dev/nvme0n1p2", "/"),
            ("tmpfs", "/run"),
        ]);
        let paths: Vec<&str> = mounts.iter().map(|m| m.mountpoint.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/", "/boot/efi", "/snap/core20/1822", "/mnt/backup disk"]
        );

        let observable: Vec<&str> = mounts
            .iter()
            .filter(|m| m.is_observable())
            .map(|m| m.mountpoint.as_str())
            .collect();
        assert_eq!(observable, vec!["/", "/mnt/backup disk"]);
    }

    #[test]
    fn disk_usage_percent_uses_visible_space() {
        let usage = DiskUsage {
            total: 100,
            used: 60,
            free: 20,
        };
        assert!((usage.percent() - 75.0).abs() < f64::EPSILON);
        assert_eq!(DiskUsage { total: 0, used: 0, free: 0 }.percent(), 0.0);
    }

    #[test]
    fn root_disk_usage_is_readable() {
        let usage = disk_usage("/").unwrap();
        assert!(usage.total > 0);
        assert!((0.0..=100.0).contains(&usage.percent()));
    }

    #[test]
    fn missing_path_is_a_retrieval_error() {
        assert!(matches!(
            disk_usage("/definitely/not/a/mount/point"),
            Err(CoreError::Retrieval { .. })
        ));
    }

    #[test]
    fn local_host_identity_is_readable() {
        assert!(!machine_name().is_empty());
        assert!(cpu_count() >= 1);
        assert!(read_meminfo().unwrap().total > 0);
    }
}
