//! Limit registry construction.
//!
//! [`build`] turns a set of category tags into the named limits the
//! evaluation scheduler walks on every tick. Mount points and accelerator
//! devices are enumerated once here, not per tick. Probe construction is
//! delegated to a [`HostProbes`] implementation so the registry itself
//! performs no I/O beyond those enumeration queries.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::category::Category;
use crate::error::CoreError;
use crate::limits::{BadnessOverrides, Check, ObservableLimit, Probe};
use crate::types::LimitId;

/// A mounted filesystem as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountPoint {
    pub device: String,
    pub mountpoint: String,
}

impl MountPoint {
    pub fn new(device: impl Into<String>, mountpoint: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            mountpoint: mountpoint.into(),
        }
    }

    /// Loop devices and boot partitions are not observed.
    pub fn is_observable(&self) -> bool {
        !self.device.contains("loop") && !self.mountpoint.starts_with("/boot")
    }
}

/// Host collaborator that enumerates devices and hands out bound probes.
pub trait HostProbes {
    /// Mounted filesystems. Filtering happens in the registry.
    fn mounts(&self) -> Result<Vec<MountPoint>, CoreError>;

    /// Accelerator device ids; empty when accelerator support is missing.
    fn accelerators(&self) -> Vec<u32>;

    fn load_avg_5m(&self) -> Probe;
    fn mem_util(&self) -> Probe;
    fn disk_usage(&self, mountpoint: &str) -> Probe;
    fn disk_free_gb(&self, mountpoint: &str) -> Probe;
    fn accelerator_load(&self, device: u32) -> Probe;
    fn accelerator_temperature(&self, device: u32) -> Probe;
}

pub const CPU_LOAD_THRESHOLD: f64 = 95.0;
pub const MEM_UTIL_THRESHOLD: f64 = 85.0;
pub const DISK_USAGE_THRESHOLD: f64 = 95.0;
/// Minimum free space per mount, in GiB.
pub const DISK_FREE_GB_THRESHOLD: f64 = 30.0;
pub const ACCEL_LOAD_THRESHOLD: f64 = 95.0;
/// Accelerator core temperature, in degrees Celsius.
pub const ACCEL_TEMP_THRESHOLD: f64 = 85.0;

// ---------------------------------------------------------------------------
// LimitRegistry
// ---------------------------------------------------------------------------

/// Ordered set of limits keyed by id. Iteration follows insertion order.
#[derive(Debug, Default, Clone)]
pub struct LimitRegistry {
    limits: IndexMap<LimitId, ObservableLimit>,
}

impl LimitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a limit, rejecting invalid definitions and duplicate ids.
    pub fn insert(&mut self, limit: ObservableLimit) -> Result<(), CoreError> {
        limit.validate()?;
        if self.limits.contains_key(&limit.id) {
            return Err(CoreError::Validation(format!(
                "duplicate limit id: {}",
                limit.id
            )));
        }
        self.limits.insert(limit.id.clone(), limit);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ObservableLimit> {
        self.limits.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservableLimit> {
        self.limits.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &LimitId> {
        self.limits.keys()
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl FromIterator<ObservableLimit> for Result<LimitRegistry, CoreError> {
    fn from_iter<I: IntoIterator<Item = ObservableLimit>>(iter: I) -> Self {
        let mut registry = LimitRegistry::new();
        for limit in iter {
            registry.insert(limit)?;
        }
        Ok(registry)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the limits for the selected categories.
///
/// Fails if a disk category is selected but no observable mount point
/// exists, or if mount enumeration itself fails.
pub fn build(
    categories: &BTreeSet<Category>,
    probes: &dyn HostProbes,
) -> Result<LimitRegistry, CoreError> {
    let mut registry = LimitRegistry::new();

    if categories.contains(&Category::Cpu) {
        registry.insert(cpu_load_limit(probes.load_avg_5m()))?;
    }

    if categories.contains(&Category::Memory) {
        registry.insert(mem_util_limit(probes.mem_util()))?;
    }

    if categories.iter().any(|c| c.is_disk()) {
        let mounts: Vec<MountPoint> = probes
            .mounts()
            .map_err(|e| CoreError::Registry(format!("mount enumeration failed: {e}")))?
            .into_iter()
            .filter(MountPoint::is_observable)
            .collect();

        if mounts.is_empty() {
            return Err(CoreError::Registry(
                "no observable mount points found".into(),
            ));
        }

        for (i, mount) in mounts.iter().enumerate() {
            let path = mount.mountpoint.as_str();
            if categories.contains(&Category::DiskUsage) {
                registry.insert(disk_usage_limit(i, path, probes.disk_usage(path)))?;
            }
            if categories.contains(&Category::DiskFree) {
                registry.insert(disk_free_limit(i, path, probes.disk_free_gb(path)))?;
            }
        }
    }

    if categories.iter().any(|c| c.is_accelerator()) {
        for device in probes.accelerators() {
            if categories.contains(&Category::AcceleratorLoad) {
                registry.insert(accel_load_limit(device, probes.accelerator_load(device)))?;
            }
            if categories.contains(&Category::AcceleratorTemperature) {
                registry.insert(accel_temp_limit(
                    device,
                    probes.accelerator_temperature(device),
                ))?;
            }
        }
    }

    Ok(registry)
}

fn cpu_load_limit(probe: Probe) -> ObservableLimit {
    ObservableLimit::new(
        "cpu_load_5min",
        "CPU-Load-Avg-5min",
        probe,
        Check::Below,
        CPU_LOAD_THRESHOLD,
    )
    .with_unit("%")
    .with_message(
        "**CPU Load Avg [5min]** is too high! (value: `{current}{unit}`, threshold: `{threshold}{unit}`)",
    )
    // Three consecutive bad samples before alerting.
    .with_badness(BadnessOverrides::new(Some(1), None, Some(3)))
}

fn mem_util_limit(probe: Probe) -> ObservableLimit {
    ObservableLimit::new(
        "mem_util",
        "Memory-Utilisation",
        probe,
        Check::Below,
        MEM_UTIL_THRESHOLD,
    )
    .with_unit("%")
    .with_message(
        "**Memory Usage** is too high! (value: `{current}{unit}`, threshold: `{threshold}{unit}`)",
    )
    .with_badness(BadnessOverrides::new(Some(1), None, Some(3)))
}

fn disk_usage_limit(index: usize, path: &str, probe: Probe) -> ObservableLimit {
    ObservableLimit::new(
        format!("disk_usage_perc{index}"),
        format!("Disk-Usage-{path}"),
        probe,
        Check::Below,
        DISK_USAGE_THRESHOLD,
    )
    .with_unit("%")
    .with_message(format!(
        "**Disk Usage for `{path}`** is too high! (value: `{{current}}{{unit}}`, threshold: `{{threshold}}{{unit}}`)"
    ))
}

fn disk_free_limit(index: usize, path: &str, probe: Probe) -> ObservableLimit {
    ObservableLimit::new(
        format!("disk_free_gb{index}"),
        format!("Disk-Space-Free-{path}"),
        probe,
        Check::Above,
        DISK_FREE_GB_THRESHOLD,
    )
    .with_unit("GB")
    .with_message(format!(
        "No more **Disk Space for `{path}`**! (value: `{{current}}{{unit}}`, threshold: `{{threshold}}{{unit}}`)"
    ))
}

fn accel_load_limit(device: u32, probe: Probe) -> ObservableLimit {
    ObservableLimit::new(
        format!("accel_load{device}"),
        format!("Accelerator-Load-{device}"),
        probe,
        Check::Below,
        ACCEL_LOAD_THRESHOLD,
    )
    .with_unit("%")
    .with_message(format!(
        "**Accelerator {device} Load** is too high! (value: `{{current}}{{unit}}`, threshold: `{{threshold}}{{unit}}`)"
    ))
    // Load is noisy: three bad samples in a row before alerting.
    .with_badness(BadnessOverrides::new(Some(2), Some(1), Some(6)))
}

fn accel_temp_limit(device: u32, probe: Probe) -> ObservableLimit {
    ObservableLimit::new(
        format!("accel_temp{device}"),
        format!("Accelerator-Temperature-{device}"),
        probe,
        Check::Below,
        ACCEL_TEMP_THRESHOLD,
    )
    .with_unit("°C")
    .with_message(format!(
        "**Accelerator {device} Temperature** is too high! (value: `{{current}}{{unit}}`, threshold: `{{threshold}}{{unit}}`)"
    ))
    .with_badness(BadnessOverrides::new(Some(1), None, Some(3)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::category::parse_categories;

    struct FakeHost {
        mounts: Vec<MountPoint>,
        accelerators: Vec<u32>,
    }

    fn constant(value: f64) -> Probe {
        Arc::new(move || -> Result<f64, CoreError> { Ok(value) })
    }

    impl HostProbes for FakeHost {
        fn mounts(&self) -> Result<Vec<MountPoint>, CoreError> {
            Ok(self.mounts.clone())
        }
        fn accelerators(&self) -> Vec<u32> {
            self.accelerators.clone()
        }
        fn load_avg_5m(&self) -> Probe {
            constant(10.0)
        }
        fn mem_util(&self) -> Probe {
            constant(20.0)
        }
        fn disk_usage(&self, _mountpoint: &str) -> Probe {
            constant(30.0)
        }
        fn disk_free_gb(&self, mountpoint: &str) -> Probe {
            // Bound per mount at build time.
            let value = mountpoint.len() as f64;
            Arc::new(move || -> Result<f64, CoreError> { Ok(value) })
        }
        fn accelerator_load(&self, device: u32) -> Probe {
            constant(f64::from(device))
        }
        fn accelerator_temperature(&self, _device: u32) -> Probe {
            constant(50.0)
        }
    }

    fn host() -> FakeHost {
        FakeHost {
            mounts: vec![
                MountPoint::new("/dev/sda1", "/"),
                MountPoint::new("/dev/sda2", "/boot/efi"),
                MountPoint::new("/dev/loop3", "/snap/core/1"),
                MountPoint::new("/dev/sdb1", "/data"),
            ],
            accelerators: vec![0, 1],
        }
    }

    #[test]
    fn builds_all_categories_in_order() {
        let categories = Category::ALL.into_iter().collect();
        let registry = build(&categories, &host()).unwrap();
        let ids: Vec<&str> = registry.ids().map(String::as_str).collect();
        assert_eq!(
            ids,
            vec![
                "cpu_load_5min",
                "mem_util",
                "disk_usage_perc0",
                "disk_free_gb0",
                "disk_usage_perc1",
                "disk_free_gb1",
                "accel_load0",
                "accel_temp0",
                "accel_load1",
                "accel_temp1",
            ]
        );
    }

    #[test]
    fn loop_and_boot_mounts_are_excluded() {
        let registry = build(&parse_categories("disk-usage"), &host()).unwrap();
        let names: Vec<&str> = registry.iter().map(|l| l.display_name.as_str()).collect();
        assert_eq!(names, vec!["Disk-Usage-/", "Disk-Usage-/data"]);
    }

    #[test]
    fn probes_are_bound_per_mount() {
        let registry = build(&parse_categories("disk-free"), &host()).unwrap();
        let root = registry.get("disk_free_gb0").unwrap();
        let data = registry.get("disk_free_gb1").unwrap();
        assert_eq!(root.retrieve.retrieve().unwrap(), 1.0);
        assert_eq!(data.retrieve.retrieve().unwrap(), 5.0);
        assert_eq!(root.check, Check::Above);
    }

    #[test]
    fn unknown_and_empty_categories_build_nothing() {
        let registry = build(&parse_categories("network,gpu"), &host()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn no_accelerators_means_no_accelerator_limits() {
        let mut h = host();
        h.accelerators.clear();
        let registry = build(
            &parse_categories("accelerator-load,accelerator-temperature"),
            &h,
        )
        .unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn disk_categories_without_mounts_fail() {
        let h = FakeHost {
            mounts: vec![MountPoint::new("/dev/loop0", "/snap")],
            accelerators: vec![],
        };
        assert_matches!(
            build(&parse_categories("cpu,disk-free"), &h),
            Err(CoreError::Registry(_))
        );
    }

    #[test]
    fn accelerator_limits_use_noise_tolerant_hysteresis() {
        let registry = build(&parse_categories("accelerator-load"), &host()).unwrap();
        let limit = registry.get("accel_load1").unwrap();
        assert_eq!(
            limit.badness,
            BadnessOverrides::new(Some(2), Some(1), Some(6))
        );
    }

    #[test]
    fn disk_messages_name_the_mount() {
        let registry = build(&parse_categories("disk-free"), &host()).unwrap();
        let limit = registry.get("disk_free_gb1").unwrap();
        assert_eq!(
            limit.render_alert(12.04),
            "No more **Disk Space for `/data`**! (value: `12.0GB`, threshold: `30.0GB`)"
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = LimitRegistry::new();
        registry.insert(cpu_load_limit(constant(1.0))).unwrap();
        assert_matches!(
            registry.insert(cpu_load_limit(constant(1.0))),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn collect_into_registry() {
        let result: Result<LimitRegistry, CoreError> =
            vec![cpu_load_limit(constant(1.0)), mem_util_limit(constant(2.0))]
                .into_iter()
                .collect();
        assert_eq!(result.unwrap().len(), 2);
    }
}
