//! Full host snapshots for the history sampler.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use sysobserver_core::category::SnapshotCategory;
use sysobserver_core::error::CoreError;
use sysobserver_core::history::SnapshotSource;
use sysobserver_core::metric_names::{self as names, keyed, round1};

use crate::accel::AcceleratorCollector;
use crate::host::{self, LocalHost};

/// Reads every metric of the requested groups from the local host.
///
/// Any failing reading fails the snapshot.
pub struct HostSnapshotSource {
    host: LocalHost,
}

impl HostSnapshotSource {
    pub fn new(host: LocalHost) -> Self {
        Self { host }
    }

    fn accel(&self) -> &Arc<AcceleratorCollector> {
        self.host.accelerators_collector()
    }

    fn collect_cpu(&self, values: &mut BTreeMap<String, f64>) -> Result<(), CoreError> {
        let [l1, l5, l15] = host::load_avg_percent();
        values.insert(names::LOAD_AVG_1M.into(), round1(l1));
        values.insert(names::LOAD_AVG_5M.into(), round1(l5));
        values.insert(names::LOAD_AVG_15M.into(), round1(l15));

        let mem = host::read_meminfo()?;
        values.insert(names::MEM_UTIL_PERC.into(), round1(mem.used_percent()));
        values.insert(names::MEM_USED_GB.into(), round1(mem.used_gb()));
        Ok(())
    }

    fn collect_disk(&self, values: &mut BTreeMap<String, f64>) -> Result<(), CoreError> {
        for mount in self.host.observable_mounts()? {
            let usage = host::disk_usage(&mount.mountpoint)?;
            values.insert(
                keyed(names::DISK_USAGE_PERC, &mount.mountpoint),
                round1(usage.percent()),
            );
            values.insert(
                keyed(names::DISK_FREE_GB, &mount.mountpoint),
                round1(usage.free_gb()),
            );
        }
        Ok(())
    }

    fn collect_accelerator(&self, values: &mut BTreeMap<String, f64>) -> Result<(), CoreError> {
        for device in self.accel().read_all()? {
            let d = device.index;
            values.insert(
                keyed(names::ACCEL_UTIL_PERC, d),
                device.utilization_percent as f64,
            );
            values.insert(keyed(names::ACCEL_MEM_PERC, d), round1(device.memory_percent()));
            values.insert(keyed(names::ACCEL_TEMP, d), device.temperature_celsius as f64);
            values.insert(
                keyed(names::ACCEL_MEM_USED_MB, d),
                device.memory_used_mb as f64,
            );
            values.insert(
                keyed(names::ACCEL_MEM_TOTAL_MB, d),
                device.memory_total_mb as f64,
            );
        }
        Ok(())
    }
}

impl SnapshotSource for HostSnapshotSource {
    fn collect(
        &self,
        categories: &BTreeSet<SnapshotCategory>,
    ) -> Result<BTreeMap<String, f64>, CoreError> {
        let mut values = BTreeMap::new();
        for category in categories {
            let result = match category {
                SnapshotCategory::Cpu => self.collect_cpu(&mut values),
                SnapshotCategory::Disk => self.collect_disk(&mut values),
                SnapshotCategory::Accelerator => self.collect_accelerator(&mut values),
            };
            result.map_err(|e| CoreError::Snapshot(e.to_string()))?;
        }
        Ok(values)
    }
}
