//! NVML-based accelerator metrics.
//!
//! [`AcceleratorCollector`] wraps the NVIDIA Management Library to
//! enumerate devices and read per-device utilisation, temperature and
//! memory.
//!
//! NVML initialisation is **gracefully optional**: without drivers the
//! collector logs a warning and reports no devices, so accelerator
//! categories simply yield no limits.

use std::sync::Arc;

use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use serde::Serialize;
use sysobserver_core::error::CoreError;
use sysobserver_core::limits::Retrieve;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Per-device reading taken from NVML.
#[derive(Debug, Clone, Serialize)]
pub struct AcceleratorMetrics {
    pub index: u32,
    pub name: String,
    pub utilization_percent: u32,
    pub temperature_celsius: u32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

impl AcceleratorMetrics {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total_mb == 0 {
            return 0.0;
        }
        self.memory_used_mb as f64 / self.memory_total_mb as f64 * 100.0
    }
}

pub struct AcceleratorCollector {
    /// `None` when NVML could not be initialised.
    nvml: Option<Nvml>,
}

impl Default for AcceleratorCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceleratorCollector {
    /// Attempt to initialise NVML, falling back to a collector with no
    /// devices.
    pub fn new() -> Self {
        let nvml = match Nvml::init() {
            Ok(nvml) => {
                tracing::info!("NVML initialised successfully");
                Some(nvml)
            }
            Err(e) => {
                tracing::warn!(error = %e, "NVML unavailable, accelerator limits disabled");
                None
            }
        };
        Self { nvml }
    }

    /// A collector that never reports devices.
    pub fn disabled() -> Self {
        Self { nvml: None }
    }

    pub fn is_available(&self) -> bool {
        self.nvml.is_some()
    }

    /// Indices of all visible devices.
    pub fn device_ids(&self) -> Vec<u32> {
        let count = self
            .nvml
            .as_ref()
            .and_then(|nvml| nvml.device_count().ok())
            .unwrap_or(0);
        (0..count).collect()
    }

    fn nvml(&self) -> Result<&Nvml, CoreError> {
        self.nvml
            .as_ref()
            .ok_or_else(|| CoreError::retrieval("accelerator", "NVML is not available"))
    }

    /// Read one device.
    pub fn read(&self, index: u32) -> Result<AcceleratorMetrics, CoreError> {
        let metric = format!("accelerator {index}");
        let err = |e: nvml_wrapper::error::NvmlError| CoreError::retrieval(&metric, e);

        let device = self.nvml()?.device_by_index(index).map_err(err)?;
        let name = device.name().unwrap_or_else(|_| format!("accelerator {index}"));
        let utilization = device.utilization_rates().map_err(err)?;
        let temperature = device.temperature(TemperatureSensor::Gpu).map_err(err)?;
        let memory = device.memory_info().map_err(err)?;

        Ok(AcceleratorMetrics {
            index,
            name,
            utilization_percent: utilization.gpu,
            temperature_celsius: temperature,
            memory_used_mb: memory.used / BYTES_PER_MB,
            memory_total_mb: memory.total / BYTES_PER_MB,
        })
    }

    /// Read every device. Any failing device fails the whole read.
    pub fn read_all(&self) -> Result<Vec<AcceleratorMetrics>, CoreError> {
        self.device_ids().into_iter().map(|i| self.read(i)).collect()
    }
}

/// Which value an [`AcceleratorProbe`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelReading {
    Utilization,
    Temperature,
}

/// Probe bound to one device and one reading.
pub struct AcceleratorProbe {
    collector: Arc<AcceleratorCollector>,
    device: u32,
    reading: AccelReading,
}

impl AcceleratorProbe {
    pub fn new(collector: Arc<AcceleratorCollector>, device: u32, reading: AccelReading) -> Self {
        Self {
            collector,
            device,
            reading,
        }
    }
}

impl Retrieve for AcceleratorProbe {
    fn retrieve(&self) -> Result<f64, CoreError> {
        let metrics = self.collector.read(self.device)?;
        Ok(match self.reading {
            AccelReading::Utilization => metrics.utilization_percent as f64,
            AccelReading::Temperature => metrics.temperature_celsius as f64,
        })
    }
}
