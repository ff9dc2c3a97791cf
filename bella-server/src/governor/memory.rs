//! Memory utilization sampling

use std::sync::{Arc, Mutex};
use sysinfo::System;
use tracing::{debug, warn};

/// Source of system memory utilization, as a percentage
pub trait MemoryProbe: Send + Sync {
    /// Current utilization in percent, or `None` if it cannot be read
    fn utilization(&self) -> Option<f32>;
}

/// Reads utilization from the operating system
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn utilization(&self) -> Option<f32> {
        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        Some(system.used_memory() as f32 / total as f32 * 100.0)
    }
}

/// Reports a constant utilization
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub f32);

impl MemoryProbe for FixedProbe {
    fn utilization(&self) -> Option<f32> {
        Some(self.0)
    }
}

/// Samples memory and warns when a threshold is crossed
#[derive(Clone)]
pub struct MemoryMonitor {
    probe: Arc<dyn MemoryProbe>,
}

impl MemoryMonitor {
    pub fn new(probe: Arc<dyn MemoryProbe>) -> Self {
        Self { probe }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SysinfoProbe::new()))
    }

    pub fn fixed(percent: f32) -> Self {
        Self::new(Arc::new(FixedProbe(percent)))
    }

    /// Current utilization; unreadable samples count as 0%
    pub fn sample(&self) -> f32 {
        self.probe.utilization().unwrap_or(0.0)
    }

    /// Sample and log a warning if utilization is above `threshold`
    ///
    /// Returns the sampled utilization.
    pub fn check_pressure(&self, stage: &str, threshold: f32) -> f32 {
        let percent = self.sample();
        if percent > threshold {
            warn!(stage, memory_percent = percent, threshold, "High memory usage");
        } else {
            debug!(stage, memory_percent = percent, "Memory check");
        }
        percent
    }
}
