//! Resource governor
//!
//! Bounds the number of generation requests in flight and watches memory
//! utilization while they run.

pub mod admission;
pub mod memory;

pub use admission::{AdmissionGate, AdmissionPermit, Busy};
pub use memory::{FixedProbe, MemoryMonitor, MemoryProbe, SysinfoProbe};

use bella_common::config::GovernorConfig;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Admission gate plus memory monitor, shared through the application state
#[derive(Clone)]
pub struct ResourceGovernor {
    admission: AdmissionGate,
    memory: MemoryMonitor,
    config: GovernorConfig,
}

impl ResourceGovernor {
    pub fn new(config: GovernorConfig, memory: MemoryMonitor) -> Self {
        Self {
            admission: AdmissionGate::new(config.max_concurrent_requests),
            memory,
            config,
        }
    }

    /// Admit one request, or reject it as busy
    pub fn admit(&self) -> Result<AdmissionPermit, Busy> {
        let permit = self.admission.try_admit()?;
        self.memory
            .check_pressure("pre-generation", self.config.pre_generation_threshold);
        Ok(permit)
    }

    /// Memory check after an admitted request finishes its work
    pub fn finish(&self) -> f32 {
        self.memory
            .check_pressure("post-generation", self.config.post_generation_threshold)
    }

    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    pub fn capacity(&self) -> usize {
        self.admission.capacity()
    }

    pub fn memory(&self) -> &MemoryMonitor {
        &self.memory
    }

    /// Start the periodic memory monitor; it stops when `token` is cancelled
    pub fn spawn_monitor(&self, token: CancellationToken) -> JoinHandle<()> {
        let memory = self.memory.clone();
        let threshold = self.config.monitor_threshold;
        let period = Duration::from_secs(self.config.monitor_interval_secs.max(1));

        tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), threshold, "Memory monitor started");
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        memory.check_pressure("monitor", threshold);
                    }
                }
            }
            info!("Memory monitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_respects_config_bound() {
        let config = GovernorConfig {
            max_concurrent_requests: 2,
            ..Default::default()
        };
        let governor = ResourceGovernor::new(config, MemoryMonitor::fixed(10.0));
        let _a = governor.admit().unwrap();
        let _b = governor.admit().unwrap();
        assert!(governor.admit().is_err());
        assert_eq!(governor.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_monitor_stops_on_cancel() {
        let governor = ResourceGovernor::new(GovernorConfig::default(), MemoryMonitor::fixed(90.0));
        let token = CancellationToken::new();
        let handle = governor.spawn_monitor(token.clone());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
