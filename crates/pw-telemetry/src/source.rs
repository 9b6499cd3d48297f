//! OS metrics sources.
//!
//! `MetricsSource` is the seam between the sampler loop and the platform.
//! Building a source is the one-time capability check; a failure there
//! disables sampling for the run. Failures from `read()` only skip a tick.

use sysinfo::{Networks, Pid, ProcessesToUpdate, System};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The host cannot provide metrics at all.
    #[error("metrics capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A single read failed; the next tick may succeed.
    #[error("transient sample failure: {0}")]
    TransientRead(String),
}

impl From<ProbeError> for pw_common::Error {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::CapabilityUnavailable(msg) => pw_common::Error::CapabilityMissing(msg),
            ProbeError::TransientRead(msg) => pw_common::Error::SampleFailed(msg),
        }
    }
}

/// Counters and gauges read in one tick, before any derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    /// Cumulative bytes sent, summed over interfaces.
    pub bytes_sent: u64,
    /// Cumulative bytes received, summed over interfaces.
    pub bytes_recv: u64,
    pub rss_bytes: u64,
    pub vms_bytes: u64,
    /// Process CPU usage as reported by the platform (may exceed 100).
    pub cpu_percent: f64,
    /// Memory the host can still hand out.
    pub available_memory_bytes: u64,
}

/// Something that can be polled for a `RawSample`.
pub trait MetricsSource: Send {
    fn read(&mut self) -> Result<RawSample, ProbeError>;
}

/// `sysinfo`-backed source observing the current process.
pub struct SysinfoSource {
    pid: Pid,
    system: System,
    networks: Networks,
}

impl SysinfoSource {
    pub fn new() -> Result<Self, ProbeError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProbeError::CapabilityUnavailable(
                "sysinfo does not support this platform".to_string(),
            ));
        }
        let pid = sysinfo::get_current_pid()
            .map_err(|e| ProbeError::CapabilityUnavailable(e.to_string()))?;

        let mut system = System::new();
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        if system.process(pid).is_none() {
            return Err(ProbeError::CapabilityUnavailable(format!(
                "process {pid} is not observable"
            )));
        }

        Ok(Self {
            pid,
            system,
            networks: Networks::new_with_refreshed_list(),
        })
    }

    fn network_totals(&self) -> (u64, u64) {
        self.networks
            .iter()
            .fold((0u64, 0u64), |(sent, recv), (_, data)| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    recv.saturating_add(data.total_received()),
                )
            })
    }
}

impl MetricsSource for SysinfoSource {
    fn read(&mut self) -> Result<RawSample, ProbeError> {
        self.networks.refresh(true);
        self.system.refresh_memory();
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        let process = self.system.process(self.pid).ok_or_else(|| {
            ProbeError::TransientRead(format!("process {} vanished from process table", self.pid))
        })?;

        let (bytes_sent, bytes_recv) = self.network_totals();
        Ok(RawSample {
            bytes_sent,
            bytes_recv,
            rss_bytes: process.memory(),
            vms_bytes: process.virtual_memory(),
            cpu_percent: f64::from(process.cpu_usage()),
            available_memory_bytes: self.system.available_memory(),
        })
    }
}

impl std::fmt::Debug for SysinfoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoSource")
            .field("pid", &self.pid)
            .field("interfaces", &self.networks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_maps_to_common_codes() {
        let cap: pw_common::Error = ProbeError::CapabilityUnavailable("x".into()).into();
        let tick: pw_common::Error = ProbeError::TransientRead("y".into()).into();
        assert_eq!(cap.code(), 20);
        assert_eq!(tick.code(), 21);
    }

    #[test]
    fn sysinfo_source_reads_self_when_supported() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let Ok(mut source) = SysinfoSource::new() else {
            return;
        };
        let sample = source.read().unwrap();
        assert!(sample.rss_bytes > 0);
        assert!(sample.cpu_percent >= 0.0);
    }
}
