//! Host resource sampling.
//!
//! `HostSampler` is the seam between the monitor and the operating
//! system. `SysinfoSampler` is the production implementation; tests
//! substitute fakes that return fixed figures, fail, or hang.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use sysinfo::{Disks, Pid, System};

use crate::agents::pid_alive;
use crate::error::ProbeError;
use crate::types::{AgentUsage, HostUsage};

pub trait HostSampler: Send + Sync {
    /// Host-wide CPU, memory, and disk utilization.
    fn host_usage(&self) -> Result<HostUsage, ProbeError>;

    /// Resource usage of a live process, or `None` if it is not running.
    fn process_usage(&self, pid: u32) -> Option<AgentUsage>;

    fn pid_exists(&self, pid: u32) -> bool {
        pid_alive(pid)
    }

    /// Number of processes whose name contains `pattern` (case-insensitive).
    fn count_matching(&self, _pattern: &str) -> usize {
        0
    }
}

/// `sysinfo`-backed sampler. Keeps one `System` so successive CPU
/// readings measure the interval between calls.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        SysinfoSampler {
            system: Mutex::new(System::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler for SysinfoSampler {
    fn host_usage(&self) -> Result<HostUsage, ProbeError> {
        let mut sys = self.lock();

        // CPU usage is a delta; it needs two refreshes a minimum interval apart.
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();
        let cpu_pct = sys.global_cpu_usage() as f64;

        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(ProbeError::Unavailable {
                probe: "memory sampler".into(),
                reason: "total memory reported as zero".into(),
            });
        }
        let available = sys.available_memory().min(total);
        let mem_pct = (total - available) as f64 / total as f64 * 100.0;

        Ok(HostUsage {
            cpu_pct,
            mem_pct,
            disk_pct: root_disk_pct(),
            available_mb: available / (1024 * 1024),
        })
    }

    fn process_usage(&self, pid: u32) -> Option<AgentUsage> {
        let mut sys = self.lock();
        sys.refresh_all();
        let total = sys.total_memory();
        let process = sys.process(Pid::from_u32(pid))?;
        let mem_pct = if total == 0 {
            0.0
        } else {
            process.memory() as f64 / total as f64 * 100.0
        };
        Some(AgentUsage {
            running: true,
            cpu_pct: process.cpu_usage() as f64,
            mem_pct,
        })
    }

    fn count_matching(&self, pattern: &str) -> usize {
        let needle = pattern.to_lowercase();
        let mut sys = self.lock();
        sys.refresh_all();
        sys.processes()
            .values()
            .filter(|p| p.name().to_string_lossy().to_lowercase().contains(&needle))
            .count()
    }
}

/// Utilization of the disk mounted at `/`, or of the first disk when
/// there is no root mount (0.0 when no disks are visible).
fn root_disk_pct() -> f64 {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());
    match disk {
        Some(d) if d.total_space() > 0 => {
            let used = d.total_space().saturating_sub(d.available_space());
            used as f64 / d.total_space() as f64 * 100.0
        }
        _ => 0.0,
    }
}
