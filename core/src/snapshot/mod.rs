//! System snapshots taken at escalation time, and the bounded-time
//! helper every probe goes through.

pub mod sampler;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::agents::AgentRegistry;
use crate::clock::Clock;
use crate::error::ProbeError;
use crate::types::{AgentUsage, HostUsage, SystemSnapshot};

pub use sampler::{HostSampler, SysinfoSampler};


/// Run `probe` on a worker thread and wait at most `timeout` for it.
///
/// A probe that overruns is abandoned: its thread is detached and its
/// eventual result dropped. A probe that panics reports `Panicked`.
pub fn bounded<T, F>(name: &str, timeout: Duration, probe: F) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
{
    run_bounded(name, timeout, Arc::new(AtomicBool::new(false)), probe)
}

/// Sets the flag when the worker exits, including by panic.
struct Finished(Arc<AtomicBool>);

impl Drop for Finished {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn run_bounded<T, F>(
    name: &str,
    timeout: Duration,
    finished: Arc<AtomicBool>,
    probe: F,
) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("probe: {}", name))
        .spawn(move || {
            let _finished = Finished(finished);
            let _ = tx.send(probe());
        })
        .map_err(|e| ProbeError::Unavailable {
            probe: name.to_string(),
            reason: format!("cannot spawn probe thread: {}", e),
        })?;
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ProbeError::Timeout {
            probe: name.to_string(),
            after: timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ProbeError::Panicked {
            probe: name.to_string(),
        }),
    }
}

/// Bounded probing for one caller that never has more than one abandoned
/// worker outstanding. While the last timed-out probe is still running,
/// further calls time out at once instead of spawning another thread.
#[derive(Debug, Clone, Default)]
pub struct ProbeGate {
    abandoned: Arc<Mutex<Option<Arc<AtomicBool>>>>,
}

impl ProbeGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.abandoned.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True while a probe abandoned by this gate has not yet returned.
    pub fn is_stuck(&self) -> bool {
        self.lock()
            .as_ref()
            .map(|finished| !finished.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn run<T, F>(&self, name: &str, timeout: Duration, probe: F) -> Result<T, ProbeError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
    {
        if self.is_stuck() {
            tracing::debug!(probe = name, "previous probe still running, not starting another");
            return Err(ProbeError::Timeout {
                probe: name.to_string(),
                after: timeout,
            });
        }
        let finished = Arc::new(AtomicBool::new(false));
        let result = run_bounded(name, timeout, Arc::clone(&finished), probe);
        let mut abandoned = self.lock();
        if let Err(ProbeError::Timeout { .. }) = result {
            *abandoned = Some(finished);
        } else if abandoned.as_ref().map_or(false, |f| f.load(Ordering::SeqCst)) {
            *abandoned = None;
        }
        drop(abandoned);
        result
    }
}

/// Host usage, bounded by `timeout` and gated by `gate`.
pub fn sample_host(
    sampler: &Arc<dyn HostSampler>,
    gate: &ProbeGate,
    timeout: Duration,
) -> Result<HostUsage, ProbeError> {
    let sampler = Arc::clone(sampler);
    gate.run("host sampler", timeout, move || sampler.host_usage())
}


/// A snapshot plus the probe failure that degraded it, if any.
#[derive(Debug, Clone)]
pub struct Capture {
    pub snapshot: SystemSnapshot,
    pub failure: Option<ProbeError>,
}

pub struct SystemSnapshotter {
    sampler: Arc<dyn HostSampler>,
    registry: AgentRegistry,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    process_pattern: Option<String>,
    gate: ProbeGate,
}

impl SystemSnapshotter {
    pub fn new(
        sampler: Arc<dyn HostSampler>,
        registry: AgentRegistry,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        process_pattern: Option<String>,
    ) -> Self {
        SystemSnapshotter {
            sampler,
            registry,
            clock,
            timeout,
            process_pattern,
            gate: ProbeGate::new(),
        }
    }

    pub fn sampler(&self) -> &Arc<dyn HostSampler> {
        &self.sampler
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Sample host state and the given agents' processes.
    ///
    /// Never fails: a missing or stale pid gives `running = false` with zero
    /// usage, and a sampler that fails or overruns yields a zeroed snapshot
    /// with `sampler_error` set and the failure returned alongside.
    pub fn capture(&self, agent_ids: &[String]) -> Capture {
        let timestamp = self.clock.now();
        let pids: Vec<(String, Option<u32>)> = agent_ids
            .iter()
            .map(|agent| (agent.clone(), self.registry.read_pid(agent).pid()))
            .collect();
        let sampler = Arc::clone(&self.sampler);
        let pattern = self.process_pattern.clone();

        let sampled = self.gate.run("system snapshot", self.timeout, move || {
            let host = sampler.host_usage()?;
            let active = pattern.map(|p| sampler.count_matching(&p)).unwrap_or(0);
            let per_agent: BTreeMap<String, AgentUsage> = pids
                .into_iter()
                .map(|(agent, pid)| {
                    let usage = pid
                        .filter(|p| sampler.pid_exists(*p))
                        .and_then(|p| sampler.process_usage(p))
                        .unwrap_or_default();
                    (agent, usage)
                })
                .collect();
            Ok((host, active, per_agent))
        });

        match sampled {
            Ok((host, active_processes, per_agent)) => Capture {
                snapshot: SystemSnapshot {
                    timestamp,
                    cpu_pct: host.cpu_pct,
                    mem_pct: host.mem_pct,
                    disk_pct: host.disk_pct,
                    active_processes,
                    per_agent,
                    sampler_error: None,
                },
                failure: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "system snapshot degraded");
                let mut snapshot = SystemSnapshot::empty(timestamp);
                snapshot.per_agent = agent_ids
                    .iter()
                    .map(|a| (a.clone(), AgentUsage::default()))
                    .collect();
                snapshot.sampler_error = Some(e.to_string());
                Capture {
                    snapshot,
                    failure: Some(e),
                }
            }
        }
    }
}
