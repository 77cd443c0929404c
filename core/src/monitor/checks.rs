//! Built-in health checks.
//!
//! Each check samples one aspect of the fleet and returns the faults it
//! found. A check that cannot sample its target at all returns a
//! `ProbeError`; per-agent failures inside a check are turned into
//! low-severity events so the remaining agents are still checked.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::agents::{AgentRegistry, PidRecord};
use crate::config::MonitorConfig;
use crate::error::ProbeError;
use crate::handler::{probe_failure_event, FaultHandler};
use crate::infrastructure::runner::CommandRunner;
use crate::infrastructure::vcs;
use crate::snapshot::{sample_host, HostSampler, ProbeGate};
use crate::types::{FaultEvent, FaultKind, Severity};


pub trait HealthCheck: Send + Sync {
    /// Short stable name used in logs, tick reports, and probe-failure events.
    fn name(&self) -> &str;

    fn run(&self, now: DateTime<Utc>) -> Result<Vec<FaultEvent>, ProbeError>;
}

/// The four built-in checks in their fixed tick order: CPU, memory,
/// agent liveness, workspace conflicts.
pub fn default_checks(
    config: &MonitorConfig,
    handler: &FaultHandler,
    runner: Arc<dyn CommandRunner>,
) -> Vec<Box<dyn HealthCheck>> {
    let sampler = Arc::clone(handler.snapshotter().sampler());
    let registry = handler.registry().clone();
    vec![
        Box::new(CpuCheck::new(
            Arc::clone(&sampler),
            config.cpu_threshold_pct,
            config.sampler_timeout(),
        )),
        Box::new(MemoryCheck::new(
            Arc::clone(&sampler),
            config.memory_threshold_pct,
            config.sampler_timeout(),
        )),
        Box::new(AgentLivenessCheck::new(registry.clone(), sampler)),
        Box::new(ConflictCheck::new(registry, runner, config.command_timeout())),
    ]
}


// ---------------------------------------------------------------------------
// Host resources
// ---------------------------------------------------------------------------

/// Host CPU above the threshold is a SystemOverload.
pub struct CpuCheck {
    sampler: Arc<dyn HostSampler>,
    gate: ProbeGate,
    threshold_pct: f64,
    timeout: Duration,
}

impl CpuCheck {
    pub fn new(sampler: Arc<dyn HostSampler>, threshold_pct: f64, timeout: Duration) -> Self {
        CpuCheck {
            sampler,
            gate: ProbeGate::new(),
            threshold_pct,
            timeout,
        }
    }
}

impl HealthCheck for CpuCheck {
    fn name(&self) -> &str {
        "cpu"
    }

    fn run(&self, now: DateTime<Utc>) -> Result<Vec<FaultEvent>, ProbeError> {
        let usage = sample_host(&self.sampler, &self.gate, self.timeout)?;
        if usage.cpu_pct <= self.threshold_pct {
            return Ok(Vec::new());
        }
        Ok(vec![FaultEvent::new(
            FaultKind::SystemOverload,
            Severity::High,
            format!("High CPU usage: {:.1}%", usage.cpu_pct),
            now,
        )
        .with_detail("cpu_percent", usage.cpu_pct)])
    }
}

/// Host memory above the threshold is a ResourceExhaustion.
pub struct MemoryCheck {
    sampler: Arc<dyn HostSampler>,
    gate: ProbeGate,
    threshold_pct: f64,
    timeout: Duration,
}

impl MemoryCheck {
    pub fn new(sampler: Arc<dyn HostSampler>, threshold_pct: f64, timeout: Duration) -> Self {
        MemoryCheck {
            sampler,
            gate: ProbeGate::new(),
            threshold_pct,
            timeout,
        }
    }
}

impl HealthCheck for MemoryCheck {
    fn name(&self) -> &str {
        "memory"
    }

    fn run(&self, now: DateTime<Utc>) -> Result<Vec<FaultEvent>, ProbeError> {
        let usage = sample_host(&self.sampler, &self.gate, self.timeout)?;
        if usage.mem_pct <= self.threshold_pct {
            return Ok(Vec::new());
        }
        Ok(vec![FaultEvent::new(
            FaultKind::ResourceExhaustion,
            Severity::High,
            format!("High memory usage: {:.1}%", usage.mem_pct),
            now,
        )
        .with_detail("memory_percent", usage.mem_pct)
        .with_detail("available_mb", usage.available_mb)])
    }
}


// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// An agent whose pid file names a dead process has crashed. Agents with no
/// pid file were never started and are skipped.
pub struct AgentLivenessCheck {
    registry: AgentRegistry,
    sampler: Arc<dyn HostSampler>,
}

impl AgentLivenessCheck {
    pub fn new(registry: AgentRegistry, sampler: Arc<dyn HostSampler>) -> Self {
        AgentLivenessCheck { registry, sampler }
    }
}

impl HealthCheck for AgentLivenessCheck {
    fn name(&self) -> &str {
        "agent_liveness"
    }

    fn run(&self, now: DateTime<Utc>) -> Result<Vec<FaultEvent>, ProbeError> {
        let mut events = Vec::new();
        for agent in self.registry.agents() {
            match self.registry.read_pid(agent) {
                PidRecord::Missing => {}
                PidRecord::Unreadable(reason) => {
                    tracing::warn!(agent = %agent, reason = %reason, "ignoring unreadable pid file");
                }
                PidRecord::Recorded(pid) if !self.sampler.pid_exists(pid) => {
                    events.push(
                        FaultEvent::new(
                            FaultKind::AgentCrash,
                            Severity::Medium,
                            format!("Agent {} process {} is not running", agent, pid),
                            now,
                        )
                        .with_agent(agent.as_str())
                        .with_detail("crashed_pid", pid),
                    );
                }
                PidRecord::Recorded(_) => {}
            }
        }
        Ok(events)
    }
}

/// Scans each agent workspace for unmerged paths.
pub struct ConflictCheck {
    registry: AgentRegistry,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl ConflictCheck {
    pub fn new(registry: AgentRegistry, runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        ConflictCheck {
            registry,
            runner,
            timeout,
        }
    }
}

impl HealthCheck for ConflictCheck {
    fn name(&self) -> &str {
        "conflicts"
    }

    fn run(&self, now: DateTime<Utc>) -> Result<Vec<FaultEvent>, ProbeError> {
        let mut events = Vec::new();
        for agent in self.registry.agents() {
            let workspace = self.registry.workspace(agent);
            if !workspace.is_dir() {
                continue;
            }
            match vcs::workspace_conflicts(self.runner.as_ref(), &workspace, self.timeout) {
                Ok(conflicts) if conflicts.is_empty() => {}
                Ok(conflicts) => {
                    let count = conflicts.len();
                    let lines: Vec<Value> = conflicts.into_iter().map(Value::String).collect();
                    events.push(
                        FaultEvent::new(
                            FaultKind::FileConflict,
                            Severity::Medium,
                            format!("Merge conflicts in {} workspace: {} files", agent, count),
                            now,
                        )
                        .with_agent(agent.as_str())
                        .with_detail("conflicts", Value::Array(lines)),
                    );
                }
                Err(e) => {
                    tracing::warn!(agent = %agent, error = %e, "workspace status failed");
                    events.push(probe_failure_event(&e, self.name(), now).with_agent(agent.as_str()));
                }
            }
        }
        Ok(events)
    }
}
