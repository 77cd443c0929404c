use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host-wide utilization, as percentages of capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct HostUsage {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub disk_pct: f64,
    pub available_mb: u64,
}

/// Liveness and resource usage of one agent's recorded process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentUsage {
    pub running: bool,
    #[serde(rename = "cpu_percent")]
    pub cpu_pct: f64,
    #[serde(rename = "memory_percent")]
    pub mem_pct: f64,
}

/// Point-in-time host and per-agent state attached to an escalation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "cpu_percent")]
    pub cpu_pct: f64,
    #[serde(rename = "memory_percent")]
    pub mem_pct: f64,
    #[serde(rename = "disk_usage")]
    pub disk_pct: f64,
    #[serde(default)]
    pub active_processes: usize,
    #[serde(rename = "agents", default)]
    pub per_agent: BTreeMap<String, AgentUsage>,
    /// Set when host sampling failed or timed out; the host figures are then zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_error: Option<String>,
}

impl SystemSnapshot {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        SystemSnapshot {
            timestamp,
            cpu_pct: 0.0,
            mem_pct: 0.0,
            disk_pct: 0.0,
            active_processes: 0,
            per_agent: BTreeMap::new(),
            sampler_error: None,
        }
    }
}
