//! Fault events — the typed, timestamped observations every other
//! component consumes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FleetError;


// ---------------------------------------------------------------------------
// FaultKind
// ---------------------------------------------------------------------------

/// The class of abnormal condition a fault event describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    AgentCrash,
    ResourceExhaustion,
    FileConflict,
    DependencyFailure,
    TaskTimeout,
    ContextDrift,
    SystemOverload,
}

impl FaultKind {
    pub const ALL: [FaultKind; 7] = [
        FaultKind::AgentCrash,
        FaultKind::ResourceExhaustion,
        FaultKind::FileConflict,
        FaultKind::DependencyFailure,
        FaultKind::TaskTimeout,
        FaultKind::ContextDrift,
        FaultKind::SystemOverload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::AgentCrash => "agent_crash",
            FaultKind::ResourceExhaustion => "resource_exhaustion",
            FaultKind::FileConflict => "file_conflict",
            FaultKind::DependencyFailure => "dependency_failure",
            FaultKind::TaskTimeout => "task_timeout",
            FaultKind::ContextDrift => "context_drift",
            FaultKind::SystemOverload => "system_overload",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        FaultKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| FleetError::UnknownKind(s.to_string()))
    }
}


// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How bad a fault is. Variants are declared in ascending order so the
/// derived `Ord` gives `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(FleetError::UnknownSeverity(s.to_string())),
        }
    }
}


// ---------------------------------------------------------------------------
// FaultEvent
// ---------------------------------------------------------------------------

/// A single observed fault. Immutable once built; the builder methods
/// consume `self` so an event is fully formed before it is recorded.
///
/// Serialized field names follow the durable log format (`type` for the
/// kind), which dashboards read directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: FaultKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl FaultEvent {
    pub fn new(
        kind: FaultKind,
        severity: Severity,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        FaultEvent {
            timestamp,
            kind,
            severity,
            message: message.into(),
            agent_id: None,
            details: Map::new(),
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
