use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fault::FaultEvent;
use super::snapshot::SystemSnapshot;

/// A fault (or fault pattern) surfaced to a human operator.
///
/// Mutable only through `resolve`; everything else is fixed at escalation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscalatedIssue {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "original_event")]
    pub triggering_event: FaultEvent,
    #[serde(rename = "escalation_reason")]
    pub reason: String,
    pub suggested_actions: Vec<String>,
    #[serde(rename = "system_state")]
    pub snapshot: SystemSnapshot,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscalatedIssue {
    /// Mark resolved. Resolving twice keeps the first resolution time.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(at);
        }
    }
}

/// An escalated issue paired with the id of the alert raised for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueRecord {
    pub alert_id: u64,
    pub issue: EscalatedIssue,
}
