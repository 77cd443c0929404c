use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fault::Severity;
use super::issue::EscalatedIssue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Escalation,
}

/// Operator-facing alert, one per escalation. Persisted as part of the
/// alert store file that dashboards poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub details: EscalatedIssue,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Alert {
    /// Build the alert for an escalated issue. Alerts are never less than
    /// `High`; a critical trigger keeps its severity.
    pub fn for_issue(id: u64, issue: EscalatedIssue) -> Self {
        let event = &issue.triggering_event;
        Alert {
            id,
            timestamp: issue.timestamp,
            kind: AlertKind::Escalation,
            severity: event.severity.max(Severity::High),
            title: format!("Error Escalated: {}", event.kind),
            message: event.message.clone(),
            details: issue,
            acknowledged: false,
        }
    }
}
