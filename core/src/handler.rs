//! Fault handler — the service object every fault flows through.
//!
//! `record` appends to the event store, asks the escalation policy, and
//! on escalation captures a snapshot, looks up suggestions, writes the
//! escalation log, and raises an alert. The monitor loop and external
//! callers share one handler behind an `Arc`; each store serializes its
//! own writers.
//!
//! Nothing here returns a persistence failure to the caller. A failed
//! durable write is logged and recorded as a low-severity
//! DependencyFailure event held in memory only.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::{AgentRegistry, AgentStatus};
use crate::alerts::{AlertStore, JsonFileSink};
use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::error::{FleetError, ProbeError, Result};
use crate::escalation::{Decision, EscalationPolicy, SuggestionCatalog};
use crate::events::{log, EventStore};
use crate::snapshot::{HostSampler, SystemSnapshotter};
use crate::types::{Alert, EscalatedIssue, FaultEvent, FaultKind, IssueRecord, Severity};


/// A fault reported from outside the monitor, with kind and severity as
/// strings the way a control API receives them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSubmission {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub message: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
    /// RFC 3339; the handler's clock is used when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl EventSubmission {
    /// Validate into a `FaultEvent`. Unknown kinds or severities and
    /// unparseable timestamps are rejected.
    pub fn into_event(self, now: DateTime<Utc>) -> Result<FaultEvent> {
        let kind: FaultKind = self.kind.parse()?;
        let severity: Severity = self.severity.parse()?;
        let timestamp = match self.timestamp.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| FleetError::InvalidTimestamp(raw.to_string()))?,
        };
        let mut event = FaultEvent::new(kind, severity, self.message, timestamp);
        event.agent_id = self.agent_id.filter(|a| !a.is_empty());
        event.details = self.details;
        Ok(event)
    }
}

/// The low-severity event recorded when `check` could not sample its target.
pub fn probe_failure_event(error: &ProbeError, check: &str, at: DateTime<Utc>) -> FaultEvent {
    FaultEvent::new(
        error.fault_kind(),
        Severity::Low,
        format!("{} check failed: {}", check, error),
        at,
    )
    .with_detail("check", check)
    .with_detail("error", error.to_string())
}


pub struct FaultHandler {
    events: EventStore,
    policy: EscalationPolicy,
    catalog: SuggestionCatalog,
    snapshotter: SystemSnapshotter,
    alerts: AlertStore,
    issues: Mutex<Vec<IssueRecord>>,
    escalation_log: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl FaultHandler {
    pub fn new(
        events: EventStore,
        policy: EscalationPolicy,
        snapshotter: SystemSnapshotter,
        alerts: AlertStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        FaultHandler {
            events,
            policy,
            catalog: SuggestionCatalog,
            snapshotter,
            alerts,
            issues: Mutex::new(Vec::new()),
            escalation_log: None,
            clock,
        }
    }

    /// Also append each escalation to the pretty-JSON log at `path`.
    pub fn with_escalation_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.escalation_log = Some(path.into());
        self
    }

    /// Wire the file-backed stores under `config.data_dir`.
    pub fn from_config(
        config: &MonitorConfig,
        sampler: Arc<dyn HostSampler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = AgentRegistry::new(&config.workspace_root, config.agents.clone());
        let snapshotter = SystemSnapshotter::new(
            sampler,
            registry,
            Arc::clone(&clock),
            config.sampler_timeout(),
            config.process_pattern.clone(),
        );
        let events = EventStore::open(&config.error_log_path(), config.event_capacity);
        let alerts = AlertStore::open(
            Box::new(JsonFileSink::new(config.alerts_path())),
            config.alert_capacity,
        );
        FaultHandler::new(
            events,
            EscalationPolicy::new(&config.rules),
            snapshotter,
            alerts,
            clock,
        )
        .with_escalation_log(config.escalation_log_path())
    }

    fn lock_issues(&self) -> MutexGuard<'_, Vec<IssueRecord>> {
        self.issues.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn alert_store(&self) -> &AlertStore {
        &self.alerts
    }

    pub fn snapshotter(&self) -> &SystemSnapshotter {
        &self.snapshotter
    }

    pub fn registry(&self) -> &AgentRegistry {
        self.snapshotter.registry()
    }

    pub fn escalation_log(&self) -> Option<&Path> {
        self.escalation_log.as_deref()
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Record a fault and escalate it if the policy says so. Returns the
    /// alert raised, if any.
    pub fn record(&self, event: FaultEvent) -> Option<Alert> {
        tracing::debug!(
            kind = %event.kind,
            severity = %event.severity,
            agent = event.agent_id.as_deref().unwrap_or("-"),
            "fault recorded"
        );
        if let Err(e) = self.events.record(event.clone()) {
            self.persistence_failed("error log", &e);
        }
        match self.policy.decide(&event, &self.events, self.clock.now()) {
            Decision::Escalate { reason } => Some(self.escalate(event, reason)),
            Decision::Hold => None,
        }
    }

    /// Validate and record an externally reported fault.
    pub fn submit(&self, submission: EventSubmission) -> Result<Option<Alert>> {
        let event = submission.into_event(self.clock.now())?;
        Ok(self.record(event))
    }

    /// Record the failure of a health check as a low-severity event. It is
    /// evaluated like any other fault.
    pub fn record_probe_failure(&self, error: &ProbeError, check: &str) -> Option<Alert> {
        tracing::warn!(check, error = %error, "health check failed");
        self.record(probe_failure_event(error, check, self.clock.now()))
    }

    fn persistence_failed(&self, target: &str, error: &FleetError) {
        tracing::warn!(target_store = target, error = %error, "durable write failed, continuing in memory");
        let event = FaultEvent::new(
            FaultKind::DependencyFailure,
            Severity::Low,
            format!("{} write failed: {}", target, error),
            self.clock.now(),
        )
        .with_detail("store", target)
        .with_detail("error", error.to_string());
        self.events.record_in_memory(event);
    }

    // -----------------------------------------------------------------------
    // Escalation
    // -----------------------------------------------------------------------

    fn escalate(&self, event: FaultEvent, reason: String) -> Alert {
        tracing::warn!(kind = %event.kind, message = %event.message, reason = %reason, "escalating fault");

        let capture = self.snapshotter.capture(self.snapshotter.registry().agents());
        if let Some(failure) = &capture.failure {
            // Recorded but never evaluated: escalating here would capture
            // another snapshot from the same failing sampler.
            let degraded = probe_failure_event(failure, "system snapshot", self.clock.now());
            if let Err(e) = self.events.record(degraded) {
                self.persistence_failed("error log", &e);
            }
        }

        let issue = EscalatedIssue {
            timestamp: self.clock.now(),
            suggested_actions: self.catalog.suggestions_for(event.kind),
            triggering_event: event,
            reason,
            snapshot: capture.snapshot,
            resolved: false,
            resolved_at: None,
        };

        if let Some(path) = &self.escalation_log {
            if let Err(e) = log::append_pretty(path, &issue) {
                self.persistence_failed("escalation log", &e);
            }
        }

        let appended = self.alerts.append(issue.clone());
        if let Some(e) = &appended.error {
            self.persistence_failed("alert store", e);
        }
        let alert = appended.value;

        let mut issues = self.lock_issues();
        issues.push(IssueRecord {
            alert_id: alert.id,
            issue,
        });
        let excess = issues.len().saturating_sub(self.alerts.capacity());
        issues.drain(0..excess);
        drop(issues);

        tracing::info!(alert_id = alert.id, severity = %alert.severity, "alert raised");
        alert
    }

    // -----------------------------------------------------------------------
    // Queries and operator actions
    // -----------------------------------------------------------------------

    /// The last `count` recorded faults, most recent last.
    pub fn recent_errors(&self, count: usize) -> Vec<FaultEvent> {
        self.events.recent(count)
    }

    /// Issues escalated by this process, oldest first.
    pub fn escalated_issues(&self) -> Vec<IssueRecord> {
        self.lock_issues().clone()
    }

    pub fn alerts(&self, count: usize) -> Vec<Alert> {
        self.alerts.list(count)
    }

    pub fn suggestions_for(&self, kind: FaultKind) -> Vec<String> {
        self.catalog.suggestions_for(kind)
    }

    pub fn agent_status(&self) -> Vec<AgentStatus> {
        self.registry().status()
    }

    pub fn acknowledge(&self, alert_id: u64) -> Result<Alert> {
        let persisted = self.alerts.acknowledge(alert_id)?;
        if let Some(e) = &persisted.error {
            self.persistence_failed("alert store", e);
        }
        Ok(persisted.value)
    }

    /// Resolve the issue escalated under `alert_id`, in memory and in the
    /// persisted alert. An issue whose alert was truncated away is still
    /// resolved in memory; an alert from an earlier run is resolved on disk.
    pub fn resolve_issue(&self, alert_id: u64) -> Result<IssueRecord> {
        let now = self.clock.now();
        let in_memory = self
            .lock_issues()
            .iter_mut()
            .find(|r| r.alert_id == alert_id)
            .map(|record| {
                record.issue.resolve(now);
                record.clone()
            });

        match self.alerts.resolve(alert_id, now) {
            Ok(persisted) => {
                if let Some(e) = &persisted.error {
                    self.persistence_failed("alert store", e);
                }
                Ok(in_memory.unwrap_or(IssueRecord {
                    alert_id,
                    issue: persisted.value.details,
                }))
            }
            Err(FleetError::AlertNotFound(_)) => {
                in_memory.ok_or(FleetError::IssueNotFound(alert_id))
            }
            Err(e) => Err(e),
        }
    }
}
