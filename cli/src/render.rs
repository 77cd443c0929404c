//! Plain-text rendering for the listing commands.

use fleetwatch_core::agents::AgentStatus;
use fleetwatch_core::monitor::{CheckOutcome, TickReport};
use fleetwatch_core::types::{Alert, FaultEvent};


pub fn events(events: &[FaultEvent]) -> String {
    if events.is_empty() {
        return "no recorded faults".into();
    }
    events
        .iter()
        .map(|e| {
            format!(
                "{}  {:<8} {:<19} {:<12} {}",
                e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                e.severity,
                e.kind,
                e.agent_id.as_deref().unwrap_or("-"),
                e.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn alerts(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "no alerts".into();
    }
    alerts
        .iter()
        .map(|a| {
            let mut flags = Vec::new();
            if a.acknowledged {
                flags.push("acked");
            }
            if a.details.resolved {
                flags.push("resolved");
            }
            format!(
                "#{:<4} {}  {:<8} {}: {}{}",
                a.id,
                a.timestamp.format("%Y-%m-%d %H:%M:%S"),
                a.severity,
                a.title,
                a.message,
                if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn status_table(rows: &[AgentStatus]) -> String {
    if rows.is_empty() {
        return "no agents configured".into();
    }
    let mut lines = vec![format!("{:<20} {:<8} {:<8} {}", "AGENT", "PID", "RUNNING", "WORKSPACE")];
    for row in rows {
        lines.push(format!(
            "{:<20} {:<8} {:<8} {}",
            row.agent_id,
            row.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
            if row.running { "yes" } else { "no" },
            if row.workspace_exists { "present" } else { "missing" }
        ));
    }
    lines.join("\n")
}

pub fn tick_report(report: &TickReport) -> String {
    let mut lines: Vec<String> = report
        .checks
        .iter()
        .map(|c| match &c.outcome {
            CheckOutcome::Passed { events: 0 } => format!("{:<16} ok", c.check),
            CheckOutcome::Passed { events } => format!("{:<16} {} fault(s)", c.check, events),
            CheckOutcome::Failed { error } => format!("{:<16} failed: {}", c.check, error),
            CheckOutcome::Panicked => format!("{:<16} panicked", c.check),
        })
        .collect();
    for alert in &report.alerts {
        lines.push(format!("escalated: alert #{} {}", alert.id, alert.title));
    }
    lines.join("\n")
}

pub fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleetwatch_core::monitor::CheckReport;
    use fleetwatch_core::types::{FaultKind, Severity};

    #[test]
    fn event_lines_show_kind_and_agent() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let e = FaultEvent::new(FaultKind::AgentCrash, Severity::Medium, "exited", at).with_agent("w1");
        let out = events(&[e]);
        assert!(out.starts_with("2026-03-01 09:30:00"));
        assert!(out.contains("agent_crash"));
        assert!(out.contains("w1"));
        assert!(out.ends_with("exited"));
    }

    #[test]
    fn empty_lists_say_so() {
        assert_eq!(events(&[]), "no recorded faults");
        assert_eq!(alerts(&[]), "no alerts");
        assert_eq!(status_table(&[]), "no agents configured");
    }

    #[test]
    fn status_table_has_header_and_rows() {
        let rows = vec![AgentStatus {
            agent_id: "w1".into(),
            pid: Some(311),
            running: false,
            workspace_exists: true,
        }];
        let out = status_table(&rows);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("AGENT"));
        assert!(lines[1].contains("311"));
        assert!(lines[1].contains("no"));
        assert!(lines[1].ends_with("present"));
    }

    #[test]
    fn tick_report_lines() {
        let report = TickReport {
            started_at: Utc::now(),
            checks: vec![
                CheckReport {
                    check: "cpu".into(),
                    outcome: CheckOutcome::Passed { events: 0 },
                },
                CheckReport {
                    check: "conflicts".into(),
                    outcome: CheckOutcome::Failed {
                        error: "git missing".into(),
                    },
                },
            ],
            events_recorded: 1,
            alerts: Vec::new(),
        };
        let out = tick_report(&report);
        assert!(out.lines().next().unwrap().ends_with("ok"));
        assert!(out.contains("failed: git missing"));
    }

    #[test]
    fn numbered_list() {
        assert_eq!(numbered(&["a".into(), "b".into()]), "1. a\n2. b");
    }
}
