//! Escalation policy — decides whether a recorded fault must reach a
//! human operator.
//!
//! Critical events always escalate. Otherwise the event's kind needs a
//! rule, and the number of same-kind events in the store whose timestamp
//! lies in `[now - window, now]` (the just-recorded event included) must
//! reach the rule's threshold.

pub mod suggestions;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::{default_rules, EscalationRule};
use crate::events::EventStore;
use crate::types::{FaultEvent, FaultKind, Severity};

pub use suggestions::SuggestionCatalog;


/// Outcome of evaluating one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Escalate { reason: String },
    Hold,
}

impl Decision {
    pub fn should_escalate(&self) -> bool {
        matches!(self, Decision::Escalate { .. })
    }
}

#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    rules: HashMap<FaultKind, EscalationRule>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(&default_rules())
    }
}

impl EscalationPolicy {
    /// Build from a rule list. A kind listed twice keeps the last rule.
    pub fn new(rules: &[EscalationRule]) -> Self {
        let rules = rules.iter().map(|r| (r.kind, r.clone())).collect();
        EscalationPolicy { rules }
    }

    pub fn rule_for(&self, kind: FaultKind) -> Option<&EscalationRule> {
        self.rules.get(&kind)
    }

    pub fn evaluate(&self, event: &FaultEvent, store: &EventStore, now: DateTime<Utc>) -> bool {
        self.decide(event, store, now).should_escalate()
    }

    pub fn decide(&self, event: &FaultEvent, store: &EventStore, now: DateTime<Utc>) -> Decision {
        if event.severity == Severity::Critical {
            return Decision::Escalate {
                reason: "critical severity".into(),
            };
        }
        let rule = match self.rules.get(&event.kind) {
            Some(rule) => rule,
            None => return Decision::Hold,
        };
        // A window reaching past the representable range counts everything.
        let from = rule
            .window()
            .and_then(|w| now.checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let count = store.count_between(event.kind, from, now);
        if count >= rule.threshold as usize {
            Decision::Escalate {
                reason: format!(
                    "{} {} events within {}s (threshold {})",
                    count, event.kind, rule.window_secs, rule.threshold
                ),
            }
        } else {
            Decision::Hold
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(base: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
        base + Duration::seconds(secs)
    }

    fn crash(at: DateTime<Utc>) -> FaultEvent {
        FaultEvent::new(FaultKind::AgentCrash, Severity::Medium, "crashed", at)
    }

    /// Record then evaluate at the event's own time, as the handler does.
    fn record_and_evaluate(policy: &EscalationPolicy, store: &EventStore, event: FaultEvent) -> bool {
        let now = event.timestamp;
        store.record_in_memory(event.clone());
        policy.evaluate(&event, store, now)
    }

    #[test]
    fn critical_always_escalates() {
        let policy = EscalationPolicy::new(&[]);
        let store = EventStore::in_memory(10);
        for kind in FaultKind::ALL {
            let event = FaultEvent::new(kind, Severity::Critical, "boom", Utc::now());
            assert!(policy.evaluate(&event, &store, Utc::now()));
        }
    }

    #[test]
    fn three_crashes_inside_window_escalate_on_third() {
        let policy = EscalationPolicy::default();
        let store = EventStore::in_memory(100);
        let base = Utc::now();
        assert!(!record_and_evaluate(&policy, &store, crash(t(base, 0))));
        assert!(!record_and_evaluate(&policy, &store, crash(t(base, 100))));
        assert!(record_and_evaluate(&policy, &store, crash(t(base, 200))));
    }

    #[test]
    fn spread_out_crashes_never_escalate() {
        let policy = EscalationPolicy::default();
        let store = EventStore::in_memory(100);
        let base = Utc::now();
        for secs in [0, 400, 800] {
            assert!(!record_and_evaluate(&policy, &store, crash(t(base, secs))));
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let policy = EscalationPolicy::new(&[EscalationRule::new(FaultKind::AgentCrash, 2, 300)]);
        let store = EventStore::in_memory(10);
        let base = Utc::now();
        store.record_in_memory(crash(base));
        let second = crash(t(base, 300));
        store.record_in_memory(second.clone());
        assert!(policy.evaluate(&second, &store, t(base, 300)));
        assert!(!policy.evaluate(&second, &store, t(base, 301)));
    }

    #[test]
    fn future_dated_events_do_not_count() {
        let policy = EscalationPolicy::new(&[EscalationRule::new(FaultKind::FileConflict, 2, 600)]);
        let store = EventStore::in_memory(10);
        let now = Utc::now();
        store.record_in_memory(FaultEvent::new(FaultKind::FileConflict, Severity::Low, "x", t(now, 3600)));
        let current = FaultEvent::new(FaultKind::FileConflict, Severity::Low, "y", now);
        store.record_in_memory(current.clone());
        assert!(!policy.evaluate(&current, &store, now));
    }

    #[test]
    fn kinds_without_rule_hold_below_critical() {
        let policy = EscalationPolicy::default();
        let store = EventStore::in_memory(10);
        let now = Utc::now();
        for kind in [FaultKind::DependencyFailure, FaultKind::TaskTimeout, FaultKind::ContextDrift] {
            assert!(policy.rule_for(kind).is_none());
            for _ in 0..20 {
                let event = FaultEvent::new(kind, Severity::High, "again", now);
                store.record_in_memory(event.clone());
                assert!(!policy.evaluate(&event, &store, now));
            }
        }
    }

    #[test]
    fn system_overload_is_immediate() {
        let policy = EscalationPolicy::default();
        let store = EventStore::in_memory(10);
        let now = Utc::now();
        let event = FaultEvent::new(FaultKind::SystemOverload, Severity::Low, "cpu", now);
        store.record_in_memory(event.clone());
        match policy.decide(&event, &store, now) {
            Decision::Escalate { reason } => assert!(reason.contains("threshold 1")),
            Decision::Hold => panic!("expected escalation"),
        }
    }

    #[test]
    fn huge_window_counts_everything_without_overflow() {
        let base = Utc::now();
        for window_secs in [10_000_000_000_000, i64::MAX as u64, u64::MAX] {
            let policy = EscalationPolicy::new(&[EscalationRule::new(FaultKind::SystemOverload, 2, window_secs)]);
            let store = EventStore::in_memory(10);
            store.record_in_memory(FaultEvent::new(FaultKind::SystemOverload, Severity::Low, "old", t(base, -86_400 * 365)));
            let event = FaultEvent::new(FaultKind::SystemOverload, Severity::Low, "cpu", base);
            store.record_in_memory(event.clone());
            assert!(policy.evaluate(&event, &store, base));
        }
    }

    #[test]
    fn other_kinds_do_not_count_toward_window() {
        let policy = EscalationPolicy::default();
        let store = EventStore::in_memory(10);
        let now = Utc::now();
        for _ in 0..5 {
            store.record_in_memory(FaultEvent::new(FaultKind::FileConflict, Severity::Low, "c", now));
        }
        let event = FaultEvent::new(FaultKind::ResourceExhaustion, Severity::High, "mem", now);
        store.record_in_memory(event.clone());
        assert!(!policy.evaluate(&event, &store, now));
    }

    #[test]
    fn duplicate_rule_keeps_last() {
        let policy = EscalationPolicy::new(&[
            EscalationRule::new(FaultKind::AgentCrash, 3, 300),
            EscalationRule::new(FaultKind::AgentCrash, 1, 10),
        ]);
        assert_eq!(policy.rule_for(FaultKind::AgentCrash).unwrap().threshold, 1);
    }
}
