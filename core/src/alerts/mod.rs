//! The bounded list of operator-facing alerts, one per
//! escalation, persisted through an `AlertSink`.
//!
//! Every mutation runs under one lock: reload the persisted list, apply
//! the change, truncate to capacity, rewrite. Ids come from a counter
//! that only moves forward, so truncation never causes an id to be
//! handed out twice.

pub mod sink;

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{FleetError, Result};
use crate::types::{Alert, EscalatedIssue};

pub use sink::{AlertSink, JsonFileSink, MemorySink};

pub const DEFAULT_CAPACITY: usize = 50;


/// The result of a mutation whose in-memory effect always happens, with
/// the durable write's failure (if any) carried alongside.
#[derive(Debug)]
pub struct Persisted<T> {
    pub value: T,
    pub error: Option<FleetError>,
}

impl<T> Persisted<T> {
    fn from_write(value: T, write: Result<()>) -> Self {
        Persisted {
            value,
            error: write.err(),
        }
    }
}


struct State {
    alerts: Vec<Alert>,
    next_id: u64,
    /// The last write failed, so the sink is behind the in-memory list.
    unsynced: bool,
}

impl State {
    fn adopt(&mut self, mut alerts: Vec<Alert>, capacity: usize) {
        truncate_oldest(&mut alerts, capacity);
        let max_id = alerts.iter().map(|a| a.id).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id + 1);
        self.alerts = alerts;
    }
}

pub struct AlertStore {
    sink: Box<dyn AlertSink>,
    state: Mutex<State>,
    capacity: usize,
}

impl AlertStore {
    pub fn open(sink: Box<dyn AlertSink>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut state = State {
            alerts: Vec::new(),
            next_id: 1,
            unsynced: false,
        };
        match sink.load() {
            Ok(alerts) => state.adopt(alerts, capacity),
            Err(e) => tracing::warn!(error = %e, "could not load alerts, starting empty"),
        }
        AlertStore {
            sink,
            state: Mutex::new(state),
            capacity,
        }
    }

    pub fn in_memory(capacity: usize) -> Self {
        Self::open(Box::new(MemorySink::new()), capacity)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pick up changes another writer made to the persisted list. A load
    /// failure keeps the in-memory copy, and so does an unsynced store: the
    /// sink is missing alerts that only exist here.
    fn refresh(&self, state: &mut State) {
        if state.unsynced {
            return;
        }
        match self.sink.load() {
            Ok(alerts) => state.adopt(alerts, self.capacity),
            Err(e) => tracing::warn!(error = %e, "could not reload alerts, using cached list"),
        }
    }

    /// Raise the alert for an escalated issue.
    pub fn append(&self, issue: EscalatedIssue) -> Persisted<Alert> {
        let mut state = self.lock();
        self.refresh(&mut state);

        let alert = Alert::for_issue(state.next_id, issue);
        state.next_id += 1;
        state.alerts.push(alert.clone());
        truncate_oldest(&mut state.alerts, self.capacity);

        let write = self.write(&mut state);
        Persisted::from_write(alert, write)
    }

    /// The last `count` alerts, most recent last.
    pub fn list(&self, count: usize) -> Vec<Alert> {
        let state = self.lock();
        let skip = state.alerts.len().saturating_sub(count);
        state.alerts[skip..].to_vec()
    }

    pub fn get(&self, id: u64) -> Option<Alert> {
        self.lock().alerts.iter().find(|a| a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().alerts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acknowledge(&self, id: u64) -> Result<Persisted<Alert>> {
        self.update(id, |alert| alert.acknowledged = true)
    }

    pub fn resolve(&self, id: u64, at: DateTime<Utc>) -> Result<Persisted<Alert>> {
        self.update(id, |alert| alert.details.resolve(at))
    }

    fn update(&self, id: u64, apply: impl FnOnce(&mut Alert)) -> Result<Persisted<Alert>> {
        let mut state = self.lock();
        self.refresh(&mut state);
        let alert = state
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(FleetError::AlertNotFound(id))?;
        apply(alert);
        let updated = alert.clone();
        let write = self.write(&mut state);
        Ok(Persisted::from_write(updated, write))
    }

    fn write(&self, state: &mut State) -> Result<()> {
        let write = self.sink.store(&state.alerts);
        state.unsynced = write.is_err();
        write
    }
}

fn truncate_oldest(alerts: &mut Vec<Alert>, capacity: usize) {
    if alerts.len() > capacity {
        let excess = alerts.len() - capacity;
        alerts.drain(0..excess);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FaultEvent, FaultKind, Severity, SystemSnapshot};
    use std::sync::Arc;

    fn issue(msg: &str) -> EscalatedIssue {
        let now = Utc::now();
        EscalatedIssue {
            timestamp: now,
            triggering_event: FaultEvent::new(FaultKind::FileConflict, Severity::Medium, msg, now),
            reason: "5 file_conflict events within 600s (threshold 5)".into(),
            suggested_actions: vec!["Manually resolve merge conflicts".into()],
            snapshot: SystemSnapshot::empty(now),
            resolved: false,
            resolved_at: None,
        }
    }

    fn read_only() -> FleetError {
        FleetError::io(
            std::path::Path::new("/read-only/alerts.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        )
    }

    /// Sink whose writes always fail, for the degraded-durability path.
    struct BrokenSink;

    impl AlertSink for BrokenSink {
        fn load(&self) -> Result<Vec<Alert>> {
            Ok(Vec::new())
        }

        fn store(&self, _alerts: &[Alert]) -> Result<()> {
            Err(read_only())
        }
    }

    /// Memory-backed sink whose writes can be switched off.
    #[derive(Default)]
    struct FlakySink {
        inner: MemorySink,
        failing: std::sync::atomic::AtomicBool,
    }

    impl AlertSink for FlakySink {
        fn load(&self) -> Result<Vec<Alert>> {
            self.inner.load()
        }

        fn store(&self, alerts: &[Alert]) -> Result<()> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(read_only());
            }
            self.inner.store(alerts)
        }
    }

    impl AlertSink for Arc<FlakySink> {
        fn load(&self) -> Result<Vec<Alert>> {
            self.as_ref().load()
        }

        fn store(&self, alerts: &[Alert]) -> Result<()> {
            self.as_ref().store(alerts)
        }
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let store = AlertStore::in_memory(DEFAULT_CAPACITY);
        let a = store.append(issue("one"));
        let b = store.append(issue("two"));
        assert!(a.error.is_none());
        assert_eq!(a.value.id, 1);
        assert_eq!(b.value.id, 2);
        assert_eq!(store.list(10).len(), 2);
    }

    #[test]
    fn truncation_is_oldest_first_and_ids_never_reused() {
        let store = AlertStore::in_memory(DEFAULT_CAPACITY);
        for i in 0..75 {
            store.append(issue(&format!("m{}", i)));
            assert!(store.len() <= DEFAULT_CAPACITY);
        }
        let all = store.list(usize::MAX);
        assert_eq!(all.len(), 50);
        assert_eq!(all[0].id, 26);
        assert_eq!(all[0].message, "m25");
        assert_eq!(all[49].id, 75);
        let next = store.append(issue("after truncation"));
        assert_eq!(next.value.id, 76);
    }

    #[test]
    fn list_returns_most_recent_last() {
        let store = AlertStore::in_memory(DEFAULT_CAPACITY);
        for i in 0..5 {
            store.append(issue(&format!("m{}", i)));
        }
        let last = store.list(2);
        assert_eq!(last[0].message, "m3");
        assert_eq!(last[1].message, "m4");
    }

    #[test]
    fn persisted_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        {
            let store = AlertStore::open(Box::new(JsonFileSink::new(&path)), DEFAULT_CAPACITY);
            store.append(issue("first"));
            store.append(issue("second"));
        }
        let reopened = AlertStore::open(Box::new(JsonFileSink::new(&path)), DEFAULT_CAPACITY);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.append(issue("third")).value.id, 3);
    }

    #[test]
    fn acknowledge_and_resolve_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let store = AlertStore::open(Box::new(JsonFileSink::new(&path)), DEFAULT_CAPACITY);
        let id = store.append(issue("x")).value.id;

        let acked = store.acknowledge(id).unwrap();
        assert!(acked.error.is_none());
        assert!(acked.value.acknowledged);

        let at = Utc::now();
        let resolved = store.resolve(id, at).unwrap().value;
        assert!(resolved.details.resolved);
        assert_eq!(resolved.details.resolved_at, Some(at));

        let on_disk = JsonFileSink::new(&path).load().unwrap();
        assert!(on_disk[0].acknowledged);
        assert!(on_disk[0].details.resolved);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = AlertStore::in_memory(DEFAULT_CAPACITY);
        assert!(matches!(store.acknowledge(99), Err(FleetError::AlertNotFound(99))));
    }

    #[test]
    fn write_failure_keeps_alert_in_memory() {
        let store = AlertStore::open(Box::new(BrokenSink), DEFAULT_CAPACITY);
        let first = store.append(issue("kept"));
        assert!(first.error.as_ref().unwrap().is_persistence());
        assert_eq!(first.value.id, 1);

        let second = store.append(issue("also kept"));
        assert!(second.error.is_some());
        assert_eq!(second.value.id, 2);
        assert_eq!(store.len(), 2);

        let acked = store.acknowledge(2).unwrap();
        assert!(acked.error.is_some());
        assert!(acked.value.acknowledged);
        let ids: Vec<u64> = store.list(10).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(store.get(1).is_some());
    }

    #[test]
    fn recovered_sink_receives_alerts_written_while_failing() {
        let sink = Arc::new(FlakySink::default());
        let store = AlertStore::open(Box::new(Arc::clone(&sink)), DEFAULT_CAPACITY);
        store.append(issue("before outage"));

        sink.failing.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(store.append(issue("during outage")).error.is_some());
        assert_eq!(sink.inner.load().unwrap().len(), 1);

        sink.failing.store(false, std::sync::atomic::Ordering::SeqCst);
        let after = store.append(issue("after outage"));
        assert!(after.error.is_none());
        let on_sink: Vec<String> = sink.inner.load().unwrap().into_iter().map(|a| a.message).collect();
        assert_eq!(on_sink, vec!["before outage", "during outage", "after outage"]);
    }

    #[test]
    fn concurrent_appends_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let store = Arc::new(AlertStore::open(Box::new(JsonFileSink::new(&path)), DEFAULT_CAPACITY));
        std::thread::scope(|s| {
            for w in 0..2 {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    for i in 0..20 {
                        let appended = store.append(issue(&format!("w{}-{}", w, i)));
                        assert!(appended.error.is_none());
                    }
                });
            }
        });
        let on_disk = JsonFileSink::new(&path).load().unwrap();
        assert_eq!(on_disk.len(), 40);
        let mut ids: Vec<u64> = on_disk.iter().map(|a| a.id).collect();
        ids.dedup();
        assert_eq!(ids, (1..=40).collect::<Vec<u64>>());
    }
}
