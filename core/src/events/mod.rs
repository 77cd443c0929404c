//! Fault event storage: a bounded in-memory ring of recent events backed
//! by an append-only durable log.
//!
//! All mutation goes through one mutex, so the ring and the log see the
//! same total order even with several writers. Reads copy out under the
//! lock and never hold it while the caller works on the result.

pub mod log;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{FaultEvent, FaultKind};

pub const DEFAULT_CAPACITY: usize = 100;


#[derive(Debug)]
pub struct EventStore {
    ring: Mutex<VecDeque<FaultEvent>>,
    log_path: Option<PathBuf>,
    capacity: usize,
}

impl EventStore {
    /// A store with no durable log.
    pub fn in_memory(capacity: usize) -> Self {
        EventStore {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            log_path: None,
            capacity: capacity.max(1),
        }
    }

    /// A store backed by the JSONL log at `log_path`. The tail of an
    /// existing log is loaded so window counts survive a restart; an
    /// unreadable log starts the store empty.
    pub fn open(log_path: &Path, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let loaded = match log::load_tail(log_path, capacity) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(path = %log_path.display(), error = %e, "could not reload error log");
                Vec::new()
            }
        };
        if !loaded.is_empty() {
            tracing::info!(count = loaded.len(), "reloaded recent fault events");
        }
        EventStore {
            ring: Mutex::new(loaded.into()),
            log_path: Some(log_path.to_path_buf()),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<FaultEvent>> {
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an event: durable log first, then the ring.
    ///
    /// The ring append happens even when the durable write fails; the
    /// write failure is returned so the caller can surface it.
    pub fn record(&self, event: FaultEvent) -> Result<()> {
        let mut ring = self.lock();
        let persisted = match &self.log_path {
            Some(path) => log::append_event(path, &event),
            None => Ok(()),
        };
        self.push(&mut ring, event);
        persisted
    }

    /// Record without touching the durable log.
    pub fn record_in_memory(&self, event: FaultEvent) {
        let mut ring = self.lock();
        self.push(&mut ring, event);
    }

    fn push(&self, ring: &mut VecDeque<FaultEvent>, event: FaultEvent) {
        ring.push_back(event);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// The last `n` events, most recent last.
    pub fn recent(&self, n: usize) -> Vec<FaultEvent> {
        let ring = self.lock();
        let skip = ring.len().saturating_sub(n);
        ring.iter().skip(skip).cloned().collect()
    }

    /// Count events of `kind` with `from <= timestamp <= to`.
    pub fn count_between(&self, kind: FaultKind, from: DateTime<Utc>, to: DateTime<Utc>) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.kind == kind && e.timestamp >= from && e.timestamp <= to)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use chrono::Duration;

    fn event_at(kind: FaultKind, msg: &str, ts: DateTime<Utc>) -> FaultEvent {
        FaultEvent::new(kind, Severity::Medium, msg, ts)
    }

    #[test]
    fn ring_evicts_oldest_first() {
        let store = EventStore::in_memory(DEFAULT_CAPACITY);
        let now = Utc::now();
        for i in 0..130 {
            store.record_in_memory(event_at(FaultKind::AgentCrash, &format!("e{}", i), now));
            assert!(store.len() <= DEFAULT_CAPACITY);
        }
        let all = store.recent(usize::MAX);
        assert_eq!(all.len(), 100);
        assert_eq!(all[0].message, "e30");
        assert_eq!(all[99].message, "e129");
    }

    #[test]
    fn recent_returns_most_recent_last() {
        let store = EventStore::in_memory(10);
        let now = Utc::now();
        for i in 0..5 {
            store.record(event_at(FaultKind::FileConflict, &format!("e{}", i), now)).unwrap();
        }
        let last_two = store.recent(2);
        assert_eq!(last_two[0].message, "e3");
        assert_eq!(last_two[1].message, "e4");
        assert_eq!(store.recent(0).len(), 0);
    }

    #[test]
    fn count_between_is_inclusive_and_kind_scoped() {
        let store = EventStore::in_memory(10);
        let t0 = Utc::now();
        store.record_in_memory(event_at(FaultKind::AgentCrash, "a", t0));
        store.record_in_memory(event_at(FaultKind::AgentCrash, "b", t0 + Duration::seconds(60)));
        store.record_in_memory(event_at(FaultKind::SystemOverload, "c", t0 + Duration::seconds(60)));
        assert_eq!(store.count_between(FaultKind::AgentCrash, t0, t0 + Duration::seconds(60)), 2);
        assert_eq!(
            store.count_between(FaultKind::AgentCrash, t0 + Duration::seconds(1), t0 + Duration::seconds(60)),
            1
        );
    }

    #[test]
    fn durable_log_written_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        {
            let store = EventStore::open(&path, 3);
            for i in 0..5 {
                store.record(event_at(FaultKind::AgentCrash, &format!("e{}", i), Utc::now())).unwrap();
            }
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);

        let reopened = EventStore::open(&path, 3);
        let messages: Vec<String> = reopened.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn failed_durable_write_still_buffers() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be makes every append fail.
        let path = dir.path().join("errors.log");
        std::fs::create_dir_all(&path).unwrap();
        let store = EventStore::open(&path, 10);
        let result = store.record(event_at(FaultKind::AgentCrash, "kept", Utc::now()));
        assert!(result.unwrap_err().is_persistence());
        assert_eq!(store.len(), 1);
        assert_eq!(store.recent(1)[0].message, "kept");
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let n = 40;
        let store = EventStore::in_memory(DEFAULT_CAPACITY);
        std::thread::scope(|s| {
            for w in 0..2 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..n {
                        store.record_in_memory(event_at(
                            FaultKind::TaskTimeout,
                            &format!("w{}-{}", w, i),
                            Utc::now(),
                        ));
                    }
                });
            }
        });
        assert_eq!(store.len(), (2 * n).min(DEFAULT_CAPACITY));
    }

    #[test]
    fn concurrent_writers_past_capacity() {
        let n = 80;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        let store = EventStore::open(&path, DEFAULT_CAPACITY);
        std::thread::scope(|s| {
            for w in 0..2 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..n {
                        store
                            .record(event_at(FaultKind::TaskTimeout, &format!("w{}-{}", w, i), Utc::now()))
                            .unwrap();
                    }
                });
            }
        });
        assert_eq!(store.len(), DEFAULT_CAPACITY);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2 * n);
        for line in text.lines() {
            serde_json::from_str::<FaultEvent>(line).unwrap();
        }
    }
}
