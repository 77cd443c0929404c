//! Append-only JSONL persistence for fault events and escalations.
//!
//! The error log holds one compact JSON `FaultEvent` per line. The
//! escalation log holds one pretty-printed `EscalatedIssue` per record,
//! so it is meant for humans and is never read back.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::{FleetError, Result};
use crate::types::FaultEvent;


/// Append a single event as a JSON line. Creates parent directories.
pub fn append_event(path: &Path, event: &FaultEvent) -> Result<()> {
    let line = serde_json::to_string(event)?;
    append_text(path, &line)
}

/// Append one pretty-printed JSON record followed by a newline.
pub fn append_pretty<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(record)?;
    append_text(path, &text)
}

fn append_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FleetError::io(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| FleetError::io(path, e))?;
    writeln!(file, "{}", text).map_err(|e| FleetError::io(path, e))
}

/// Load the last `limit` parseable events from a JSONL file, oldest first.
///
/// Blank lines are ignored; malformed lines are skipped with a warning.
/// A missing file yields an empty vec.
pub fn load_tail(path: &Path, limit: usize) -> Result<Vec<FaultEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path).map_err(|e| FleetError::io(path, e))?;
    let mut events = Vec::new();
    for (i, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<FaultEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = i + 1,
                    error = %e,
                    "skipping malformed error log line"
                );
            }
        }
    }
    if events.len() > limit {
        let excess = events.len() - limit;
        events.drain(0..excess);
    }
    Ok(events)
}
