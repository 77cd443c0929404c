//! Durable backends for the alert list.
//!
//! The store treats its backend as a load/replace log of alerts, so the
//! JSON file dashboards poll can be swapped for another store without
//! touching the policy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{FleetError, Result};
use crate::types::Alert;

pub trait AlertSink: Send + Sync {
    /// The full persisted list, oldest first. An absent store is empty.
    fn load(&self) -> Result<Vec<Alert>>;

    /// Replace the persisted list. Readers must never observe a partial list.
    fn store(&self, alerts: &[Alert]) -> Result<()>;
}


/// A JSON array file, rewritten atomically (write to a temp file in the
/// same directory, then rename over the target).
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSink { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertSink for JsonFileSink {
    fn load(&self) -> Result<Vec<Alert>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| FleetError::io(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn store(&self, alerts: &[Alert]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| FleetError::io(&parent, e))?;

        let json = serde_json::to_string_pretty(alerts)?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "alerts.json".into());
        let tmp_path = parent.join(format!(".{}.tmp", file_name));
        fs::write(&tmp_path, json).map_err(|e| FleetError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| FleetError::io(&self.path, e))?;
        Ok(())
    }
}


/// Volatile backend for tests and for running without a data directory.
#[derive(Debug, Default)]
pub struct MemorySink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertSink for MemorySink {
    fn load(&self) -> Result<Vec<Alert>> {
        Ok(self.alerts.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn store(&self, alerts: &[Alert]) -> Result<()> {
        *self.alerts.lock().unwrap_or_else(|e| e.into_inner()) = alerts.to_vec();
        Ok(())
    }
}
