//! Error types for the fault engine.
//!
//! `FleetError` covers the API boundary and persistence; `ProbeError`
//! covers failed health probes. Neither is ever allowed to stop the
//! monitor loop: callers log them and turn them into low-severity events.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::FaultKind;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("alert not found: {0}")]
    AlertNotFound(u64),

    #[error("escalated issue not found for alert {0}")]
    IssueNotFound(u64),

    #[error("unknown fault kind: {0}")]
    UnknownKind(String),

    #[error("unknown severity: {0}")]
    UnknownSeverity(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl FleetError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        FleetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for failures of the durable layer (file writes, encoding).
    pub fn is_persistence(&self) -> bool {
        matches!(self, FleetError::Io { .. } | FleetError::Serialize(_))
    }
}

/// A health probe could not sample its target.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ProbeError {
    #[error("{probe} timed out after {after:?}")]
    Timeout { probe: String, after: Duration },

    #[error("{probe} unavailable: {reason}")]
    Unavailable { probe: String, reason: String },

    #[error("command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("{probe} panicked")]
    Panicked { probe: String },
}

impl ProbeError {
    /// Kind of the low-severity event recorded for this failure. A hung or
    /// crashed probe points at an overloaded host; anything else is a
    /// collaborator we depend on being unavailable.
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            ProbeError::Timeout { .. } | ProbeError::Panicked { .. } => FaultKind::SystemOverload,
            ProbeError::Unavailable { .. } | ProbeError::CommandFailed { .. } => {
                FaultKind::DependencyFailure
            }
        }
    }
}
