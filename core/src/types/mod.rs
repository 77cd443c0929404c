//! Data model shared by the stores, the policy, and the monitor.

pub mod alert;
pub mod fault;
pub mod issue;
pub mod snapshot;

pub use alert::{Alert, AlertKind};
pub use fault::{FaultEvent, FaultKind, Severity};
pub use issue::{EscalatedIssue, IssueRecord};
pub use snapshot::{AgentUsage, HostUsage, SystemSnapshot};
