//! Fleetwatch core — fault detection and escalation for an agent fleet.
//!
//! Faults come from the health monitor's periodic checks or from external
//! callers. Each one is recorded, evaluated against per-kind escalation
//! rules, and, when a pattern warrants a human, turned into an escalated
//! issue with a system snapshot and suggested actions, raised as an alert.
//!
//! # Modules
//!
//! - [`types`] — Fault events, escalated issues, alerts, snapshots
//! - [`events`] — Bounded event ring with a JSONL durable log
//! - [`escalation`] — Escalation policy and the suggestion catalog
//! - [`snapshot`] — Host sampling and bounded-time system snapshots
//! - [`alerts`] — Bounded, atomically persisted alert list
//! - [`agents`] — Agent workspaces, pid files, liveness
//! - [`handler`] — The record → evaluate → escalate service object
//! - [`monitor`] — Health checks and the periodic monitor loop
//! - [`config`] — YAML configuration

pub mod agents;
pub mod alerts;
pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod events;
pub mod handler;
pub mod infrastructure;
pub mod monitor;
pub mod snapshot;
pub mod types;

pub use error::{FleetError, ProbeError, Result};
pub use handler::{EventSubmission, FaultHandler};
pub use monitor::{HealthMonitor, MonitorHandle, TickReport};
