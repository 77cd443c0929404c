//! Health monitor loop — runs the health checks on a fixed interval and
//! feeds what they find through the fault handler.
//!
//! The loop is a small state machine: `Idle → Sampling → Idle` every tick.
//! Checks run in a fixed order so the event store sees a deterministic
//! sequence. A panic in a check, or while recording what it found, is
//! caught; the remaining checks still run and the loop waits the longer
//! backoff before the next tick. The loop runs on its own thread and
//! stops when its `MonitorHandle` is stopped or dropped, finishing the
//! in-flight tick first.

pub mod checks;

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MonitorConfig;
use crate::error::ProbeError;
use crate::handler::FaultHandler;
use crate::infrastructure::runner::CommandRunner;
use crate::types::Alert;

pub use checks::{
    default_checks, AgentLivenessCheck, ConflictCheck, CpuCheck, HealthCheck, MemoryCheck,
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Sampling,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The check ran; `events` faults were found.
    Passed { events: usize },
    /// The check could not sample its target.
    Failed { error: String },
    Panicked,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub check: String,
    pub outcome: CheckOutcome,
}

/// What one tick did.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub checks: Vec<CheckReport>,
    pub events_recorded: usize,
    pub alerts: Vec<Alert>,
}

impl TickReport {
    /// True when some check panicked, which puts the loop into backoff.
    pub fn had_unhandled_failure(&self) -> bool {
        self.checks
            .iter()
            .any(|c| c.outcome == CheckOutcome::Panicked)
    }
}


pub struct HealthMonitor {
    handler: Arc<FaultHandler>,
    checks: Vec<Box<dyn HealthCheck>>,
    interval: Duration,
    backoff: Duration,
    state: Arc<Mutex<MonitorState>>,
}

impl HealthMonitor {
    pub fn new(
        handler: Arc<FaultHandler>,
        checks: Vec<Box<dyn HealthCheck>>,
        interval: Duration,
        backoff: Duration,
    ) -> Self {
        HealthMonitor {
            handler,
            checks,
            interval,
            backoff,
            state: Arc::new(Mutex::new(MonitorState::Idle)),
        }
    }

    /// The built-in checks with intervals from `config`.
    pub fn from_config(
        config: &MonitorConfig,
        handler: Arc<FaultHandler>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let checks = default_checks(config, &handler, runner);
        HealthMonitor::new(handler, checks, config.tick_interval(), config.backoff())
    }

    pub fn state(&self) -> MonitorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: MonitorState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn handler(&self) -> &Arc<FaultHandler> {
        &self.handler
    }

    /// Run every check once, in order, and record what they find.
    pub fn run_tick(&self) -> TickReport {
        self.set_state(MonitorState::Sampling);
        let mut report = TickReport {
            started_at: self.handler.now(),
            checks: Vec::with_capacity(self.checks.len()),
            events_recorded: 0,
            alerts: Vec::new(),
        };
        tracing::debug!(checks = self.checks.len(), "tick started");

        for check in &self.checks {
            let name = check.name().to_string();
            // Recording can panic as well as the check itself; both count
            // against this check only.
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
                self.check_once(check.as_ref(), &mut report)
            })) {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(check = %name, "health check panicked");
                    self.record_panic(&name, &mut report);
                    CheckOutcome::Panicked
                }
            };
            report.checks.push(CheckReport {
                check: name,
                outcome,
            });
        }

        self.set_state(MonitorState::Idle);
        tracing::debug!(
            events = report.events_recorded,
            alerts = report.alerts.len(),
            "tick finished"
        );
        report
    }

    fn check_once(&self, check: &dyn HealthCheck, report: &mut TickReport) -> CheckOutcome {
        match check.run(self.handler.now()) {
            Ok(events) => {
                let found = events.len();
                for event in events {
                    report.events_recorded += 1;
                    report.alerts.extend(self.handler.record(event));
                }
                CheckOutcome::Passed { events: found }
            }
            Err(e) => {
                report.events_recorded += 1;
                report
                    .alerts
                    .extend(self.handler.record_probe_failure(&e, check.name()));
                CheckOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn record_panic(&self, name: &str, report: &mut TickReport) {
        let e = ProbeError::Panicked {
            probe: name.to_string(),
        };
        match panic::catch_unwind(AssertUnwindSafe(|| self.handler.record_probe_failure(&e, name))) {
            Ok(alert) => {
                report.events_recorded += 1;
                report.alerts.extend(alert);
            }
            Err(_) => tracing::error!(check = %name, "recording the panic failed as well"),
        }
    }

    /// Start the loop on its own thread.
    pub fn spawn(self) -> std::io::Result<MonitorHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let state = Arc::clone(&self.state);
        let join = thread::Builder::new()
            .name("health-monitor".into())
            .spawn(move || self.run_loop(stop_rx))?;
        Ok(MonitorHandle {
            stop_tx,
            join: Some(join),
            state,
        })
    }

    fn run_loop(self, stop_rx: mpsc::Receiver<()>) {
        tracing::info!(
            checks = self.checks.len(),
            interval_secs = self.interval.as_secs(),
            "health monitor started"
        );
        loop {
            let report = self.run_tick();
            let delay = if report.had_unhandled_failure() {
                tracing::warn!(backoff_secs = self.backoff.as_secs(), "tick had a panicking check, backing off");
                self.backoff
            } else {
                self.interval
            };
            match stop_rx.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.set_state(MonitorState::Stopped);
        tracing::info!("health monitor stopped");
    }
}


/// Owner of a running monitor loop. Stopping (or dropping) it signals the
/// loop and waits for the thread to exit.
pub struct MonitorHandle {
    stop_tx: mpsc::Sender<()>,
    join: Option<JoinHandle<()>>,
    state: Arc<Mutex<MonitorState>>,
}

impl MonitorHandle {
    pub fn state(&self) -> MonitorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.stop_tx.send(());
            if join.join().is_err() {
                tracing::error!("health monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
