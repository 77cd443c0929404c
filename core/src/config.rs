//! Monitor configuration, loaded from `<config_dir>/fleetwatch.yaml`.
//!
//! Every field has a default, so a missing file or an empty document
//! yields a working configuration. Relative paths are resolved against
//! the config directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};
use crate::types::FaultKind;

pub const CONFIG_FILE: &str = "fleetwatch.yaml";
pub const ERROR_LOG_FILE: &str = "errors.log";
pub const ESCALATION_LOG_FILE: &str = "escalations.log";
pub const ALERTS_FILE: &str = "alerts.json";

/// Longest escalation window a rule may configure: 30 days.
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;


// ---------------------------------------------------------------------------
// EscalationRule
// ---------------------------------------------------------------------------

/// Escalate when `threshold` events of `kind` fall within the trailing `window_secs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscalationRule {
    pub kind: FaultKind,
    pub threshold: u32,
    pub window_secs: u64,
}

impl EscalationRule {
    pub fn new(kind: FaultKind, threshold: u32, window_secs: u64) -> Self {
        EscalationRule {
            kind,
            threshold,
            window_secs,
        }
    }

    /// The window as a signed duration, or `None` if it does not fit one.
    pub fn window(&self) -> Option<chrono::Duration> {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

/// The rules the fleet has always run with. Kinds not listed escalate
/// only at critical severity.
pub fn default_rules() -> Vec<EscalationRule> {
    vec![
        EscalationRule::new(FaultKind::AgentCrash, 3, 300),
        EscalationRule::new(FaultKind::ResourceExhaustion, 2, 120),
        EscalationRule::new(FaultKind::FileConflict, 5, 600),
        EscalationRule::new(FaultKind::SystemOverload, 1, 60),
    ]
}


// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory holding the error log, escalation log, and alert file.
    pub data_dir: PathBuf,
    /// Agent workspaces live at `<workspace_root>/<agent>`.
    pub workspace_root: PathBuf,
    pub agents: Vec<String>,
    pub tick_interval_secs: u64,
    pub backoff_secs: u64,
    pub cpu_threshold_pct: f64,
    pub memory_threshold_pct: f64,
    pub sampler_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub event_capacity: usize,
    pub alert_capacity: usize,
    /// Process-name substring counted into snapshots; `None` disables the count.
    pub process_pattern: Option<String>,
    pub rules: Vec<EscalationRule>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            data_dir: PathBuf::from("."),
            workspace_root: PathBuf::from("workspaces"),
            agents: Vec::new(),
            tick_interval_secs: 30,
            backoff_secs: 60,
            cpu_threshold_pct: 90.0,
            memory_threshold_pct: 85.0,
            sampler_timeout_secs: 5,
            command_timeout_secs: 10,
            event_capacity: 100,
            alert_capacity: 50,
            process_pattern: Some("claude".into()),
            rules: default_rules(),
        }
    }
}

impl MonitorConfig {
    /// Load `<config_dir>/fleetwatch.yaml`, falling back to defaults when
    /// the file does not exist, and resolve relative paths.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        let config = if path.exists() {
            let content =
                std::fs::read_to_string(&path).map_err(|e| FleetError::io(&path, e))?;
            Self::parse(&content)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            MonitorConfig::default()
        };
        Ok(config.resolved(config_dir))
    }

    /// Parse and validate a YAML document. Paths are left as written.
    pub fn parse(content: &str) -> Result<Self> {
        let config: MonitorConfig = if content.trim().is_empty() {
            MonitorConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| FleetError::Config(format!("invalid {}: {}", CONFIG_FILE, e)))?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(rule) = self.rules.iter().find(|r| r.threshold == 0) {
            return Err(FleetError::Config(format!(
                "rule for {} has threshold 0",
                rule.kind
            )));
        }
        if let Some(rule) = self.rules.iter().find(|r| r.window_secs > MAX_WINDOW_SECS) {
            return Err(FleetError::Config(format!(
                "rule for {} has window_secs {} (max {})",
                rule.kind, rule.window_secs, MAX_WINDOW_SECS
            )));
        }
        if self.event_capacity == 0 || self.alert_capacity == 0 {
            return Err(FleetError::Config("store capacities must be positive".into()));
        }
        if self.tick_interval_secs == 0 {
            return Err(FleetError::Config("tick_interval_secs must be positive".into()));
        }
        Ok(())
    }

    /// Anchor relative paths at `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        self.data_dir = base.join(&self.data_dir);
        self.workspace_root = base.join(&self.workspace_root);
        self
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.data_dir.join(ERROR_LOG_FILE)
    }

    pub fn escalation_log_path(&self) -> PathBuf {
        self.data_dir.join(ESCALATION_LOG_FILE)
    }

    pub fn alerts_path(&self) -> PathBuf {
        self.data_dir.join(ALERTS_FILE)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn sampler_timeout(&self) -> Duration {
        Duration::from_secs(self.sampler_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_defaults() {
        let cfg = MonitorConfig::parse("").unwrap();
        assert_eq!(cfg, MonitorConfig::default());
        assert_eq!(cfg.rules.len(), 4);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(30));
    }

    #[test]
    fn parse_partial_config() {
        let yaml = r#"
agents:
  - agent-auth
  - agent-review
cpu_threshold_pct: 75
rules:
  - kind: agent_crash
    threshold: 2
    window_secs: 60
"#;
        let cfg = MonitorConfig::parse(yaml).unwrap();
        assert_eq!(cfg.agents, vec!["agent-auth", "agent-review"]);
        assert_eq!(cfg.cpu_threshold_pct, 75.0);
        assert_eq!(cfg.memory_threshold_pct, 85.0);
        assert_eq!(cfg.rules, vec![EscalationRule::new(FaultKind::AgentCrash, 2, 60)]);
    }

    #[test]
    fn zero_threshold_rejected() {
        let yaml = "rules:\n  - kind: file_conflict\n    threshold: 0\n    window_secs: 10\n";
        let err = MonitorConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, FleetError::Config(msg) if msg.contains("file_conflict")));
    }

    #[test]
    fn oversized_window_rejected() {
        let yaml = "rules:\n  - kind: system_overload\n    threshold: 1\n    window_secs: 10000000000000\n";
        let err = MonitorConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, FleetError::Config(msg) if msg.contains("window_secs")));

        let at_limit = format!(
            "rules:\n  - kind: system_overload\n    threshold: 1\n    window_secs: {}\n",
            MAX_WINDOW_SECS
        );
        assert!(MonitorConfig::parse(&at_limit).is_ok());
    }

    #[test]
    fn window_conversion_saturates_to_none() {
        assert_eq!(
            EscalationRule::new(FaultKind::AgentCrash, 3, 300).window(),
            Some(chrono::Duration::seconds(300))
        );
        assert_eq!(EscalationRule::new(FaultKind::AgentCrash, 3, u64::MAX).window(), None);
    }

    #[test]
    fn unknown_kind_rejected() {
        let yaml = "rules:\n  - kind: gremlins\n    threshold: 1\n    window_secs: 10\n";
        assert!(MonitorConfig::parse(yaml).is_err());
    }

    #[test]
    fn load_missing_file_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = MonitorConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.alerts_path(), dir.path().join(".").join(ALERTS_FILE));
        assert_eq!(cfg.workspace_root, dir.path().join("workspaces"));
    }

    #[test]
    fn load_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("state");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            format!("data_dir: {}\n", data.display()),
        )
        .unwrap();
        let cfg = MonitorConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.error_log_path(), data.join(ERROR_LOG_FILE));
    }
}
