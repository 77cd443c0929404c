//! Fixed remediation hints per fault kind, attached to every escalation.

use crate::types::FaultKind;

pub const FALLBACK: &str = "Manual investigation required";

const AGENT_CRASH: &[&str] = &[
    "Check agent logs for specific error messages",
    "Verify system resources are sufficient",
    "Consider reducing agent workload",
    "Check for file permission issues",
    "Restart agent with preserved context",
];

const RESOURCE_EXHAUSTION: &[&str] = &[
    "Kill non-essential processes",
    "Increase system swap space",
    "Pause some agents temporarily",
    "Monitor memory usage patterns",
    "Consider upgrading hardware",
];

const FILE_CONFLICT: &[&str] = &[
    "Review recent commits for conflicts",
    "Check git status in agent worktrees",
    "Manually resolve merge conflicts",
    "Implement file locking mechanism",
    "Review agent file ownership rules",
];

const DEPENDENCY_FAILURE: &[&str] = &[
    "Check task completion status",
    "Verify dependency chain integrity",
    "Consider alternative dependency paths",
    "Update task status manually if needed",
    "Review agent coordination logic",
];

const SYSTEM_OVERLOAD: &[&str] = &[
    "Emergency stop all agents",
    "Check system CPU and memory usage",
    "Close unnecessary applications",
    "Restart system if needed",
    "Reduce number of concurrent agents",
];

/// Pure lookup from fault kind to ordered hints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestionCatalog;

impl SuggestionCatalog {
    pub fn suggestions_for(&self, kind: FaultKind) -> Vec<String> {
        let hints: &[&str] = match kind {
            FaultKind::AgentCrash => AGENT_CRASH,
            FaultKind::ResourceExhaustion => RESOURCE_EXHAUSTION,
            FaultKind::FileConflict => FILE_CONFLICT,
            FaultKind::DependencyFailure => DEPENDENCY_FAILURE,
            FaultKind::SystemOverload => SYSTEM_OVERLOAD,
            FaultKind::TaskTimeout | FaultKind::ContextDrift => &[FALLBACK],
        };
        hints.iter().map(|s| s.to_string()).collect()
    }

    /// Lookup by wire name; names that are not a known kind get the fallback.
    pub fn suggestions_for_name(&self, kind: &str) -> Vec<String> {
        match kind.parse::<FaultKind>() {
            Ok(kind) => self.suggestions_for(kind),
            Err(_) => vec![FALLBACK.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_hints() {
        let catalog = SuggestionCatalog;
        for kind in FaultKind::ALL {
            assert!(!catalog.suggestions_for(kind).is_empty(), "{}", kind);
        }
    }

    #[test]
    fn hints_are_ordered_and_stable() {
        let catalog = SuggestionCatalog;
        let crash = catalog.suggestions_for(FaultKind::AgentCrash);
        assert_eq!(crash.len(), 5);
        assert_eq!(crash[0], "Check agent logs for specific error messages");
        assert_eq!(crash[4], "Restart agent with preserved context");
        assert_eq!(crash, catalog.suggestions_for(FaultKind::AgentCrash));
    }

    #[test]
    fn unrecognized_kind_gets_single_fallback() {
        let catalog = SuggestionCatalog;
        assert_eq!(catalog.suggestions_for_name("solar_flare"), vec![FALLBACK.to_string()]);
        assert_eq!(catalog.suggestions_for(FaultKind::ContextDrift), vec![FALLBACK.to_string()]);
        assert_eq!(
            catalog.suggestions_for_name("system_overload")[0],
            "Emergency stop all agents"
        );
    }
}
