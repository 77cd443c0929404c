//! Workspace conflict detection via `git status --porcelain`.

use std::path::Path;
use std::time::Duration;

use super::runner::CommandRunner;
use crate::error::ProbeError;

/// Porcelain status prefixes for unmerged paths the agents cannot resolve
/// on their own: both modified, and both added.
const CONFLICT_PREFIXES: [&str; 2] = ["UU ", "AA "];

/// The lines of a porcelain status report that denote a conflict.
pub fn conflict_lines(report: &str) -> Vec<String> {
    report
        .lines()
        .filter(|line| CONFLICT_PREFIXES.iter().any(|p| line.starts_with(p)))
        .map(|line| line.to_string())
        .collect()
}

/// Run the status command in `workspace` and return its conflict lines.
pub fn workspace_conflicts(
    runner: &dyn CommandRunner,
    workspace: &Path,
    timeout: Duration,
) -> Result<Vec<String>, ProbeError> {
    let report = runner.run("git", &["status", "--porcelain"], workspace, timeout)?;
    Ok(conflict_lines(&report))
}
