//! Where each watched agent keeps its workspace and
//! process-id file, and whether that process is still alive.
//!
//! The layout is fixed by the process spawner: `<workspace_root>/<agent>/`
//! is the agent's VCS worktree and `agent.pid` inside it holds the pid of
//! the running agent.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const PID_FILE: &str = "agent.pid";


/// What an agent's pid file says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidRecord {
    /// No pid file: the agent was never started (or was stopped cleanly).
    Missing,
    /// The file exists but does not hold a pid.
    Unreadable(String),
    Recorded(u32),
}

impl PidRecord {
    pub fn pid(&self) -> Option<u32> {
        match self {
            PidRecord::Recorded(pid) => Some(*pid),
            _ => None,
        }
    }
}

/// Liveness row for one agent, as shown by the status report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentStatus {
    pub agent_id: String,
    pub pid: Option<u32>,
    pub running: bool,
    pub workspace_exists: bool,
}

#[derive(Debug, Clone)]
pub struct AgentRegistry {
    workspace_root: PathBuf,
    agents: Vec<String>,
}

impl AgentRegistry {
    pub fn new(workspace_root: impl Into<PathBuf>, agents: Vec<String>) -> Self {
        AgentRegistry {
            workspace_root: workspace_root.into(),
            agents,
        }
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn workspace(&self, agent: &str) -> PathBuf {
        self.workspace_root.join(agent)
    }

    pub fn pid_file(&self, agent: &str) -> PathBuf {
        self.workspace(agent).join(PID_FILE)
    }

    pub fn read_pid(&self, agent: &str) -> PidRecord {
        read_pid_file(&self.pid_file(agent))
    }

    /// Per-agent liveness, in configuration order.
    pub fn status(&self) -> Vec<AgentStatus> {
        self.agents
            .iter()
            .map(|agent| {
                let pid = self.read_pid(agent).pid();
                AgentStatus {
                    agent_id: agent.clone(),
                    pid,
                    running: pid.map(pid_alive).unwrap_or(false),
                    workspace_exists: self.workspace(agent).is_dir(),
                }
            })
            .collect()
    }
}

pub fn read_pid_file(path: &Path) -> PidRecord {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PidRecord::Missing,
        Err(e) => return PidRecord::Unreadable(e.to_string()),
    };
    match contents.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => PidRecord::Recorded(pid),
        _ => PidRecord::Unreadable(format!("not a pid: {:?}", contents.trim())),
    }
}

/// Check if a process with the given pid exists.
///
/// `kill(pid, 0)` probes without sending a signal. EPERM means the process
/// exists but belongs to someone else. Pids that would address a process
/// group (0, or values that wrap negative) are never alive.
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if ret == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
