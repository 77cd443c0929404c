//! Command runner abstraction for executing external programs.
//!
//! `CommandRunner` is the trait probes use to run system commands.
//! `ProcessRunner` is the production implementation; it kills the child
//! once the timeout passes. `MockRunner` is the test double that records
//! calls and returns preset responses.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ProbeError;

/// Trait for running a program with arguments in a working directory.
pub trait CommandRunner: Send + Sync {
    /// Run to completion and return stdout. A non-zero exit is
    /// `CommandFailed`; overrunning `timeout` is `Timeout`.
    fn run(&self, program: &str, args: &[&str], cwd: &Path, timeout: Duration)
        -> Result<String, ProbeError>;
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Production runner that spawns the program directly (no shell).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<String, ProbeError> {
        let command = command_line(program, args);
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProbeError::Unavailable {
                probe: command.clone(),
                reason: e.to_string(),
            })?;

        // Drain both pipes on their own threads so a chatty child never
        // blocks on a full pipe while we poll for exit.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_reader = thread::spawn(move || read_pipe(stdout));
        let err_reader = thread::spawn(move || read_pipe(stderr));

        let deadline = Instant::now() + timeout;
        let mut interval = Duration::from_millis(5);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProbeError::Timeout {
                        probe: command,
                        after: timeout,
                    });
                }
                Ok(None) => {
                    thread::sleep(interval);
                    // Exponential backoff capped at 100ms
                    interval = std::cmp::min(interval * 2, Duration::from_millis(100));
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(ProbeError::Unavailable {
                        probe: command,
                        reason: e.to_string(),
                    });
                }
            }
        };

        let stdout = out_reader.join().unwrap_or_default();
        let stderr = err_reader.join().unwrap_or_default();
        if status.success() {
            Ok(stdout)
        } else {
            Err(ProbeError::CommandFailed {
                command,
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

fn read_pipe<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Test-double runner that records commands and returns pre-configured responses.
pub struct MockRunner {
    responses: Mutex<Vec<Result<String, ProbeError>>>,
    commands: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<Result<String, ProbeError>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: Mutex::new(reversed),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        _timeout: Duration,
    ) -> Result<String, ProbeError> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{} @ {}", command_line(program, args), cwd.display()));
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
