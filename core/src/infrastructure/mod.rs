//! Infrastructure seams for probing the outside world.
//!
//! `runner` executes external commands with a timeout; `vcs` uses it to
//! scan agent workspaces for merge conflicts.

pub mod runner;
pub mod vcs;

pub use runner::{CommandRunner, MockRunner, ProcessRunner};
