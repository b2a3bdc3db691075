//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`            |
//! | `probe`  | `Probe`          |
//! | `demo`   | `Demo`           |
//! | `config` | `Config`         |
//!
//! Commands return a [`RunStatus`]; only `main` turns it into an exit code.

pub mod config;
pub mod demo;
pub mod probe;
pub mod run;

pub use config::cmd_config;
pub use demo::cmd_demo;
pub use probe::cmd_probe;
pub use run::cmd_run;

use std::process::ExitCode;

/// How a command concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every scenario succeeded, or the command had nothing to verify.
    Passed,
    /// At least one scenario failed or timed out.
    Failed,
    /// The health check failed; nothing ran.
    ServerUnreachable,
}

impl RunStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            RunStatus::Passed => ExitCode::SUCCESS,
            RunStatus::Failed => ExitCode::from(1),
            RunStatus::ServerUnreachable => ExitCode::from(2),
        }
    }
}
