//! Subprocess execution capability.
//!
//! Every external command the toolkit issues goes through
//! [`CommandRunner`], so both the compose adapter and the provisioning
//! steps can be exercised against a recording fake.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::OrchestratorError;

/// Captured result of one subprocess run.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    /// Process exit code (-1 when terminated by signal).
    pub status: i32,

    /// Captured stdout, lossily decoded.
    pub stdout: String,

    /// Captured stderr, lossily decoded.
    pub stderr: String,
}

impl CmdOutput {
    /// Returns true for a zero exit status.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Capability to run an external program and capture its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CmdOutput, OrchestratorError>;
}

/// Real runner over `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CmdOutput, OrchestratorError> {
        debug!(program, args = ?args, "running command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    OrchestratorError::Unreachable(format!("{program} not found on PATH"))
                }
                _ => OrchestratorError::Io(e),
            })?;

        let result = CmdOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(program, status = result.status, "command finished");
        Ok(result)
    }
}
