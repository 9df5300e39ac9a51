//! Error types for orchestrator adapters.

use thiserror::Error;

/// Orchestrator adapter errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The orchestrator binary could not be invoked at all.
    #[error("orchestrator unreachable: {0}")]
    Unreachable(String),

    /// The orchestrator ran but reported failure.
    #[error("orchestrator command failed: {command}: {detail}")]
    CommandFailed { command: String, detail: String },

    /// Status output could not be parsed.
    #[error("unparseable status output: {0}")]
    Parse(String),

    /// IO error talking to the subprocess.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Build a `CommandFailed` from a command line and its stderr.
    pub fn command_failed(command: impl Into<String>, stderr: &str) -> Self {
        let detail = stderr.trim();
        let detail = if detail.is_empty() {
            "no stderr output".to_string()
        } else {
            detail.to_string()
        };
        Self::CommandFailed {
            command: command.into(),
            detail,
        }
    }
}
