//! Orchestrator capability interface for callchecker-deploy.
//!
//! The deployment sequencer never speaks a concrete tool's syntax; it
//! talks to an [`Orchestrator`] — build, start, stop, status, logs, and
//! exec-inside-service — implemented by an adapter over the real process
//! execution mechanism. Production uses [`Compose`] over the `docker
//! compose` CLI; tests substitute a fake.

mod compose;
mod error;
mod runner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use compose::Compose;
pub use error::OrchestratorError;
pub use runner::{CmdOutput, CommandRunner, SystemRunner};

/// Result alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Observed state of one managed service unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
    /// Service name as the orchestrator knows it.
    #[serde(alias = "Service")]
    pub name: String,

    /// Lifecycle state (running, exited, restarting, ...).
    #[serde(alias = "State")]
    pub state: String,

    /// Health status when the unit declares a healthcheck.
    #[serde(default, alias = "Health")]
    pub health: Option<String>,
}

impl ServiceState {
    /// Returns true if the unit is in the running state.
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// External orchestrator capabilities consumed by the sequencer.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Rebuild all managed service images.
    async fn build(&self) -> Result<()>;

    /// Start (or restart) all managed services.
    async fn up(&self) -> Result<()>;

    /// Stop and remove all managed services.
    async fn down(&self) -> Result<()>;

    /// List the current state of all managed services.
    async fn ps(&self) -> Result<Vec<ServiceState>>;

    /// Fetch recent log lines, combined or for a single service.
    async fn logs(&self, service: Option<&str>, tail: u32) -> Result<String>;

    /// Execute a command inside a running service.
    ///
    /// A non-zero exit status is a normal result (the probe answered
    /// not-ready), not an error; errors mean the orchestrator itself
    /// could not run the command.
    async fn exec(&self, service: &str, argv: &[String]) -> Result<CmdOutput>;
}
