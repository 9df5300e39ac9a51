//! Error types for the deployment sequencer.
//!
//! All variants are terminal for the current run. Nothing is retried
//! automatically; the operator fixes the root cause and re-invokes.

use std::path::PathBuf;
use std::time::Duration;

use ccd_orchestrator::OrchestratorError;
use thiserror::Error;

/// Deployment errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A preflight check failed; nothing has been mutated.
    #[error("preflight check failed: {check}")]
    PreflightFailed { check: String },

    /// Neither an active configuration nor a template to copy exists.
    #[error("configuration template missing: {path}")]
    ConfigMissing { path: PathBuf },

    /// A required service never became ready within its budget.
    #[error("service {service} did not become ready within {timeout:?}")]
    ServiceTimeout { service: String, timeout: Duration },

    /// Another deployment run holds the exclusive lock.
    #[error("another deployment is running (lock held at {path})")]
    LockHeld { path: PathBuf },

    /// A host provisioning step failed.
    #[error("provision step failed: {step}: {detail}")]
    ProvisionFailed { step: String, detail: String },

    /// A file-sync source is missing.
    #[error("source file missing: {path}")]
    SourceMissing { path: PathBuf },

    /// The init system rejected a unit operation.
    #[error("init system command failed: {command}: {detail}")]
    InitSystem { command: String, detail: String },

    /// A service's polling policy is unusable.
    #[error("invalid polling policy for {service}: {source}")]
    InvalidPolicy {
        service: String,
        #[source]
        source: ccd_readiness::PolicyError,
    },

    /// The external orchestrator failed or was unreachable.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
