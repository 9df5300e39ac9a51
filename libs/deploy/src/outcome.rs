//! Deployment outcome reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-service readiness result.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReadiness {
    /// Service name.
    pub name: String,

    /// Whether a timeout for this service fails the run.
    pub required: bool,

    /// Whether a readiness probe was configured.
    pub probed: bool,

    /// Final readiness verdict.
    pub ready: bool,

    /// Probe attempts performed.
    pub attempts: u32,

    /// Time spent waiting for this service.
    pub wait_ms: u64,
}

/// Non-fatal findings surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An optional service never became ready.
    OptionalServiceTimeout { service: String },

    /// The post-deploy log scan found an error marker.
    LogErrorMarker { line: String },
}

/// Aggregate result of one sequencer run. Produced once per run, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentOutcome {
    /// Overall verdict. Warnings do not clear this flag.
    pub success: bool,

    /// The required service whose readiness timeout failed the run.
    pub failed_service: Option<String>,

    /// Log tail fetched for the failed service, for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_log_tail: Option<String>,

    /// Per-service readiness, in polling order.
    pub services: Vec<ServiceReadiness>,

    /// Non-fatal findings.
    pub warnings: Vec<Warning>,

    /// Total run duration.
    pub elapsed_ms: u64,

    /// Completion timestamp.
    pub finished_at: DateTime<Utc>,
}

impl DeploymentOutcome {
    /// Succeeded, but with findings worth surfacing.
    pub fn succeeded_with_warnings(&self) -> bool {
        self.success && !self.warnings.is_empty()
    }
}

/// Scan combined log output for the error marker (case-insensitive
/// "error"). Returns the first matching line. Best-effort signal, not
/// authoritative.
pub fn find_error_marker(logs: &str) -> Option<String> {
    logs.lines()
        .find(|line| line.to_ascii_lowercase().contains("error"))
        .map(|line| line.trim().to_string())
}
