//! Preflight checks.
//!
//! Validated before any mutating action: on the first failure the run
//! aborts, reporting which check failed. Nothing needs rolling back
//! because nothing has been touched yet.

use std::path::PathBuf;

use tracing::debug;

use crate::error::DeployError;
use crate::manifest::DeployManifest;

/// One precondition check.
#[derive(Debug, Clone)]
pub struct Check {
    name: String,
    kind: CheckKind,
}

#[derive(Debug, Clone)]
enum CheckKind {
    FileExists(PathBuf),
    BinaryOnPath(String),
}

impl Check {
    /// Require a file to exist.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file {}", path.display()),
            kind: CheckKind::FileExists(path),
        }
    }

    /// Require a binary to be reachable on PATH.
    pub fn binary(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: format!("binary {name}"),
            kind: CheckKind::BinaryOnPath(name),
        }
    }

    /// The check's operator-facing name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn passes(&self) -> bool {
        match &self.kind {
            CheckKind::FileExists(path) => path.is_file(),
            CheckKind::BinaryOnPath(name) => which::which(name).is_ok(),
        }
    }
}

/// Build the check list for a manifest: required binaries, the compose
/// file, and the manifest's required files, in that order.
pub fn checks_for(manifest: &DeployManifest) -> Vec<Check> {
    let mut checks: Vec<Check> = manifest
        .preflight
        .require_binaries
        .iter()
        .map(|name| Check::binary(name.as_str()))
        .collect();

    checks.push(Check::file(manifest.paths.compose_path()));

    for file in &manifest.preflight.require_files {
        let resolved = if file.is_absolute() {
            file.clone()
        } else {
            manifest.paths.project_dir.join(file)
        };
        // The compose file may also be listed explicitly; skip the dup.
        if checks
            .iter()
            .any(|c| matches!(&c.kind, CheckKind::FileExists(p) if *p == resolved))
        {
            continue;
        }
        checks.push(Check::file(resolved));
    }

    checks
}

/// Run checks in order, failing fast on the first miss.
pub fn run_preflight(checks: &[Check]) -> Result<(), DeployError> {
    for check in checks {
        if check.passes() {
            debug!(check = check.name(), "preflight check passed");
        } else {
            return Err(DeployError::PreflightFailed {
                check: check.name().to_string(),
            });
        }
    }
    Ok(())
}
