//! Environment file materialization.
//!
//! The template is copied to the active path only when the active file
//! is absent — repeated runs never clobber live configuration.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::DeployError;

/// Result of a materialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    /// The active file was created from the template.
    Created,

    /// The active file already existed and was left untouched.
    AlreadyPresent,
}

/// Copy `template` to `active` unless `active` already exists.
pub fn materialize_env(template: &Path, active: &Path) -> Result<Materialized, DeployError> {
    if active.exists() {
        debug!(path = %active.display(), "active configuration present, leaving as is");
        return Ok(Materialized::AlreadyPresent);
    }

    if !template.is_file() {
        return Err(DeployError::ConfigMissing {
            path: template.to_path_buf(),
        });
    }

    if let Some(parent) = active.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(template, active)?;
    info!(
        template = %template.display(),
        active = %active.display(),
        "materialized configuration from template"
    );
    Ok(Materialized::Created)
}
