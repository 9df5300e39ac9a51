//! Logrotate policy for the application log directory.
//!
//! Rotation is performed by the external logrotate collaborator; this
//! module only renders and installs its configuration: daily rotation,
//! a fixed number of kept generations, compressed.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::DeployError;

/// Default install path for the rendered policy.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logrotate.d/callchecker";

/// Render the logrotate policy for a log directory.
pub fn render(log_dir: &Path, keep: u32) -> String {
    format!(
        r#"{dir}/*.log {{
    daily
    rotate {keep}
    compress
    delaycompress
    missingok
    notifempty
    copytruncate
}}
"#,
        dir = log_dir.display(),
    )
}

/// Write the rendered policy to its config path.
pub fn install(config_path: &Path, contents: &str) -> Result<(), DeployError> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(config_path, contents)?;
    info!(path = %config_path.display(), "logrotate policy installed");
    Ok(())
}
