//! Deployment manifest.
//!
//! Every path, service and timeout the toolkit uses comes from one
//! explicit TOML manifest loaded at the entry point and threaded through
//! calls — nothing is re-read from the environment ad hoc.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Example manifest for the Callchecker stack, also used as the default
/// scaffold by `ccd manifest example`.
pub const EXAMPLE_MANIFEST: &str = r#"# callchecker-deploy manifest

[paths]
project_dir = "/opt/callchecker"
log_dir = "/var/log/callchecker"

[deploy]
poll_interval_secs = 2
settle_secs = 10
log_scan_tail = 200
startup = "compose"

[preflight]
require_binaries = ["docker"]
require_files = [
    "docker-compose.yml",
    "bitrix24/google_sheets_credentials.json",
    "bitrix24/bitrix_portals.json",
]

[[services]]
name = "postgres"
required = true
timeout_secs = 60
probe = { kind = "exec", argv = ["pg_isready", "-U", "callchecker"] }

[[services]]
name = "redis"
required = false
timeout_secs = 30
probe = { kind = "exec", argv = ["redis-cli", "ping"] }

[[services]]
name = "bitrix24-sync"
unit = { exec_start = "/usr/bin/python3 bitrix24/main.py", description = "Callchecker Bitrix24 sync" }

[[services]]
name = "recognition"
unit = { exec_start = "/usr/bin/python3 dialogue_recognition.py", description = "Callchecker dialogue recognition" }

[[services]]
name = "analysis"
unit = { exec_start = "/usr/bin/python3 dialog_analysis.py", description = "Callchecker dialogue analysis" }

[[services]]
name = "sheets-sync"
unit = { exec_start = "/usr/bin/python3 google_sheet/google_sheets_synchronizer.py", description = "Callchecker Google Sheets sync" }

[provision]
packages = ["ca-certificates", "curl", "git", "logrotate", "ufw", "docker.io", "docker-compose-v2"]
service_user = "callchecker"
firewall_allow = ["OpenSSH", "443/tcp"]
logrotate_keep = 30

[sync]
files = [
    "bitrix24/google_sheets_credentials.json",
    "bitrix24/bitrix_portals.json",
    ".env",
]
"#;

/// Top-level deployment manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployManifest {
    /// Filesystem layout.
    pub paths: Paths,

    /// Sequencer settings.
    #[serde(default)]
    pub deploy: DeploySettings,

    /// Preflight checks run before any mutating action.
    #[serde(default)]
    pub preflight: PreflightSettings,

    /// Managed services, in startup/polling order.
    #[serde(default)]
    pub services: Vec<ServiceSpec>,

    /// Host provisioning settings.
    #[serde(default)]
    pub provision: ProvisionSettings,

    /// File-sync helper settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl DeployManifest {
    /// Load and validate a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid manifest: {}", path.display()))
    }

    /// Parse and validate a manifest from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(contents).context("invalid manifest TOML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check manifest invariants.
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            bail!("manifest declares no services");
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                bail!("service with empty name");
            }
            if !seen.insert(service.name.as_str()) {
                bail!("duplicate service name: {}", service.name);
            }
            if service.timeout_secs == 0 {
                bail!("service {}: timeout must be positive", service.name);
            }
            match &service.probe {
                ProbeSpec::Exec { argv } if argv.is_empty() => {
                    bail!("service {}: exec probe needs a command", service.name);
                }
                ProbeSpec::Tcp { port } if *port == 0 => {
                    bail!("service {}: tcp probe needs a non-zero port", service.name);
                }
                _ => {}
            }
        }

        if self.deploy.poll_interval_secs == 0 {
            bail!("poll interval must be positive");
        }

        if self.deploy.startup == StartupMode::Systemd
            && !self.services.iter().any(|s| s.unit.is_some())
        {
            bail!("startup = \"systemd\" but no service declares a unit");
        }

        Ok(())
    }

    /// Services that declare a systemd unit.
    pub fn unit_services(&self) -> impl Iterator<Item = (&ServiceSpec, &UnitSpec)> {
        self.services
            .iter()
            .filter_map(|s| s.unit.as_ref().map(|u| (s, u)))
    }
}

/// Filesystem layout. Relative entries resolve against `project_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Deployment root on the host.
    pub project_dir: PathBuf,

    /// Compose file consumed by the orchestrator.
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,

    /// Active environment file.
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    /// Template the active environment file is materialized from.
    #[serde(default = "default_env_template")]
    pub env_template: PathBuf,

    /// Application log directory (rotated externally).
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Lock file guarding against concurrent deployment runs.
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_env_template() -> PathBuf {
    PathBuf::from(".env.example")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/callchecker")
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("deploy.lock")
}

impl Paths {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    /// Absolute compose file path.
    pub fn compose_path(&self) -> PathBuf {
        self.resolve(&self.compose_file)
    }

    /// Absolute active environment file path.
    pub fn env_path(&self) -> PathBuf {
        self.resolve(&self.env_file)
    }

    /// Absolute environment template path.
    pub fn env_template_path(&self) -> PathBuf {
        self.resolve(&self.env_template)
    }

    /// Absolute lock file path.
    pub fn lock_path(&self) -> PathBuf {
        self.resolve(&self.lock_file)
    }

    /// Absolute log directory.
    pub fn log_dir_path(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }
}

/// How the final startup step brings services up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartupMode {
    /// Orchestrator-managed startup (`up` on all services).
    #[default]
    Compose,

    /// Restart the installed systemd units.
    Systemd,
}

/// Sequencer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Fixed readiness polling interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Settle delay before the aggregate status check.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    /// How many recent combined log lines to scan for the error marker.
    #[serde(default = "default_log_scan_tail")]
    pub log_scan_tail: u32,

    /// Final startup step variant.
    #[serde(default)]
    pub startup: StartupMode,
}

fn default_poll_interval() -> u64 {
    2
}

fn default_settle() -> u64 {
    10
}

fn default_log_scan_tail() -> u32 {
    200
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            settle_secs: default_settle(),
            log_scan_tail: default_log_scan_tail(),
            startup: StartupMode::default(),
        }
    }
}

impl DeploySettings {
    /// Polling interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Settle delay as a duration.
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

/// Preflight checks: required binaries and files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreflightSettings {
    /// Binaries that must be reachable on PATH.
    #[serde(default)]
    pub require_binaries: Vec<String>,

    /// Files that must exist (relative to the project directory).
    #[serde(default)]
    pub require_files: Vec<PathBuf>,
}

/// One managed service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name as the orchestrator knows it.
    pub name: String,

    /// Whether a readiness timeout fails the whole run.
    #[serde(default)]
    pub required: bool,

    /// Startup timeout budget in seconds.
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,

    /// Readiness probe, if any.
    #[serde(default)]
    pub probe: ProbeSpec,

    /// Systemd unit definition for the systemd startup variant.
    #[serde(default)]
    pub unit: Option<UnitSpec>,
}

fn default_service_timeout() -> u64 {
    60
}

impl ServiceSpec {
    /// Startup timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Readiness probe definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeSpec {
    /// No probe; the service is not readiness-gated.
    #[default]
    None,

    /// TCP connect to a local port.
    Tcp { port: u16 },

    /// Command executed inside the service; exit 0 means ready.
    Exec { argv: Vec<String> },
}

impl ProbeSpec {
    /// Returns true if a probe is configured.
    pub fn is_configured(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Systemd unit definition for one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSpec {
    /// ExecStart command line.
    pub exec_start: String,

    /// Unit description.
    #[serde(default)]
    pub description: Option<String>,

    /// Working directory; defaults to the project directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Host provisioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionSettings {
    /// System packages to install.
    #[serde(default)]
    pub packages: Vec<String>,

    /// Dedicated service user.
    #[serde(default = "default_service_user")]
    pub service_user: String,

    /// Firewall rules to allow (ufw syntax).
    #[serde(default)]
    pub firewall_allow: Vec<String>,

    /// Rotated log generations to keep.
    #[serde(default = "default_logrotate_keep")]
    pub logrotate_keep: u32,
}

fn default_service_user() -> String {
    "callchecker".to_string()
}

fn default_logrotate_keep() -> u32 {
    30
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            service_user: default_service_user(),
            firewall_allow: Vec::new(),
            logrotate_keep: default_logrotate_keep(),
        }
    }
}

/// File-sync helper settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Files to copy into the project directory, relative paths.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}
