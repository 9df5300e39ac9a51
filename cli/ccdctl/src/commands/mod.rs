//! CLI commands.

mod deploy;
mod logs;
mod manifest;
mod provision;
mod status;
mod sync;
mod units;

use std::path::PathBuf;

use anyhow::Result;
use ccd_deploy::DeployManifest;
use ccd_orchestrator::Compose;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// callchecker-deploy CLI - provision, deploy and inspect the stack.
#[derive(Debug, Parser)]
#[command(name = "ccd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Path to the deployment manifest.
    #[arg(
        long,
        global = true,
        env = "CCD_MANIFEST",
        default_value = "callchecker.toml"
    )]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full deployment sequence.
    Deploy(deploy::DeployCommand),

    /// Provision the host (packages, docker, user, firewall, logrotate).
    Provision(provision::ProvisionCommand),

    /// Install or print systemd units for the managed services.
    Units(units::UnitsCommand),

    /// Copy configuration and credential files into the project directory.
    Sync(sync::SyncCommand),

    /// Show orchestrator service status.
    Status(status::StatusCommand),

    /// Fetch recent service logs.
    Logs(logs::LogsCommand),

    /// Validate or scaffold deployment manifests.
    Manifest(manifest::ManifestCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        let ctx = CommandContext {
            manifest_path: self.manifest,
            format,
        };

        match self.command {
            Commands::Deploy(cmd) => cmd.run(ctx).await,
            Commands::Provision(cmd) => cmd.run(ctx).await,
            Commands::Units(cmd) => cmd.run(ctx).await,
            Commands::Sync(cmd) => cmd.run(ctx).await,
            Commands::Status(cmd) => cmd.run(ctx).await,
            Commands::Logs(cmd) => cmd.run(ctx).await,
            Commands::Manifest(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("ccd {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub manifest_path: PathBuf,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load and validate the manifest this invocation points at.
    pub fn manifest(&self) -> Result<DeployManifest> {
        DeployManifest::load(&self.manifest_path)
    }

    /// Compose orchestrator for the manifest's project.
    pub fn orchestrator(&self, manifest: &DeployManifest) -> Compose {
        Compose::new(
            manifest.paths.compose_path(),
            manifest.paths.project_dir.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_deploy_with_global_flags() {
        let cli = Cli::try_parse_from([
            "ccd",
            "--format",
            "json",
            "--manifest",
            "/opt/callchecker/callchecker.toml",
            "deploy",
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        assert_eq!(
            cli.manifest,
            PathBuf::from("/opt/callchecker/callchecker.toml")
        );
        assert!(matches!(cli.command, Commands::Deploy(_)));
    }

    #[test]
    fn manifest_defaults_to_local_file() {
        let cli = Cli::try_parse_from(["ccd", "status"]).unwrap();
        assert_eq!(cli.manifest, PathBuf::from("callchecker.toml"));
    }

    #[test]
    fn logs_accepts_service_and_tail() {
        let cli = Cli::try_parse_from(["ccd", "logs", "--service", "postgres", "-n", "50"]);
        assert!(cli.is_ok());
    }
}
