//! Manifest command - validate or scaffold deployment manifests.

use anyhow::Result;
use ccd_deploy::manifest::EXAMPLE_MANIFEST;
use clap::{Args, Subcommand};

use crate::output::print_success;

use super::CommandContext;

/// Manifest command.
#[derive(Debug, Args)]
pub struct ManifestCommand {
    #[command(subcommand)]
    command: ManifestSubcommand,
}

#[derive(Debug, Subcommand)]
enum ManifestSubcommand {
    /// Load and validate the manifest.
    Validate,

    /// Print an example manifest for the Callchecker stack.
    Example,
}

impl ManifestCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ManifestSubcommand::Validate => {
                let manifest = ctx.manifest()?;
                print_success(&format!(
                    "manifest OK: {} services, project dir {}",
                    manifest.services.len(),
                    manifest.paths.project_dir.display()
                ));
            }
            ManifestSubcommand::Example => {
                print!("{EXAMPLE_MANIFEST}");
            }
        }
        Ok(())
    }
}
