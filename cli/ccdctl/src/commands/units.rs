//! Units command - render and install systemd units.

use std::path::PathBuf;

use anyhow::Result;
use ccd_deploy::systemd::{self, UnitInstaller};
use ccd_orchestrator::SystemRunner;
use clap::{Args, Subcommand};

use crate::output::print_success;

use super::CommandContext;

/// Units command.
#[derive(Debug, Args)]
pub struct UnitsCommand {
    #[command(subcommand)]
    command: UnitsSubcommand,
}

#[derive(Debug, Subcommand)]
enum UnitsSubcommand {
    /// Write unit files, reload the daemon and enable the units.
    Install {
        /// Target unit directory.
        #[arg(long, default_value = systemd::DEFAULT_UNIT_DIR)]
        unit_dir: PathBuf,
    },

    /// Print the rendered unit files without installing them.
    Print,
}

impl UnitsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let manifest = ctx.manifest()?;

        match self.command {
            UnitsSubcommand::Install { unit_dir } => {
                let runner = SystemRunner;
                let installed = UnitInstaller::with_unit_dir(&runner, unit_dir)
                    .install(&manifest)
                    .await?;
                print_success(&format!("{} units installed and enabled", installed.len()));
            }
            UnitsSubcommand::Print => {
                for (spec, unit) in manifest.unit_services() {
                    println!("# {}", systemd::unit_name(&spec.name));
                    println!("{}", systemd::render_unit(&manifest, spec, unit));
                }
            }
        }

        Ok(())
    }
}
