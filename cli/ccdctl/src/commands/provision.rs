//! Provision command - prepare a fresh host for the stack.

use std::path::Path;

use anyhow::Result;
use ccd_deploy::{logrotate, provision};
use ccd_orchestrator::SystemRunner;
use clap::Args;

use crate::output::{print_info, print_success};

use super::CommandContext;

/// Provision command.
#[derive(Debug, Args)]
pub struct ProvisionCommand {
    /// Print the plan without executing it.
    #[arg(long)]
    dry_run: bool,

    /// Where to write the logrotate policy.
    #[arg(long, default_value = logrotate::DEFAULT_CONFIG_PATH)]
    logrotate_config: String,
}

impl ProvisionCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let manifest = ctx.manifest()?;
        let steps = provision::plan(&manifest.provision, &manifest.paths);

        if self.dry_run {
            for step in &steps {
                println!("{:<28} {} {}", step.name, step.program, step.args.join(" "));
            }
            println!(
                "{:<28} write {}",
                "install logrotate policy", self.logrotate_config
            );
            return Ok(());
        }

        let runner = SystemRunner;
        let reports = provision::apply(&runner, &steps).await?;

        let rendered = logrotate::render(
            &manifest.paths.log_dir_path(),
            manifest.provision.logrotate_keep,
        );
        logrotate::install(Path::new(&self.logrotate_config), &rendered)?;

        let skipped = reports.iter().filter(|r| r.skipped).count();
        if skipped > 0 {
            print_info(&format!("{skipped} steps already satisfied"));
        }
        print_success(&format!(
            "host provisioned ({} steps applied)",
            reports.len() - skipped
        ));
        Ok(())
    }
}
