//! Sync command - copy configuration and credential files.

use std::path::PathBuf;

use anyhow::Result;
use ccd_deploy::sync::{sync_files, CopyAction};
use clap::Args;

use crate::output::print_success;

use super::CommandContext;

/// Sync command.
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Source directory holding the files to copy.
    #[arg(long)]
    from: PathBuf,
}

impl SyncCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let manifest = ctx.manifest()?;
        let reports = sync_files(
            &self.from,
            &manifest.paths.project_dir,
            &manifest.sync.files,
        )?;

        let mut copied = 0;
        for report in &reports {
            match report.action {
                CopyAction::Copied => {
                    copied += 1;
                    println!("copied      {}", report.file.display());
                }
                CopyAction::UpToDate => {
                    println!("up to date  {}", report.file.display());
                }
            }
        }

        print_success(&format!("{copied} of {} files copied", reports.len()));
        Ok(())
    }
}
