//! Logs command - fetch recent service logs from the orchestrator.

use anyhow::Result;
use ccd_orchestrator::Orchestrator;
use clap::Args;

use super::CommandContext;

/// Logs command.
#[derive(Debug, Args)]
pub struct LogsCommand {
    /// Service to fetch logs for (combined logs when omitted).
    #[arg(long, short)]
    service: Option<String>,

    /// Number of recent lines to fetch.
    #[arg(long, short = 'n', default_value = "100")]
    tail: u32,
}

impl LogsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let manifest = ctx.manifest()?;
        let orchestrator = ctx.orchestrator(&manifest);

        let logs = orchestrator.logs(self.service.as_deref(), self.tail).await?;
        print!("{logs}");
        Ok(())
    }
}
