//! Status command - show orchestrator state for the managed services.

use anyhow::Result;
use ccd_orchestrator::Orchestrator;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::print_output;

use super::CommandContext;

/// Status command.
#[derive(Debug, Args)]
pub struct StatusCommand {}

#[derive(Debug, Serialize, Tabled)]
struct StatusRow {
    #[tabled(rename = "SERVICE")]
    service: String,

    #[tabled(rename = "STATE")]
    state: String,

    #[tabled(rename = "HEALTH")]
    health: String,
}

impl StatusCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let manifest = ctx.manifest()?;
        let orchestrator = ctx.orchestrator(&manifest);

        let states = orchestrator.ps().await?;
        let rows: Vec<StatusRow> = states
            .into_iter()
            .map(|s| StatusRow {
                service: s.name,
                state: s.state,
                health: s.health.unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        print_output(&rows, ctx.format);
        Ok(())
    }
}
