//! Deploy command - run the readiness-gated deployment sequence.

use anyhow::Result;
use ccd_deploy::systemd::SystemdStarter;
use ccd_deploy::{
    ComposeStarter, DeployError, DeployLock, DeploymentOutcome, Sequencer, ServiceStarter,
    StartupMode, Warning,
};
use ccd_orchestrator::SystemRunner;
use clap::Args;
use tabled::Tabled;

use crate::output::{print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

/// Deploy command. The manifest supplies every path, service and
/// timeout; there is nothing else to configure per invocation.
#[derive(Debug, Args)]
pub struct DeployCommand {}

impl DeployCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let manifest = ctx.manifest()?;

        // One deployment at a time; held for the whole run.
        let _lock = DeployLock::acquire(&manifest.paths.lock_path())?;

        let orchestrator = ctx.orchestrator(&manifest);
        let starter: Box<dyn ServiceStarter> = match manifest.deploy.startup {
            StartupMode::Compose => Box::new(ComposeStarter),
            StartupMode::Systemd => Box::new(SystemdStarter::new(SystemRunner, &manifest)),
        };

        let outcome = Sequencer::new(&manifest, &orchestrator, starter.as_ref())
            .run()
            .await?;

        match ctx.format {
            OutputFormat::Json => print_single(&outcome, ctx.format),
            OutputFormat::Table => print_outcome(&outcome),
        }

        if !outcome.success {
            let service = outcome.failed_service.clone().unwrap_or_default();
            let timeout = manifest
                .services
                .iter()
                .find(|s| s.name == service)
                .map(|s| s.timeout())
                .unwrap_or_default();
            return Err(DeployError::ServiceTimeout { service, timeout }.into());
        }

        Ok(())
    }
}

#[derive(Tabled)]
struct ReadinessRow {
    #[tabled(rename = "SERVICE")]
    service: String,

    #[tabled(rename = "READY")]
    ready: String,

    #[tabled(rename = "ATTEMPTS")]
    attempts: String,

    #[tabled(rename = "WAITED")]
    waited: String,
}

fn print_outcome(outcome: &DeploymentOutcome) {
    let rows: Vec<ReadinessRow> = outcome
        .services
        .iter()
        .map(|s| ReadinessRow {
            service: s.name.clone(),
            ready: if !s.probed {
                "-".to_string()
            } else if s.ready {
                "yes".to_string()
            } else {
                "no".to_string()
            },
            attempts: s.attempts.to_string(),
            waited: format!("{}s", s.wait_ms / 1000),
        })
        .collect();
    println!("{}", tabled::Table::new(rows));

    for warning in &outcome.warnings {
        match warning {
            Warning::OptionalServiceTimeout { service } => {
                print_warning(&format!("optional service {service} never became ready"));
            }
            Warning::LogErrorMarker { line } => {
                print_warning(&format!("error marker in recent logs: {line}"));
            }
        }
    }

    if let Some(tail) = &outcome.failure_log_tail {
        eprintln!("\nRecent logs of the failed service:\n{tail}");
    }

    if outcome.success {
        print_success(&format!(
            "deployment complete in {}s",
            outcome.elapsed_ms / 1000
        ));
    }
}
