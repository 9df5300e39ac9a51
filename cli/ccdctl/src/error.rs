//! Error handling and display for the CLI.

use ccd_deploy::DeployError;
use ccd_orchestrator::OrchestratorError;
use colored::Colorize;

/// Print an error in a user-friendly format with a recovery hint.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(deploy_err) = err.downcast_ref::<DeployError>() {
        match deploy_err {
            DeployError::PreflightFailed { .. } => {
                hint("Fix the failed precondition and re-run; nothing was changed.");
            }
            DeployError::ConfigMissing { path } => {
                hint(&format!(
                    "Create the template at {} (or the active file it materializes).",
                    path.display()
                ));
            }
            DeployError::LockHeld { .. } => {
                hint("Another deployment is in progress. Wait for it to finish and re-run.");
            }
            DeployError::ServiceTimeout { service, .. } => {
                hint(&format!(
                    "Inspect the service with `ccd logs --service {service}` before retrying."
                ));
            }
            DeployError::Orchestrator(OrchestratorError::Unreachable(_)) => {
                hint("Is Docker installed and on PATH? `ccd provision` sets up the engine.");
            }
            _ => {}
        }
    }
}

fn hint(message: &str) {
    eprintln!("\n{}", format!("Hint: {message}").yellow());
}
