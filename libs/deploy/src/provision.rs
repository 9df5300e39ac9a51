//! Host provisioning.
//!
//! An ordered, fail-fast plan of host mutations: package index update,
//! package installation, Docker engine enablement, service user, group
//! membership, firewall openings and the application log directory. The
//! plan itself is a pure function of the settings; `apply` executes it
//! through the command-runner capability.

use ccd_orchestrator::CommandRunner;
use tracing::info;

use crate::error::DeployError;
use crate::manifest::{Paths, ProvisionSettings};

/// Probe whose success means a step is already satisfied.
#[derive(Debug, Clone)]
pub struct SkipProbe {
    pub program: String,
    pub args: Vec<String>,
}

/// One provisioning step.
#[derive(Debug, Clone)]
pub struct ProvisionStep {
    /// Operator-facing step name.
    pub name: String,

    pub program: String,
    pub args: Vec<String>,

    /// Skip the step when this probe succeeds.
    pub skip_if: Option<SkipProbe>,
}

impl ProvisionStep {
    fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            skip_if: None,
        }
    }

    fn skip_if(mut self, program: &str, args: &[&str]) -> Self {
        self.skip_if = Some(SkipProbe {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        self
    }
}

/// Outcome of one applied step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    pub skipped: bool,
}

/// Build the provisioning plan for the given settings.
pub fn plan(settings: &ProvisionSettings, paths: &Paths) -> Vec<ProvisionStep> {
    let mut steps = vec![ProvisionStep::new(
        "update package index",
        "apt-get",
        &["update"],
    )];

    if !settings.packages.is_empty() {
        let mut args = vec!["install", "-y"];
        args.extend(settings.packages.iter().map(String::as_str));
        steps.push(ProvisionStep::new("install packages", "apt-get", &args));
    }

    steps.push(
        ProvisionStep::new(
            "enable docker engine",
            "systemctl",
            &["enable", "--now", "docker"],
        )
        .skip_if("systemctl", &["is-active", "--quiet", "docker"]),
    );

    let user = settings.service_user.as_str();
    steps.push(
        ProvisionStep::new(
            "create service user",
            "useradd",
            &[
                "--system",
                "--create-home",
                "--shell",
                "/usr/sbin/nologin",
                user,
            ],
        )
        .skip_if("id", &["-u", user]),
    );
    steps.push(ProvisionStep::new(
        "grant docker access",
        "usermod",
        &["-aG", "docker", user],
    ));

    for rule in &settings.firewall_allow {
        steps.push(ProvisionStep::new(
            &format!("allow firewall rule {rule}"),
            "ufw",
            &["allow", rule],
        ));
    }
    if !settings.firewall_allow.is_empty() {
        steps.push(ProvisionStep::new(
            "enable firewall",
            "ufw",
            &["--force", "enable"],
        ));
    }

    let log_dir = paths.log_dir_path();
    steps.push(ProvisionStep::new(
        "create log directory",
        "install",
        &["-d", "-o", user, "-g", user, &log_dir.display().to_string()],
    ));

    steps
}

/// Apply steps in order, failing fast on the first error.
pub async fn apply<R: CommandRunner>(
    runner: &R,
    steps: &[ProvisionStep],
) -> Result<Vec<StepReport>, DeployError> {
    let mut reports = Vec::with_capacity(steps.len());

    for step in steps {
        if let Some(probe) = &step.skip_if {
            if let Ok(out) = runner.run(&probe.program, &probe.args).await {
                if out.success() {
                    info!(step = %step.name, "already satisfied, skipping");
                    reports.push(StepReport {
                        name: step.name.clone(),
                        skipped: true,
                    });
                    continue;
                }
            }
        }

        info!(step = %step.name, "applying");
        let out = runner.run(&step.program, &step.args).await?;
        if !out.success() {
            let detail = out.stderr.trim();
            return Err(DeployError::ProvisionFailed {
                step: step.name.clone(),
                detail: if detail.is_empty() {
                    format!("exit status {}", out.status)
                } else {
                    detail.to_string()
                },
            });
        }

        reports.push(StepReport {
            name: step.name.clone(),
            skipped: false,
        });
    }

    Ok(reports)
}
