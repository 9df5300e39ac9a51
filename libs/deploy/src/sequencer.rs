//! The deployment sequencer.
//!
//! A single linear procedure: preflight checks, configuration
//! materialization, one-shot rebuild and restart, readiness gating per
//! service, then a settle delay, aggregate status query and log scan.
//! Stateless across invocations; every run recomputes from scratch.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use ccd_orchestrator::Orchestrator;
use ccd_readiness::{check_tcp, wait_ready, PollOutcome, PollPolicy};
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::env_file::{materialize_env, Materialized};
use crate::error::DeployError;
use crate::manifest::{DeployManifest, ProbeSpec, ServiceSpec};
use crate::outcome::{find_error_marker, DeploymentOutcome, ServiceReadiness, Warning};
use crate::preflight;

/// Per-attempt timeout for TCP probes.
const TCP_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Log lines fetched for a failed required service.
const FAILURE_LOG_TAIL: u32 = 100;

/// Pluggable final startup step.
///
/// The compose variant asks the orchestrator to bring everything up; the
/// systemd variant restarts pre-installed units instead.
#[async_trait]
pub trait ServiceStarter: Send + Sync {
    async fn start(&self, orchestrator: &dyn Orchestrator) -> Result<(), DeployError>;
}

/// Orchestrator-managed restart: stop everything, then bring it back up.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeStarter;

#[async_trait]
impl ServiceStarter for ComposeStarter {
    async fn start(&self, orchestrator: &dyn Orchestrator) -> Result<(), DeployError> {
        orchestrator.down().await?;
        orchestrator.up().await?;
        Ok(())
    }
}

/// Runs the deployment checklist against an orchestrator.
pub struct Sequencer<'a> {
    manifest: &'a DeployManifest,
    orchestrator: &'a dyn Orchestrator,
    starter: &'a dyn ServiceStarter,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        manifest: &'a DeployManifest,
        orchestrator: &'a dyn Orchestrator,
        starter: &'a dyn ServiceStarter,
    ) -> Self {
        Self {
            manifest,
            orchestrator,
            starter,
        }
    }

    /// Run the full deployment sequence.
    ///
    /// Preflight, configuration and orchestrator failures surface as
    /// errors; a required service missing its readiness budget is
    /// reported through the outcome (`success == false`) together with
    /// that service's log tail.
    pub async fn run(&self) -> Result<DeploymentOutcome, DeployError> {
        let started = Instant::now();

        info!("running preflight checks");
        let checks = preflight::checks_for(self.manifest);
        preflight::run_preflight(&checks)?;

        match materialize_env(
            &self.manifest.paths.env_template_path(),
            &self.manifest.paths.env_path(),
        )? {
            Materialized::Created => info!("environment configuration created from template"),
            Materialized::AlreadyPresent => debug!("environment configuration already present"),
        }

        info!("building services");
        self.orchestrator.build().await?;

        info!("starting services");
        self.starter.start(self.orchestrator).await?;

        let mut services = Vec::new();
        let mut warnings = Vec::new();

        for spec in &self.manifest.services {
            if !spec.probe.is_configured() {
                services.push(ServiceReadiness {
                    name: spec.name.clone(),
                    required: spec.required,
                    probed: false,
                    ready: true,
                    attempts: 0,
                    wait_ms: 0,
                });
                continue;
            }

            info!(
                service = %spec.name,
                timeout_secs = spec.timeout_secs,
                "waiting for readiness"
            );
            let policy = PollPolicy::new(self.manifest.deploy.poll_interval(), spec.timeout())
                .map_err(|source| DeployError::InvalidPolicy {
                    service: spec.name.clone(),
                    source,
                })?;

            match wait_ready(|| self.probe(spec), policy).await {
                PollOutcome::Ready { attempts, elapsed } => {
                    info!(
                        service = %spec.name,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "service ready"
                    );
                    services.push(ServiceReadiness {
                        name: spec.name.clone(),
                        required: spec.required,
                        probed: true,
                        ready: true,
                        attempts,
                        wait_ms: elapsed.as_millis() as u64,
                    });
                }
                PollOutcome::TimedOut { attempts, elapsed } => {
                    services.push(ServiceReadiness {
                        name: spec.name.clone(),
                        required: spec.required,
                        probed: true,
                        ready: false,
                        attempts,
                        wait_ms: elapsed.as_millis() as u64,
                    });

                    if spec.required {
                        warn!(
                            service = %spec.name,
                            attempts,
                            "required service not ready, aborting run"
                        );
                        let failure_log_tail = self.fetch_log_tail(&spec.name).await;
                        return Ok(DeploymentOutcome {
                            success: false,
                            failed_service: Some(spec.name.clone()),
                            failure_log_tail,
                            services,
                            warnings,
                            elapsed_ms: started.elapsed().as_millis() as u64,
                            finished_at: Utc::now(),
                        });
                    }

                    warn!(service = %spec.name, "optional service not ready, continuing");
                    warnings.push(Warning::OptionalServiceTimeout {
                        service: spec.name.clone(),
                    });
                }
            }
        }

        let settle = self.manifest.deploy.settle();
        if !settle.is_zero() {
            info!(settle_secs = self.manifest.deploy.settle_secs, "settling before status check");
            tokio::time::sleep(settle).await;
        }

        info!("querying aggregate service status");
        let states = self.orchestrator.ps().await?;
        for state in &states {
            info!(
                service = %state.name,
                state = %state.state,
                health = state.health.as_deref().unwrap_or("-"),
                "service status"
            );
        }

        let logs = self
            .orchestrator
            .logs(None, self.manifest.deploy.log_scan_tail)
            .await?;
        if let Some(line) = find_error_marker(&logs) {
            warn!(%line, "error marker in recent logs");
            warnings.push(Warning::LogErrorMarker { line });
        }

        Ok(DeploymentOutcome {
            success: true,
            failed_service: None,
            failure_log_tail: None,
            services,
            warnings,
            elapsed_ms: started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        })
    }

    async fn probe(&self, spec: &ServiceSpec) -> bool {
        match &spec.probe {
            ProbeSpec::None => true,
            ProbeSpec::Tcp { port } => {
                let addr = SocketAddr::from(([127, 0, 0, 1], *port));
                check_tcp(addr, TCP_ATTEMPT_TIMEOUT).await
            }
            ProbeSpec::Exec { argv } => match self.orchestrator.exec(&spec.name, argv).await {
                Ok(out) => out.success(),
                Err(e) => {
                    debug!(service = %spec.name, error = %e, "probe execution failed");
                    false
                }
            },
        }
    }

    /// Best-effort diagnostics for a failed required service. Invoked
    /// exactly once per failed run.
    async fn fetch_log_tail(&self, service: &str) -> Option<String> {
        match self.orchestrator.logs(Some(service), FAILURE_LOG_TAIL).await {
            Ok(tail) => Some(tail),
            Err(e) => {
                warn!(service, error = %e, "could not fetch log tail");
                None
            }
        }
    }
}
