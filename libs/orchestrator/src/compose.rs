//! `docker compose` adapter.
//!
//! Maps the [`Orchestrator`] capabilities onto the compose CLI. All
//! invocations go through the injected [`CommandRunner`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::OrchestratorError;
use crate::runner::{CmdOutput, CommandRunner, SystemRunner};
use crate::{Orchestrator, Result, ServiceState};

/// Orchestrator adapter over the `docker compose` CLI.
#[derive(Debug, Clone)]
pub struct Compose<R = SystemRunner> {
    runner: R,
    compose_file: PathBuf,
    project_dir: PathBuf,
}

impl Compose<SystemRunner> {
    /// Adapter using the real system runner.
    pub fn new(compose_file: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self::with_runner(SystemRunner, compose_file, project_dir)
    }
}

impl<R: CommandRunner> Compose<R> {
    /// Adapter with an injected runner.
    pub fn with_runner(
        runner: R,
        compose_file: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            compose_file: compose_file.into(),
            project_dir: project_dir.into(),
        }
    }

    /// The compose file this adapter points at.
    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "compose".to_string(),
            "--project-directory".to_string(),
            self.project_dir.display().to_string(),
            "-f".to_string(),
            self.compose_file.display().to_string(),
        ]
    }

    async fn compose(&self, args: &[&str]) -> Result<CmdOutput> {
        let mut full = self.base_args();
        full.extend(args.iter().map(|a| a.to_string()));
        self.runner.run("docker", &full).await
    }

    /// Run a compose subcommand and fail on non-zero exit.
    async fn checked(&self, args: &[&str]) -> Result<CmdOutput> {
        let out = self.compose(args).await?;
        if !out.success() {
            return Err(OrchestratorError::command_failed(
                format!("docker compose {}", args.join(" ")),
                &out.stderr,
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl<R: CommandRunner> Orchestrator for Compose<R> {
    async fn build(&self) -> Result<()> {
        debug!("compose build");
        self.checked(&["build"]).await?;
        Ok(())
    }

    async fn up(&self) -> Result<()> {
        debug!("compose up");
        self.checked(&["up", "-d", "--remove-orphans"]).await?;
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        debug!("compose down");
        self.checked(&["down", "--remove-orphans"]).await?;
        Ok(())
    }

    async fn ps(&self) -> Result<Vec<ServiceState>> {
        let out = self.checked(&["ps", "--all", "--format", "json"]).await?;
        parse_service_states(&out.stdout)
    }

    async fn logs(&self, service: Option<&str>, tail: u32) -> Result<String> {
        let tail = tail.to_string();
        let mut args = vec!["logs", "--no-color", "--tail", tail.as_str()];
        if let Some(service) = service {
            args.push(service);
        }
        let out = self.checked(&args).await?;
        Ok(out.stdout)
    }

    async fn exec(&self, service: &str, argv: &[String]) -> Result<CmdOutput> {
        let mut args = vec!["exec", "-T", service];
        args.extend(argv.iter().map(String::as_str));
        // Non-zero exit is the probe's answer, not an adapter failure.
        self.compose(&args).await
    }
}

/// Parse `compose ps --format json` output.
///
/// Newer compose emits one JSON object per line; older releases emit a
/// single JSON array. Accept both.
fn parse_service_states(stdout: &str) -> Result<Vec<ServiceState>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| OrchestratorError::Parse(e.to_string()));
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| OrchestratorError::Parse(e.to_string())))
        .collect()
}
