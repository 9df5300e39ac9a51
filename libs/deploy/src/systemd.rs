//! Systemd unit rendering and installation.
//!
//! Each service that declares a unit in the manifest gets one rendered
//! unit file under the unit directory, followed by a daemon-reload and
//! `enable --now`. The same units power the systemd startup variant of
//! the sequencer's final step.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use ccd_orchestrator::{CommandRunner, Orchestrator};
use tracing::info;

use crate::error::DeployError;
use crate::manifest::{DeployManifest, ServiceSpec, UnitSpec};
use crate::sequencer::ServiceStarter;

/// Default systemd unit directory.
pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

/// Unit name for a managed service.
pub fn unit_name(service: &str) -> String {
    format!("callchecker-{service}.service")
}

/// Render the unit file for one service.
pub fn render_unit(manifest: &DeployManifest, spec: &ServiceSpec, unit: &UnitSpec) -> String {
    let description = unit
        .description
        .clone()
        .unwrap_or_else(|| format!("Callchecker {} service", spec.name));
    let working_dir = unit
        .working_dir
        .clone()
        .unwrap_or_else(|| manifest.paths.project_dir.clone());

    format!(
        "[Unit]\n\
         Description={description}\n\
         After=network-online.target\n\
         Wants=network-online.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         User={user}\n\
         WorkingDirectory={working_dir}\n\
         EnvironmentFile=-{env_file}\n\
         ExecStart={exec_start}\n\
         Restart=always\n\
         RestartSec=5\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        user = manifest.provision.service_user,
        working_dir = working_dir.display(),
        env_file = manifest.paths.env_path().display(),
        exec_start = unit.exec_start,
    )
}

/// Run a systemctl command, failing on non-zero exit.
pub async fn systemctl<R: CommandRunner>(runner: &R, args: &[&str]) -> Result<(), DeployError> {
    let argv: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let out = runner.run("systemctl", &argv).await?;
    if !out.success() {
        return Err(DeployError::InitSystem {
            command: format!("systemctl {}", args.join(" ")),
            detail: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// Writes unit files and registers them with the init system.
pub struct UnitInstaller<'a, R: CommandRunner> {
    runner: &'a R,
    unit_dir: PathBuf,
}

impl<'a, R: CommandRunner> UnitInstaller<'a, R> {
    /// Installer targeting the default unit directory.
    pub fn new(runner: &'a R) -> Self {
        Self::with_unit_dir(runner, DEFAULT_UNIT_DIR)
    }

    /// Installer targeting a specific unit directory.
    pub fn with_unit_dir(runner: &'a R, unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            unit_dir: unit_dir.into(),
        }
    }

    /// Write all declared units, reload the daemon and enable them.
    /// Returns the installed unit names.
    pub async fn install(&self, manifest: &DeployManifest) -> Result<Vec<String>, DeployError> {
        let mut installed = Vec::new();

        for (spec, unit) in manifest.unit_services() {
            let name = unit_name(&spec.name);
            let path = self.unit_dir.join(&name);
            fs::write(&path, render_unit(manifest, spec, unit))?;
            info!(unit = %name, path = %path.display(), "unit file written");
            installed.push(name);
        }

        if installed.is_empty() {
            return Ok(installed);
        }

        systemctl(self.runner, &["daemon-reload"]).await?;

        let mut args = vec!["enable", "--now"];
        args.extend(installed.iter().map(String::as_str));
        systemctl(self.runner, &args).await?;

        Ok(installed)
    }
}

/// Startup step that restarts the installed units.
pub struct SystemdStarter<R: CommandRunner> {
    runner: R,
    units: Vec<String>,
}

impl<R: CommandRunner> SystemdStarter<R> {
    pub fn new(runner: R, manifest: &DeployManifest) -> Self {
        let units = manifest
            .unit_services()
            .map(|(spec, _)| unit_name(&spec.name))
            .collect();
        Self { runner, units }
    }
}

#[async_trait]
impl<R: CommandRunner> ServiceStarter for SystemdStarter<R> {
    async fn start(&self, _orchestrator: &dyn Orchestrator) -> Result<(), DeployError> {
        for unit in &self.units {
            info!(unit = %unit, "restarting unit");
            systemctl(&self.runner, &["restart", unit]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ccd_orchestrator::{CmdOutput, OrchestratorError};

    use super::*;
    use crate::manifest::EXAMPLE_MANIFEST;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
        ) -> Result<CmdOutput, OrchestratorError> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            Ok(CmdOutput {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn manifest() -> DeployManifest {
        DeployManifest::from_toml_str(EXAMPLE_MANIFEST).unwrap()
    }

    #[test]
    fn rendered_unit_has_service_and_install_sections() {
        let manifest = manifest();
        let (spec, unit) = manifest.unit_services().next().unwrap();
        let rendered = render_unit(&manifest, spec, unit);

        assert!(rendered.contains("Description=Callchecker Bitrix24 sync"));
        assert!(rendered.contains("User=callchecker"));
        assert!(rendered.contains("WorkingDirectory=/opt/callchecker"));
        assert!(rendered.contains("EnvironmentFile=-/opt/callchecker/.env"));
        assert!(rendered.contains("ExecStart=/usr/bin/python3 bitrix24/main.py"));
        assert!(rendered.contains("WantedBy=multi-user.target"));
    }

    #[tokio::test]
    async fn install_writes_units_then_reloads_and_enables() {
        let manifest = manifest();
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::default();
        let installer = UnitInstaller::with_unit_dir(&runner, dir.path());

        let installed = installer.install(&manifest).await.unwrap();
        assert_eq!(installed.len(), 4);
        assert!(dir.path().join("callchecker-bitrix24-sync.service").is_file());

        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec!["daemon-reload"]);
        assert_eq!(calls[1].1[..2], ["enable".to_string(), "--now".to_string()]);
        assert!(calls[1].1.contains(&"callchecker-sheets-sync.service".to_string()));
    }

    #[tokio::test]
    async fn failed_systemctl_surfaces_command() {
        struct FailingRunner;

        #[async_trait]
        impl CommandRunner for FailingRunner {
            async fn run(
                &self,
                _program: &str,
                _args: &[String],
            ) -> Result<CmdOutput, OrchestratorError> {
                Ok(CmdOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: "unit not found".to_string(),
                })
            }
        }

        let err = systemctl(&FailingRunner, &["restart", "nope.service"])
            .await
            .unwrap_err();
        match err {
            DeployError::InitSystem { command, detail } => {
                assert_eq!(command, "systemctl restart nope.service");
                assert_eq!(detail, "unit not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
