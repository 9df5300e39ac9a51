//! End-to-end sequencer tests against a fake orchestrator.
//!
//! The fake records every capability call so the tests can assert what
//! was (and was not) issued; tokio's paused clock makes the readiness
//! budgets run instantly.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ccd_deploy::manifest::DeployManifest;
use ccd_deploy::outcome::Warning;
use ccd_deploy::{ComposeStarter, DeployError, Sequencer};
use ccd_orchestrator::{CmdOutput, Orchestrator, Result as OrchResult, ServiceState};

/// Orchestrator fake: scripted probe readiness, recorded calls.
struct FakeOrchestrator {
    calls: Mutex<Vec<String>>,
    /// Failing probe attempts per service before it reports ready.
    /// `u32::MAX` means never ready.
    ready_after: HashMap<String, u32>,
    exec_counts: Mutex<HashMap<String, u32>>,
    combined_logs: String,
}

impl FakeOrchestrator {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            ready_after: HashMap::new(),
            exec_counts: Mutex::new(HashMap::new()),
            combined_logs: "all services nominal\n".to_string(),
        }
    }

    fn ready_after(mut self, service: &str, failing_attempts: u32) -> Self {
        self.ready_after.insert(service.to_string(), failing_attempts);
        self
    }

    fn with_combined_logs(mut self, logs: &str) -> Self {
        self.combined_logs = logs.to_string();
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn build(&self) -> OrchResult<()> {
        self.record("build");
        Ok(())
    }

    async fn up(&self) -> OrchResult<()> {
        self.record("up");
        Ok(())
    }

    async fn down(&self) -> OrchResult<()> {
        self.record("down");
        Ok(())
    }

    async fn ps(&self) -> OrchResult<Vec<ServiceState>> {
        self.record("ps");
        Ok(vec![ServiceState {
            name: "postgres".to_string(),
            state: "running".to_string(),
            health: Some("healthy".to_string()),
        }])
    }

    async fn logs(&self, service: Option<&str>, _tail: u32) -> OrchResult<String> {
        match service {
            Some(name) => {
                self.record(format!("logs {name}"));
                Ok(format!("log tail for {name}\n"))
            }
            None => {
                self.record("logs combined");
                Ok(self.combined_logs.clone())
            }
        }
    }

    async fn exec(&self, service: &str, _argv: &[String]) -> OrchResult<CmdOutput> {
        self.record(format!("exec {service}"));
        let mut counts = self.exec_counts.lock().unwrap();
        let count = counts.entry(service.to_string()).or_insert(0);
        *count += 1;

        let failing = self.ready_after.get(service).copied().unwrap_or(0);
        let status = if failing != u32::MAX && *count > failing {
            0
        } else {
            1
        };
        Ok(CmdOutput {
            status,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Manifest rooted at a temp dir, with a compose file already in place.
fn manifest_with(dir: &Path, services_toml: &str) -> DeployManifest {
    fs::write(dir.join("docker-compose.yml"), "services: {}\n").unwrap();
    let toml = format!(
        r#"
[paths]
project_dir = "{dir}"
log_dir = "{dir}/logs"

[deploy]
poll_interval_secs = 2
settle_secs = 1
log_scan_tail = 200

{services_toml}
"#,
        dir = dir.display(),
    );
    DeployManifest::from_toml_str(&toml).unwrap()
}

const POSTGRES_REQUIRED: &str = r#"
[[services]]
name = "postgres"
required = true
timeout_secs = 6
probe = { kind = "exec", argv = ["pg_isready", "-U", "callchecker"] }
"#;

const REDIS_OPTIONAL: &str = r#"
[[services]]
name = "redis"
required = false
timeout_secs = 4
probe = { kind = "exec", argv = ["redis-cli", "ping"] }
"#;

const APP_UNPROBED: &str = r#"
[[services]]
name = "bitrix24-sync"
"#;

#[tokio::test(start_paused = true)]
async fn preflight_failure_issues_no_orchestrator_commands() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest_with(dir.path(), POSTGRES_REQUIRED);
    // Break a precondition after manifest construction.
    fs::remove_file(dir.path().join("docker-compose.yml")).unwrap();

    let fake = FakeOrchestrator::new();
    let err = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::PreflightFailed { .. }));
    assert!(fake.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_active_config_is_created_from_template() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest_with(dir.path(), APP_UNPROBED);
    fs::write(dir.path().join(".env.example"), "DB_HOST=localhost\n").unwrap();

    let fake = FakeOrchestrator::new();
    let outcome = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(
        fs::read_to_string(dir.path().join(".env")).unwrap(),
        "DB_HOST=localhost\n"
    );
}

#[tokio::test(start_paused = true)]
async fn existing_active_config_is_never_clobbered() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest_with(dir.path(), APP_UNPROBED);
    fs::write(dir.path().join(".env.example"), "DB_HOST=localhost\n").unwrap();
    fs::write(dir.path().join(".env"), "DB_HOST=db.internal\n").unwrap();

    let fake = FakeOrchestrator::new();
    for _ in 0..2 {
        let outcome = Sequencer::new(&manifest, &fake, &ComposeStarter)
            .run()
            .await
            .unwrap();
        assert!(outcome.success);
    }

    assert_eq!(
        fs::read_to_string(dir.path().join(".env")).unwrap(),
        "DB_HOST=db.internal\n"
    );
}

#[tokio::test(start_paused = true)]
async fn missing_template_and_active_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest_with(dir.path(), APP_UNPROBED);

    let fake = FakeOrchestrator::new();
    let err = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::ConfigMissing { .. }));
    // Preflight passed but nothing was built or started.
    assert!(fake.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn required_service_timeout_fails_run_and_fetches_log_tail_once() {
    let dir = tempfile::tempdir().unwrap();
    let services = format!("{POSTGRES_REQUIRED}\n{REDIS_OPTIONAL}");
    let manifest = manifest_with(dir.path(), &services);
    fs::write(dir.path().join(".env.example"), "").unwrap();

    let fake = FakeOrchestrator::new().ready_after("postgres", u32::MAX);
    let outcome = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.failed_service.as_deref(), Some("postgres"));
    assert_eq!(
        outcome.failure_log_tail.as_deref(),
        Some("log tail for postgres\n")
    );

    // ceil(6s / 2s) probe attempts, log tail exactly once.
    assert_eq!(fake.count("exec postgres"), 3);
    assert_eq!(fake.count("logs postgres"), 1);

    // The run aborted: redis was never probed, no settle/status/scan.
    assert_eq!(fake.count("exec redis"), 0);
    assert_eq!(fake.count("ps"), 0);
    assert_eq!(fake.count("logs combined"), 0);
}

#[tokio::test(start_paused = true)]
async fn optional_service_timeout_degrades_but_run_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let services = format!("{POSTGRES_REQUIRED}\n{REDIS_OPTIONAL}");
    let manifest = manifest_with(dir.path(), &services);
    fs::write(dir.path().join(".env.example"), "").unwrap();

    let fake = FakeOrchestrator::new().ready_after("redis", u32::MAX);
    let outcome = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.succeeded_with_warnings());
    assert_eq!(
        outcome.warnings,
        vec![Warning::OptionalServiceTimeout {
            service: "redis".to_string()
        }]
    );
    assert_eq!(outcome.failed_service, None);

    // The run continued through status and the log scan.
    assert_eq!(fake.count("ps"), 1);
    assert_eq!(fake.count("logs combined"), 1);
    // No diagnostic tail for an optional service.
    assert_eq!(fake.count("logs redis"), 0);
}

#[tokio::test(start_paused = true)]
async fn error_marker_in_logs_downgrades_to_warning() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest_with(dir.path(), POSTGRES_REQUIRED);
    fs::write(dir.path().join(".env.example"), "").unwrap();

    let fake = FakeOrchestrator::new()
        .with_combined_logs("postgres | ready\nbitrix24-sync | ERROR: portal unreachable\n");
    let outcome = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(
        outcome.warnings,
        vec![Warning::LogErrorMarker {
            line: "bitrix24-sync | ERROR: portal unreachable".to_string()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn probe_attempts_are_counted_and_ordered_after_startup() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest_with(dir.path(), POSTGRES_REQUIRED);
    fs::write(dir.path().join(".env.example"), "").unwrap();

    let fake = FakeOrchestrator::new().ready_after("postgres", 2);
    let outcome = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap();

    assert!(outcome.success);
    let postgres = &outcome.services[0];
    assert!(postgres.ready);
    assert_eq!(postgres.attempts, 3);

    // build, then stop/start, then probes.
    let calls = fake.calls();
    assert_eq!(calls[0], "build");
    assert_eq!(calls[1], "down");
    assert_eq!(calls[2], "up");
    assert!(calls[3].starts_with("exec postgres"));
}

#[tokio::test(start_paused = true)]
async fn unprobed_services_are_reported_but_not_gated() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = manifest_with(dir.path(), APP_UNPROBED);
    fs::write(dir.path().join(".env.example"), "").unwrap();

    let fake = FakeOrchestrator::new();
    let outcome = Sequencer::new(&manifest, &fake, &ComposeStarter)
        .run()
        .await
        .unwrap();

    assert!(outcome.success);
    let service = &outcome.services[0];
    assert_eq!(service.name, "bitrix24-sync");
    assert!(!service.probed);
    assert!(service.ready);
    assert_eq!(fake.count("exec"), 0);
}
