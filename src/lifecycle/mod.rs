//! Managed Service Lifecycle
//!
//! Auto-start, health probing and auto-stop for providers whose back end
//! is a locally-hosted service run through docker compose. The manager is
//! composed into a provider; it owns the state machine
//! Uninitialized -> Initializing -> Ready -> ShutDown and coalesces
//! concurrent `init()` calls onto a single shared in-flight future.
//!
//! Subprocess access goes through the [`ComposeRunner`] port so the whole
//! start/poll/stop cycle can be driven without a docker daemon; the
//! default [`DockerCli`] runner shells out to the docker CLI.

pub mod bootstrap;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DockerConfig;
use crate::error::SearchError;
use crate::provider::ValidationReport;

/// Timeout for probing whether the docker tool is usable at all.
const DOCKER_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Health-endpoint timeout used while initializing.
const INIT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Health-endpoint and container-inspect timeout used by `healthcheck()`.
const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(3);
/// Default interval between health probes while waiting for the service.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default settling delay after a fresh service start.
const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle settings, usually derived from an engine's docker sub-record.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub auto_start: bool,
    pub auto_stop: bool,
    pub compose_file: Option<PathBuf>,
    pub container_name: Option<String>,
    pub health_endpoint: Option<String>,
    pub init_timeout: Duration,
    pub project_root: Option<PathBuf>,
    /// Interval between health probes while waiting for the service.
    pub poll_interval: Duration,
    /// Settling delay after a fresh service start.
    pub settle_delay: Duration,
}

impl From<&DockerConfig> for LifecycleConfig {
    fn from(docker: &DockerConfig) -> Self {
        Self {
            auto_start: docker.auto_start,
            auto_stop: docker.auto_stop,
            compose_file: docker.compose_file.clone(),
            container_name: docker.container_name.clone(),
            health_endpoint: docker.health_endpoint.clone(),
            init_timeout: Duration::from_millis(docker.init_timeout_ms),
            project_root: docker.project_root.clone(),
            poll_interval: POLL_INTERVAL,
            settle_delay: SETTLE_DELAY,
        }
    }
}

/// Subprocess port for the docker tool.
///
/// The same seam as the credit manager's persistence port: the manager
/// talks to an abstract runner so tests can substitute a fake and drive
/// the auto-start cycle deterministically.
#[async_trait]
pub trait ComposeRunner: Send + Sync {
    /// Whether the tool responds at all within `timeout`.
    async fn available(&self, timeout: Duration) -> bool;

    /// Run `docker compose -f <file> <args>` for the configured unit.
    async fn compose(&self, config: &LifecycleConfig, args: &[&str]) -> Result<(), SearchError>;

    /// The container's running flag. `None` when the check itself could
    /// not run (tool missing, unknown container).
    async fn container_running(&self, name: &str, timeout: Duration) -> Option<bool>;
}

/// Default runner that shells out to the docker CLI.
#[derive(Debug, Default)]
pub struct DockerCli;

#[async_trait]
impl ComposeRunner for DockerCli {
    async fn available(&self, timeout: Duration) -> bool {
        let probe = Command::new("docker")
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match tokio::time::timeout(timeout, probe).await {
            Ok(Ok(status)) => status.success(),
            _ => false,
        }
    }

    async fn compose(&self, config: &LifecycleConfig, args: &[&str]) -> Result<(), SearchError> {
        let file = config
            .compose_file
            .as_ref()
            .ok_or_else(|| SearchError::Configuration("no compose file configured".to_string()))?;

        let mut command = Command::new("docker");
        command.arg("compose").arg("-f").arg(file);
        command.args(args);
        if let Some(root) = &config.project_root {
            command.current_dir(root);
        }

        let output = command
            .output()
            .await
            .map_err(|e| SearchError::Internal(format!("failed to run docker compose: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SearchError::Internal(format!(
                "docker compose {} failed: {}",
                args.join(" "),
                stderr.trim()
            )))
        }
    }

    async fn container_running(&self, name: &str, timeout: Duration) -> Option<bool> {
        let inspect = Command::new("docker")
            .args(["inspect", "--format", "{{.State.Running}}", name])
            .stderr(Stdio::null())
            .output();
        match tokio::time::timeout(timeout, inspect).await {
            Ok(Ok(output)) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim() == "true")
            }
            _ => None,
        }
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    ShutDown,
}

type InitFuture = Shared<BoxFuture<'static, Result<(), SearchError>>>;

/// Lifecycle manager for one locally-hosted service.
pub struct ServiceLifecycle {
    engine_id: String,
    config: LifecycleConfig,
    http: reqwest::Client,
    runner: Arc<dyn ComposeRunner>,
    state: std::sync::Mutex<ServiceState>,
    init_flight: tokio::sync::Mutex<Option<InitFuture>>,
}

impl ServiceLifecycle {
    pub fn new(engine_id: impl Into<String>, config: LifecycleConfig, http: reqwest::Client) -> Self {
        Self::with_runner(engine_id, config, http, Arc::new(DockerCli))
    }

    /// Construct with an explicit subprocess runner.
    pub fn with_runner(
        engine_id: impl Into<String>,
        config: LifecycleConfig,
        http: reqwest::Client,
        runner: Arc<dyn ComposeRunner>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            config,
            http,
            runner,
            state: std::sync::Mutex::new(ServiceState::Uninitialized),
            init_flight: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock().expect("lifecycle state lock poisoned")
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn set_state(&self, state: ServiceState) {
        *self.state.lock().expect("lifecycle state lock poisoned") = state;
    }

    /// Bring the service up. Concurrent callers share one in-flight
    /// initialization; a completed initialization can be re-entered later
    /// (the unhealthy-service recovery path relies on this).
    pub async fn init(&self) -> Result<(), SearchError> {
        let (flight, created) = {
            let mut slot = self.init_flight.lock().await;
            match slot.as_ref() {
                Some(flight) => (flight.clone(), false),
                None => {
                    self.set_state(ServiceState::Initializing);
                    let flight = run_init(
                        self.engine_id.clone(),
                        self.config.clone(),
                        self.http.clone(),
                        self.runner.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    (flight, true)
                }
            }
        };

        let result = flight.await;

        if created {
            *self.init_flight.lock().await = None;
            self.set_state(match result {
                Ok(()) => ServiceState::Ready,
                Err(_) => ServiceState::Uninitialized,
            });
        }

        result
    }

    /// Compose the container-running and endpoint checks. Never fails.
    pub async fn healthcheck(&self) -> bool {
        if self.config.compose_file.is_some() {
            if let Some(name) = &self.config.container_name {
                if let Some(false) = self.runner.container_running(name, HEALTHCHECK_TIMEOUT).await
                {
                    return false;
                }
            }
        }
        match &self.config.health_endpoint {
            Some(endpoint) => endpoint_healthy(&self.http, endpoint, HEALTHCHECK_TIMEOUT).await,
            None => true,
        }
    }

    /// Stop the service if auto-stop is enabled. Errors are logged and
    /// swallowed; repeated calls are no-ops.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().expect("lifecycle state lock poisoned");
            if *state == ServiceState::ShutDown {
                return;
            }
            *state = ServiceState::ShutDown;
        }

        if !self.config.auto_stop {
            return;
        }
        let Some(_) = &self.config.compose_file else {
            return;
        };

        if let Some(name) = &self.config.container_name {
            if let Some(false) = self.runner.container_running(name, HEALTHCHECK_TIMEOUT).await {
                debug!(engine = %self.engine_id, "service already stopped");
                return;
            }
        }

        info!(engine = %self.engine_id, "stopping local service");
        if let Err(error) = self.runner.compose(&self.config, &["stop"]).await {
            warn!(engine = %self.engine_id, "error stopping local service: {error}");
        }
    }

    /// Static checks over the docker sub-configuration.
    pub async fn validate_docker_config(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        if !self.runner.available(DOCKER_PROBE_TIMEOUT).await {
            report.error("docker is not available (command missing or probe timed out)");
        }

        if let Some(file) = &self.config.compose_file {
            if !file.exists() {
                report.error(format!("compose file not found: {}", file.display()));
            }
        }

        if let Some(endpoint) = &self.config.health_endpoint {
            if Url::parse(endpoint).is_err() {
                report.warning(format!("health endpoint is not a valid URL: {endpoint}"));
            }
        }

        if let Some(name) = &self.config.container_name {
            let well_formed = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !well_formed {
                report.warning(format!("container name '{name}' has unexpected characters"));
            }
        }

        report
    }
}

async fn run_init(
    engine_id: String,
    config: LifecycleConfig,
    http: reqwest::Client,
    runner: Arc<dyn ComposeRunner>,
) -> Result<(), SearchError> {
    let Some(_) = config.compose_file.as_ref().filter(|_| config.auto_start) else {
        debug!(
            engine = %engine_id,
            "auto-start disabled or no compose file; skipping service management"
        );
        return Ok(());
    };

    if !runner.available(DOCKER_PROBE_TIMEOUT).await {
        warn!(
            engine = %engine_id,
            "docker not available; continuing without managing the local service"
        );
        return Ok(());
    }

    if let Some(endpoint) = &config.health_endpoint {
        if endpoint_healthy(&http, endpoint, INIT_HEALTH_TIMEOUT).await {
            debug!(engine = %engine_id, "service already healthy");
            return Ok(());
        }
    }

    info!(engine = %engine_id, "starting local service via docker compose");
    runner.compose(&config, &["up", "-d"]).await?;

    if let Some(endpoint) = &config.health_endpoint {
        let deadline = tokio::time::Instant::now() + config.init_timeout;
        loop {
            if endpoint_healthy(&http, endpoint, INIT_HEALTH_TIMEOUT).await {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SearchError::unavailable(
                    &engine_id,
                    format!(
                        "service did not become healthy within {} ms",
                        config.init_timeout.as_millis()
                    ),
                ));
            }
            tokio::time::sleep(config.poll_interval).await;
        }
    }

    // Freshly started instances accept connections before their engines do.
    tokio::time::sleep(config.settle_delay).await;
    info!(engine = %engine_id, "local service is ready");
    Ok(())
}

/// GET the health endpoint and report 2xx. Malformed endpoints and
/// transport failures are unhealthy.
async fn endpoint_healthy(http: &reqwest::Client, endpoint: &str, timeout: Duration) -> bool {
    http.get(endpoint)
        .timeout(timeout)
        .send()
        .await
        .map(|response| response.status().is_success())
        .unwrap_or(false)
}
