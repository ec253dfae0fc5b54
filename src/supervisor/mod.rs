//! Engine lifecycle: provision, launch, wait for health, stop.
//!
//! State machine:
//!   NotRunning --probe ok---------------------------------> Healthy
//!   NotRunning --probe fails--> Provisioning --> Launching --> AwaitingHealth
//!   AwaitingHealth --health ok--> Healthy
//!   AwaitingHealth --attempts exhausted--> Failed
//!   Healthy --stop--> Stopped
//!
//! The PID file is written before health polling starts, and removed before
//! the kill signal is sent.

pub mod launcher;
pub mod record;

use std::sync::atomic::{AtomicU8, Ordering};

pub use launcher::{JavaLauncher, LaunchSpec, Launcher};
pub use record::{ProcessRecord, RecordedPid};

use crate::cache::CacheLayout;
use crate::config::ServerConfig;
use crate::error::{EsanalyzerError, Result};
use crate::provision::Provisioner;

const STATE_NOT_RUNNING: u8 = 0;
const STATE_PROVISIONING: u8 = 1;
const STATE_LAUNCHING: u8 = 2;
const STATE_AWAITING_HEALTH: u8 = 3;
const STATE_HEALTHY: u8 = 4;
const STATE_FAILED: u8 = 5;
const STATE_STOPPED: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotRunning,
    Provisioning,
    Launching,
    AwaitingHealth,
    Healthy,
    Failed,
    Stopped,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::NotRunning => STATE_NOT_RUNNING,
            LifecycleState::Provisioning => STATE_PROVISIONING,
            LifecycleState::Launching => STATE_LAUNCHING,
            LifecycleState::AwaitingHealth => STATE_AWAITING_HEALTH,
            LifecycleState::Healthy => STATE_HEALTHY,
            LifecycleState::Failed => STATE_FAILED,
            LifecycleState::Stopped => STATE_STOPPED,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            STATE_PROVISIONING => LifecycleState::Provisioning,
            STATE_LAUNCHING => LifecycleState::Launching,
            STATE_AWAITING_HEALTH => LifecycleState::AwaitingHealth,
            STATE_HEALTHY => LifecycleState::Healthy,
            STATE_FAILED => LifecycleState::Failed,
            STATE_STOPPED => LifecycleState::Stopped,
            _ => LifecycleState::NotRunning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Something already answered on the base URL; nothing was launched.
    AlreadyRunning,
    Launched { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No PID file; nothing to do.
    NotRecorded,
    /// PID file removed; it held no usable pid.
    RecordCleared,
    Signalled { pid: u32 },
    /// PID file removed but the signal failed, usually because the process is gone.
    SignalFailed { pid: u32 },
}

/// Supervises one engine instance, identified by the config's instance key.
///
/// Holds no process handle: a launched engine is tracked only through its
/// PID file, so a later supervisor (or a later run) can stop it.
pub struct EngineSupervisor<L: Launcher = JavaLauncher> {
    config: ServerConfig,
    layout: CacheLayout,
    http: reqwest::Client,
    launcher: L,
    state: AtomicU8,
    span: tracing::Span,
}

impl EngineSupervisor<JavaLauncher> {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_launcher(config, JavaLauncher)
    }
}

impl<L: Launcher> EngineSupervisor<L> {
    pub fn with_launcher(config: ServerConfig, launcher: L) -> Self {
        let layout = CacheLayout::new(config.home.clone(), config.resolver.clone());
        let span = tracing::info_span!(
            "engine",
            host = %config.instance.host,
            http_port = config.instance.http_port,
            version = %config.instance.version,
            cluster = %config.instance.cluster_name,
        );
        Self {
            config,
            layout,
            http: reqwest::Client::new(),
            launcher,
            state: AtomicU8::new(STATE_NOT_RUNNING),
            span,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn record(&self) -> ProcessRecord {
        let key = &self.config.instance;
        ProcessRecord::new(self.layout.pid_file(&key.version, key.http_port))
    }

    fn transition(&self, next: LifecycleState) {
        let prev = LifecycleState::from_u8(self.state.swap(next.as_u8(), Ordering::AcqRel));
        if prev != next {
            tracing::debug!(parent: &self.span, from = ?prev, to = ?next, "Lifecycle transition");
        }
    }

    /// Idempotent: returns `AlreadyRunning` without touching disk when the
    /// instance already answers HTTP.
    pub async fn start(&self) -> Result<StartOutcome> {
        let key = &self.config.instance;
        let base_url = key.base_url();

        match self.http.get(&base_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                if tracing::enabled!(tracing::Level::DEBUG) {
                    let body = resp.text().await.unwrap_or_default();
                    tracing::debug!(parent: &self.span, "Engine already running: {}", body);
                }
                self.transition(LifecycleState::Healthy);
                return Ok(StartOutcome::AlreadyRunning);
            }
            Ok(resp) => {
                tracing::debug!(parent: &self.span, "Engine is not working: HTTP {}", resp.status());
            }
            Err(e) => {
                tracing::debug!(parent: &self.span, "Engine is not working: {}", e);
            }
        }

        self.transition(LifecycleState::Provisioning);
        let provisioner = Provisioner::new(
            self.layout.clone(),
            self.http.clone(),
            self.config.java_bin.clone(),
        )
        .with_inherited_output(self.config.inherit_output);
        let installation = match provisioner
            .ensure_installation(&key.version, key.http_port, &self.config.plugins)
            .await
        {
            Ok(installation) => installation,
            Err(e) => {
                self.transition(LifecycleState::Failed);
                return Err(EsanalyzerError::Provisioning(Box::new(e)));
            }
        };

        self.stop()?;

        self.transition(LifecycleState::Launching);
        let spec = LaunchSpec {
            java_bin: self.config.java_bin.clone(),
            java_heap: self.config.java_heap.clone(),
            classpath: installation.classpath()?,
            base_path: installation.es_home.clone(),
            cluster_name: key.cluster_name.clone(),
            http_port: key.http_port,
            transport_port: key.transport_port,
            work_dir: installation.home.clone(),
            inherit_output: self.config.inherit_output,
        };
        let pid = match self.launcher.launch(&spec) {
            Ok(pid) => pid,
            Err(e) => {
                self.transition(LifecycleState::Failed);
                return Err(e);
            }
        };

        let record = self.record();
        record.write(pid)?;
        tracing::info!(parent: &self.span, pid, "Launched engine, pid file {}", record.path().display());

        self.transition(LifecycleState::AwaitingHealth);
        if self.wait_for_health().await {
            self.transition(LifecycleState::Healthy);
            tracing::info!(parent: &self.span, pid, "Engine is healthy");
            return Ok(StartOutcome::Launched { pid });
        }

        self.transition(LifecycleState::Failed);
        record.remove()?;
        let log_file = self
            .layout
            .log_file(&key.version, key.http_port, &key.cluster_name);
        Err(EsanalyzerError::Startup(format!(
            "Failed to start Elasticsearch. See {}",
            log_file.display()
        )))
    }

    async fn wait_for_health(&self) -> bool {
        let url = format!(
            "{}/_cluster/health?wait_for_status=yellow&timeout=1m",
            self.config.instance.base_url()
        );
        let policy = self.config.health;

        for attempt in 0..policy.attempts {
            tokio::time::sleep(policy.interval).await;
            tracing::debug!(parent: &self.span, attempt, "Checking engine status");
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    if tracing::enabled!(tracing::Level::DEBUG) {
                        let body = resp.text().await.unwrap_or_default();
                        tracing::debug!(parent: &self.span, "Cluster health: {}", body);
                    }
                    return true;
                }
                Ok(resp) => {
                    tracing::debug!(parent: &self.span, attempt, "Engine is not available: HTTP {}", resp.status());
                }
                Err(e) => {
                    tracing::debug!(parent: &self.span, attempt, "Engine is not available: {}", e);
                }
            }
        }
        false
    }

    /// Stop whatever this supervisor's PID file points at. Never fails just
    /// because the process is already gone.
    pub fn stop(&self) -> Result<StopOutcome> {
        let record = self.record();
        let Some(recorded) = record.read()? else {
            return Ok(StopOutcome::NotRecorded);
        };
        record.remove()?;

        let outcome = match recorded {
            RecordedPid::Unusable => StopOutcome::RecordCleared,
            RecordedPid::Pid(pid) => match launcher::kill(pid) {
                Ok(()) => {
                    tracing::info!(parent: &self.span, pid, "Stopped engine");
                    StopOutcome::Signalled { pid }
                }
                Err(e) => {
                    tracing::error!(parent: &self.span, pid, "Failed to stop engine process: {}", e);
                    StopOutcome::SignalFailed { pid }
                }
            },
        };
        self.transition(LifecycleState::Stopped);
        Ok(outcome)
    }
}
