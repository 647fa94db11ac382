// ── Manager ──
//
// Facade over the session and its three workers. Cheap to clone; all
// clones drive the same session.

use std::sync::{Arc, Mutex, PoisonError};

use secrecy::SecretString;
use sumo_api::{FirmwareClient, HttpConfig};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ManagerConfig;
use crate::device::DeviceBackend;
use crate::error::CoreError;
use crate::model::{Notification, WifiCredential};
use crate::notify::Notifier;
use crate::session::{ConnectionState, Session, SessionSnapshot};
use crate::worker::{self, WorkerContext, config_update, firmware_update, port_monitor};

/// Device session orchestrator.
///
/// Owns the session state and the port monitor, config update, and
/// firmware update workers. Construct with [`new`](Self::new), subscribe
/// to [`notifications`](Self::notifications), then [`start`](Self::start).
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
    /// Child token for the current run, replaced on every start.
    run_token: Mutex<CancellationToken>,
    task_handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Manager {
    /// Build a manager whose firmware client is derived from `config`.
    pub fn new(config: ManagerConfig, backend: DeviceBackend) -> Result<Self, CoreError> {
        let http = HttpConfig {
            timeout: config.http_timeout,
            ..HttpConfig::default()
        };
        let firmware = FirmwareClient::new(
            config.firmware.index_url.clone(),
            config.firmware.source_base_url.clone(),
            &http,
        )?;
        Ok(Self::with_firmware_client(config, backend, firmware))
    }

    /// Build a manager around an existing firmware client.
    pub fn with_firmware_client(
        config: ManagerConfig,
        backend: DeviceBackend,
        firmware: FirmwareClient,
    ) -> Self {
        let cancel = CancellationToken::new();
        let run_token = cancel.child_token();
        Self {
            inner: Arc::new(ManagerInner {
                ctx: Arc::new(WorkerContext {
                    config,
                    backend,
                    firmware,
                    session: Session::new(),
                    notifier: Notifier::new(),
                }),
                cancel,
                run_token: Mutex::new(run_token),
                task_handles: tokio::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.ctx.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the three workers. Calling it while running restarts them.
    pub async fn start(&self) {
        self.stop().await;

        let token = self.inner.cancel.child_token();
        *self
            .inner
            .run_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token.clone();

        let period = self.inner.ctx.config.poll_interval;
        let mut handles = self.inner.task_handles.lock().await;

        let ctx = Arc::clone(&self.inner.ctx);
        handles.push(tokio::spawn(worker::run_periodic(
            "port monitor",
            period,
            token.clone(),
            move || {
                let ctx = Arc::clone(&ctx);
                async move { port_monitor::poll(&ctx).await }
            },
        )));

        let ctx = Arc::clone(&self.inner.ctx);
        handles.push(tokio::spawn(worker::run_periodic(
            "config update",
            period,
            token.clone(),
            move || {
                let ctx = Arc::clone(&ctx);
                async move { config_update::process(&ctx).await }
            },
        )));

        let ctx = Arc::clone(&self.inner.ctx);
        handles.push(tokio::spawn(worker::run_periodic(
            "firmware update",
            period,
            token,
            move || {
                let ctx = Arc::clone(&ctx);
                async move { firmware_update::process(&ctx).await }
            },
        )));

        info!(poll_ms = period.as_millis(), "workers started");
    }

    /// Cancel the workers and wait for them to finish.
    ///
    /// A run already in progress completes first.
    pub async fn stop(&self) {
        self.inner
            .run_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("workers stopped");
    }

    /// Stop for good. The manager cannot be started again.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.stop().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn notifications(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.ctx.notifier.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.ctx.session.subscribe()
    }

    pub fn session(&self) -> SessionSnapshot {
        self.inner.ctx.session.snapshot()
    }

    /// The port of a fully bootstrapped device.
    pub fn active_port(&self) -> Option<String> {
        self.inner.ctx.session.active_port()
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Ask the config worker to add a WiFi network to the device.
    pub fn request_config_update(
        &self,
        ssid: impl Into<String>,
        password: SecretString,
    ) -> Result<(), CoreError> {
        let credential = WifiCredential::new(ssid, password)?;
        self.inner.ctx.session.request_config(credential)
    }

    /// Ask the firmware worker to reflash the device.
    pub fn request_firmware_update(&self) -> Result<(), CoreError> {
        self.inner.ctx.session.request_firmware()
    }

    // ── Single iterations ────────────────────────────────────────────
    //
    // One worker step each, for callers that drive the schedule themselves.

    pub async fn poll_ports(&self) {
        port_monitor::poll(&self.inner.ctx).await;
    }

    pub async fn process_config_update(&self) {
        config_update::process(&self.inner.ctx).await;
    }

    pub async fn process_firmware_update(&self) {
        firmware_update::process(&self.inner.ctx).await;
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("connection", &self.inner.ctx.session.connection())
            .finish_non_exhaustive()
    }
}
