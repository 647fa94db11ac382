// ── Session state ──
//
// The one record every worker shares: which port is bound, who holds the
// serial transport, and where each update workflow stands. All operations
// are non-blocking; the lock is never held across I/O.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::error::CoreError;
use crate::model::WifiCredential;

/// The two operator-triggered workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    #[strum(serialize = "config update")]
    Config,
    #[strum(serialize = "firmware update")]
    Firmware,
}

/// Lifecycle of one workflow: `Idle → Requested → Running → Idle`, with the
/// terminal result kept in [`UpdateOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdatePhase {
    #[default]
    Idle,
    Requested,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateOutcome {
    Succeeded,
    Failed,
}

/// Who currently drives the serial transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportOwner {
    PortMonitor,
    ConfigUpdate,
    FirmwareUpdate,
}

impl From<UpdateKind> for TransportOwner {
    fn from(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::Config => Self::ConfigUpdate,
            UpdateKind::Firmware => Self::FirmwareUpdate,
        }
    }
}

/// How the managed device is bound to the session.
///
/// Only `Connected` counts as an active port. `Unresponsive` keeps the port
/// bound so it is not re-probed every cycle, and still allows a firmware
/// update to recover the board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "port", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Port seen, network list not loaded yet.
    Probing(String),
    Connected(String),
    Unresponsive(String),
}

impl ConnectionState {
    /// The bound port, whatever its state.
    pub fn port(&self) -> Option<&str> {
        match self {
            Self::Disconnected => None,
            Self::Probing(p) | Self::Connected(p) | Self::Unresponsive(p) => Some(p),
        }
    }

    /// The port of a fully bootstrapped session.
    pub fn active_port(&self) -> Option<&str> {
        match self {
            Self::Connected(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

#[derive(Debug, Default)]
struct Slot {
    phase: UpdatePhase,
    credential: Option<WifiCredential>,
    last_outcome: Option<UpdateOutcome>,
}

#[derive(Debug, Default)]
struct SessionState {
    owner: Option<TransportOwner>,
    config: Slot,
    firmware: Slot,
}

impl SessionState {
    fn slot(&mut self, kind: UpdateKind) -> &mut Slot {
        match kind {
            UpdateKind::Config => &mut self.config,
            UpdateKind::Firmware => &mut self.firmware,
        }
    }

    fn busy_update(&self) -> Option<UpdateKind> {
        if self.config.phase != UpdatePhase::Idle {
            Some(UpdateKind::Config)
        } else if self.firmware.phase != UpdatePhase::Idle {
            Some(UpdateKind::Firmware)
        } else {
            None
        }
    }
}

/// Point-in-time copy of the session for display and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub transport_owner: Option<TransportOwner>,
    pub config_phase: UpdatePhase,
    pub firmware_phase: UpdatePhase,
    pub last_config_outcome: Option<UpdateOutcome>,
    pub last_firmware_outcome: Option<UpdateOutcome>,
}

/// Work handed to an update worker by [`Session::begin`].
#[derive(Debug)]
pub struct Job {
    pub kind: UpdateKind,
    pub port: String,
    /// Present for config updates.
    pub credential: Option<WifiCredential>,
    lease: TransportHold,
}

impl Job {
    pub fn owner(&self) -> TransportOwner {
        self.lease.owner
    }

    /// Another reference to the run's transport ownership.
    pub(crate) fn hold(&self) -> TransportHold {
        Arc::clone(&self.lease)
    }
}

/// Shared transport ownership. Blocking calls keep a clone until they
/// return, so a call that outlives its timeout still holds the port.
pub(crate) type TransportHold = Arc<TransportLease>;

/// Transport ownership that ends when dropped.
#[derive(Debug)]
pub struct TransportLease {
    session: Session,
    owner: TransportOwner,
}

impl TransportLease {
    pub fn owner(&self) -> TransportOwner {
        self.owner
    }
}

impl Drop for TransportLease {
    fn drop(&mut self) {
        self.session.release(self.owner);
    }
}

/// Shared session record. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    connection: Arc<watch::Sender<ConnectionState>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            connection: Arc::new(connection),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Transport ownership ──────────────────────────────────────────

    /// Take the transport if nobody holds it.
    pub(crate) fn try_acquire(&self, owner: TransportOwner) -> bool {
        let mut state = self.lock();
        if state.owner.is_some() {
            return false;
        }
        state.owner = Some(owner);
        debug!(%owner, "transport acquired");
        true
    }

    /// Give the transport back. Only clears a hold taken by `owner`.
    pub(crate) fn release(&self, owner: TransportOwner) -> bool {
        let mut state = self.lock();
        if state.owner != Some(owner) {
            return false;
        }
        state.owner = None;
        debug!(%owner, "transport released");
        true
    }

    /// Like [`try_acquire`](Self::try_acquire), releasing on drop.
    pub(crate) fn lease(&self, owner: TransportOwner) -> Option<TransportLease> {
        self.try_acquire(owner).then(|| TransportLease {
            session: self.clone(),
            owner,
        })
    }

    pub fn transport_owner(&self) -> Option<TransportOwner> {
        self.lock().owner
    }

    // ── Device binding ───────────────────────────────────────────────

    pub fn connection(&self) -> ConnectionState {
        self.connection.borrow().clone()
    }

    pub fn active_port(&self) -> Option<String> {
        self.connection.borrow().active_port().map(ToOwned::to_owned)
    }

    /// Subscribe to binding changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub(crate) fn set_connection(&self, next: ConnectionState) {
        self.connection.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = ?current, to = ?next, "connection state changed");
            *current = next;
            true
        });
    }

    /// Drop the binding so the port monitor bootstraps the device again.
    pub(crate) fn forget_device(&self) {
        self.set_connection(ConnectionState::Disconnected);
    }

    // ── Update requests ──────────────────────────────────────────────

    /// Queue a WiFi provisioning run.
    pub fn request_config(&self, credential: WifiCredential) -> Result<(), CoreError> {
        if !self.connection.borrow().is_connected() {
            return Err(CoreError::NotConnected);
        }
        let mut state = self.lock();
        if let Some(kind) = state.busy_update() {
            return Err(CoreError::UpdateInProgress { kind });
        }
        state.config.phase = UpdatePhase::Requested;
        state.config.credential = Some(credential);
        debug!("config update requested");
        Ok(())
    }

    /// Queue a firmware run. Also allowed for an unresponsive device.
    pub fn request_firmware(&self) -> Result<(), CoreError> {
        if !matches!(
            *self.connection.borrow(),
            ConnectionState::Connected(_) | ConnectionState::Unresponsive(_)
        ) {
            return Err(CoreError::NotConnected);
        }
        let mut state = self.lock();
        if let Some(kind) = state.busy_update() {
            return Err(CoreError::UpdateInProgress { kind });
        }
        state.firmware.phase = UpdatePhase::Requested;
        debug!("firmware update requested");
        Ok(())
    }

    pub fn phase(&self, kind: UpdateKind) -> UpdatePhase {
        self.lock().slot(kind).phase
    }

    pub fn last_outcome(&self, kind: UpdateKind) -> Option<UpdateOutcome> {
        self.lock().slot(kind).last_outcome
    }

    /// Withdraw a request that has not started yet.
    pub fn clear_request(&self, kind: UpdateKind) -> bool {
        let mut state = self.lock();
        let slot = state.slot(kind);
        if slot.phase != UpdatePhase::Requested {
            return false;
        }
        slot.phase = UpdatePhase::Idle;
        slot.credential = None;
        true
    }

    /// Start a requested run if the device is bound and the transport free.
    ///
    /// Returns `Ok(None)` when there is nothing to do yet. Fails, and clears
    /// the request, when the device went away before the run could start.
    pub fn begin(&self, kind: UpdateKind) -> Result<Option<Job>, CoreError> {
        let connection = self.connection();
        let port = match (kind, &connection) {
            (_, ConnectionState::Disconnected)
            | (UpdateKind::Config, ConnectionState::Unresponsive(_)) => None,
            (_, ConnectionState::Probing(_)) => return Ok(None),
            (UpdateKind::Config, ConnectionState::Connected(p))
            | (UpdateKind::Firmware, ConnectionState::Connected(p) | ConnectionState::Unresponsive(p)) => {
                Some(p.clone())
            }
        };

        let mut state = self.lock();
        if state.slot(kind).phase != UpdatePhase::Requested {
            return Ok(None);
        }
        let Some(port) = port else {
            let slot = state.slot(kind);
            slot.phase = UpdatePhase::Idle;
            slot.credential = None;
            slot.last_outcome = Some(UpdateOutcome::Failed);
            return Err(CoreError::NotConnected);
        };
        if state.owner.is_some() {
            return Ok(None);
        }

        let owner = TransportOwner::from(kind);
        state.owner = Some(owner);
        let slot = state.slot(kind);
        slot.phase = UpdatePhase::Running;
        let credential = slot.credential.take();
        debug!(%kind, %port, "update started");

        Ok(Some(Job {
            kind,
            port,
            credential,
            lease: Arc::new(TransportLease {
                session: self.clone(),
                owner,
            }),
        }))
    }

    /// Record the result of a run and drop its transport hold. The
    /// transport stays taken while a timed-out call still runs.
    pub fn finish(&self, job: Job, outcome: UpdateOutcome) {
        {
            let mut state = self.lock();
            let slot = state.slot(job.kind);
            slot.phase = UpdatePhase::Idle;
            slot.credential = None;
            slot.last_outcome = Some(outcome);
        }
        debug!(kind = %job.kind, %outcome, "update finished");
        drop(job);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let connection = self.connection();
        let state = self.lock();
        SessionSnapshot {
            connection,
            transport_owner: state.owner,
            config_phase: state.config.phase,
            firmware_phase: state.firmware.phase,
            last_config_outcome: state.config.last_outcome,
            last_firmware_outcome: state.firmware.last_outcome,
        }
    }
}
