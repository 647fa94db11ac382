// ── Background workers ──
//
// Each worker is a loop ticking on the poll interval until the run token
// is cancelled. One iteration is an ordinary async method on the manager,
// so tests can drive a single step without timers.

pub(crate) mod config_update;
pub(crate) mod firmware_update;
pub(crate) mod port_monitor;

use std::sync::Arc;
use std::time::Duration;

use sumo_api::FirmwareClient;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ManagerConfig;
use crate::device::{DeviceBackend, DeviceError, DeviceHandle};
use crate::error::CoreError;
use crate::notify::Notifier;
use crate::session::{Session, TransportHold};

/// Everything a worker iteration needs. Shared by all workers.
#[derive(Debug)]
pub(crate) struct WorkerContext {
    pub(crate) config: ManagerConfig,
    pub(crate) backend: DeviceBackend,
    pub(crate) firmware: FirmwareClient,
    pub(crate) session: Session,
    pub(crate) notifier: Notifier,
}

/// Run `step` every `period` until `cancel` fires.
///
/// A step already running is allowed to finish; no step starts after
/// cancellation.
pub(crate) async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut step: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => step().await,
        }
    }
    debug!(worker = name, "stopped");
}

/// Run a blocking collaborator call on the blocking pool, bounded by `timeout`.
pub(crate) async fn run_blocking<R, F>(
    timeout: Duration,
    operation: &'static str,
    f: F,
) -> Result<R, CoreError>
where
    F: FnOnce() -> Result<R, DeviceError> + Send + 'static,
    R: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Err(_) => Err(CoreError::Timeout {
            operation,
            timeout_secs: timeout.as_secs(),
        }),
        Ok(Err(join)) => Err(CoreError::Internal(format!("{operation} panicked: {join}"))),
        Ok(Ok(result)) => result.map_err(CoreError::from),
    }
}

/// [`run_blocking`] for a call that touches the serial port. The call keeps
/// the transport taken until it returns, even after its timeout fired.
pub(crate) async fn run_held<R, F>(
    hold: &TransportHold,
    timeout: Duration,
    operation: &'static str,
    f: F,
) -> Result<R, CoreError>
where
    F: FnOnce() -> Result<R, DeviceError> + Send + 'static,
    R: Send + 'static,
{
    let hold = Arc::clone(hold);
    run_blocking(timeout, operation, move || {
        let result = f();
        drop(hold);
        result
    })
    .await
}

/// An open device handle whose calls run on the blocking pool.
///
/// The handle moves into the blocking task for each call and back out
/// afterwards. When a call times out the handle stays with the stuck task
/// and is dropped once that call returns; the wrapper then reports closed.
/// Each call carries a clone of the transport hold, so the port counts as
/// taken until the stuck call lets go of it.
pub(crate) struct BlockingHandle<T: ?Sized> {
    handle: Option<Box<T>>,
    timeout: Duration,
    hold: TransportHold,
}

impl<T> BlockingHandle<T>
where
    T: ?Sized + DeviceHandle + 'static,
{
    pub(crate) fn new(handle: Box<T>, timeout: Duration, hold: TransportHold) -> Self {
        Self {
            handle: Some(handle),
            timeout,
            hold,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) async fn call<R, F>(&mut self, operation: &'static str, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut T) -> Result<R, DeviceError> + Send + 'static,
        R: Send + 'static,
    {
        let Some(mut handle) = self.handle.take() else {
            return Err(CoreError::Internal(format!(
                "{operation} on a closed handle"
            )));
        };
        let hold = Arc::clone(&self.hold);
        let task = tokio::task::spawn_blocking(move || {
            let result = f(&mut *handle);
            drop(hold);
            (handle, result)
        });
        let (handle, result) = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                return Err(CoreError::Timeout {
                    operation,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            Ok(Err(join)) => {
                return Err(CoreError::Internal(format!("{operation} panicked: {join}")));
            }
            Ok(Ok(pair)) => pair,
        };
        self.handle = Some(handle);
        result.map_err(CoreError::from)
    }

    /// Close the handle. A second call is a no-op.
    pub(crate) async fn close(&mut self) -> Result<(), CoreError> {
        if self.handle.is_none() {
            return Ok(());
        }
        let result = self.call("close", |h| h.close()).await;
        self.handle = None;
        result
    }

    /// Close on a failure path; the original error matters more.
    pub(crate) async fn close_quietly(&mut self) {
        if let Err(e) = self.close().await {
            debug!(error = %e, "close after failure failed");
        }
    }
}

/// Close an optional handle on a failure path.
pub(crate) async fn close_if_open<T>(handle: &mut Option<BlockingHandle<T>>)
where
    T: ?Sized + DeviceHandle + 'static,
{
    if let Some(h) = handle.as_mut() {
        h.close_quietly().await;
    }
    *handle = None;
}
