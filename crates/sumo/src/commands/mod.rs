//! Command dispatch: bridges CLI args -> manager requests -> notification output.

pub mod config_cmd;
pub mod firmware;
pub mod ports;
pub mod watch;
pub mod wifi;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use sumo_core::{
    ConnectionState, Manager, Notification, Severity, UpdateKind, UpdateOutcome, UpdatePhase,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, NotificationPrinter};

/// How often a waiting command re-reads the session.
const SESSION_POLL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for a failed run's final error status.
const FAILURE_GRACE: Duration = Duration::from_secs(2);

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, manager: &Manager, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch => watch::handle(manager, global).await,
        Command::Wifi(args) => wifi::handle(manager, args, global).await,
        Command::Firmware(args) => firmware::handle(manager, &args, global).await,
        // Handled before a manager is built
        Command::Ports(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

pub fn printer(global: &GlobalOpts) -> NotificationPrinter {
    NotificationPrinter {
        format: global.output,
        color: output::should_color(global.color),
        quiet: global.quiet,
    }
}

/// Print notifications until `accept` matches the connection state.
///
/// Returns the bound port, or `NoDevice` after `wait_secs`.
pub async fn wait_for_device(
    manager: &Manager,
    rx: &mut broadcast::Receiver<Arc<Notification>>,
    printer: &NotificationPrinter,
    wait_secs: u64,
    accept: fn(&ConnectionState) -> bool,
) -> Result<String, CliError> {
    let mut state = manager.connection_state();
    let deadline = tokio::time::sleep(Duration::from_secs(wait_secs));
    tokio::pin!(deadline);

    loop {
        {
            let current = state.borrow_and_update();
            if let Some(port) = current.port().filter(|_| accept(&current)) {
                return Ok(port.to_owned());
            }
        }
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => return Err(CliError::Interrupted),
            () = &mut deadline => return Err(CliError::NoDevice { seconds: wait_secs }),
            changed = state.changed() => {
                if changed.is_err() {
                    return Err(CliError::Operation {
                        message: "device session closed".into(),
                        hint: None,
                    });
                }
            }
            msg = rx.recv() => {
                print_received(printer, msg);
            }
        }
    }
}

/// Print notifications until the requested run of `kind` has an outcome.
pub async fn follow_update(
    manager: &Manager,
    rx: &mut broadcast::Receiver<Arc<Notification>>,
    printer: &NotificationPrinter,
    kind: UpdateKind,
) -> Result<UpdateOutcome, CliError> {
    let mut tick = tokio::time::interval(SESSION_POLL);
    let mut saw_error = false;

    let outcome = loop {
        let snapshot = manager.session();
        let (phase, outcome) = match kind {
            UpdateKind::Config => (snapshot.config_phase, snapshot.last_config_outcome),
            UpdateKind::Firmware => (snapshot.firmware_phase, snapshot.last_firmware_outcome),
        };
        if let (UpdatePhase::Idle, Some(outcome)) = (phase, outcome) {
            break outcome;
        }
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => return Err(CliError::Interrupted),
            msg = rx.recv() => saw_error |= print_received(printer, msg),
            _ = tick.tick() => {}
        }
    };

    // The outcome is recorded after the last status, except when a run is
    // dropped before it starts; its error status follows shortly after.
    loop {
        match rx.try_recv() {
            Ok(note) => saw_error |= print_one(printer, &note),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    if outcome == UpdateOutcome::Failed && !saw_error {
        let _ = tokio::time::timeout(FAILURE_GRACE, async {
            loop {
                match rx.recv().await {
                    Ok(note) if print_one(printer, &note) => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
        .await;
    }
    Ok(outcome)
}

/// Print a received notification; `true` if it was an error status.
fn print_received(
    printer: &NotificationPrinter,
    msg: Result<Arc<Notification>, RecvError>,
) -> bool {
    match msg {
        Ok(note) => print_one(printer, &note),
        Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "notification output fell behind");
            false
        }
        Err(RecvError::Closed) => false,
    }
}

fn print_one(printer: &NotificationPrinter, note: &Notification) -> bool {
    printer.print(note);
    note.severity() == Some(Severity::Error)
}

/// Turn a finished run into the command's result.
pub fn outcome_result(kind: UpdateKind, outcome: UpdateOutcome) -> Result<(), CliError> {
    match outcome {
        UpdateOutcome::Succeeded => Ok(()),
        UpdateOutcome::Failed => Err(CliError::UpdateFailed {
            kind: kind.to_string(),
            hint: Some("See the messages above for what went wrong".into()),
        }),
    }
}
