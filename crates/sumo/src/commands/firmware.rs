//! `sumo firmware`: reflash MicroPython and upload the application sources.

use tracing::info;

use sumo_core::{ConnectionState, Manager, UpdateKind};

use crate::cli::{FirmwareArgs, GlobalOpts};
use crate::error::CliError;

/// A board that failed its probe can still be reflashed.
fn flashable(state: &ConnectionState) -> bool {
    matches!(
        state,
        ConnectionState::Connected(_) | ConnectionState::Unresponsive(_)
    )
}

pub async fn handle(
    manager: &Manager,
    args: &FirmwareArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let printer = super::printer(global);
    let mut rx = manager.notifications();
    manager.start().await;

    let port = super::wait_for_device(manager, &mut rx, &printer, args.wait.wait, flashable).await?;
    info!(%port, "requesting firmware update");
    manager.request_firmware_update()?;

    let outcome = super::follow_update(manager, &mut rx, &printer, UpdateKind::Firmware).await?;
    super::outcome_result(UpdateKind::Firmware, outcome)
}
