// ── Firmware update worker ──
//
// Download everything first, then flash through the ROM bootloader, then
// upload the application sources through the running firmware. Nothing
// touches the device until every asset is in memory.

use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::{BlockingHandle, WorkerContext, close_if_open, run_held};
use crate::device::{ChipSession, RemoteFileChannel};
use crate::error::CoreError;
use crate::model::firmware::file_name_of;
use crate::model::{Dialog, FirmwareAssets};
use crate::session::{Job, TransportHold, UpdateKind, UpdateOutcome};

pub(crate) const UPDATING: &str = "Updating firmware...";
pub(crate) const UPDATED: &str = "Successfully updated firmware";
pub(crate) const UPDATE_FAILED: &str = "Error updating firmware";
const DOWNLOADING: &str = "Downloading firmware...";
const UPLOADING: &str = "Uploading firmware...";

const FALLBACK_BINARY_NAME: &str = "esp32.bin";

/// Run a pending firmware update, if any.
pub(crate) async fn process(ctx: &Arc<WorkerContext>) {
    let job = match ctx.session.begin(UpdateKind::Firmware) {
        Ok(Some(job)) => job,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "firmware update dropped");
            report_failure(ctx, &e);
            return;
        }
    };
    let outcome = match run(ctx, &job).await {
        Ok(()) => UpdateOutcome::Succeeded,
        Err(e) => {
            warn!(port = %job.port, error = %e, "firmware update failed");
            report_failure(ctx, &e);
            UpdateOutcome::Failed
        }
    };
    ctx.session.finish(job, outcome);
}

async fn run(ctx: &WorkerContext, job: &Job) -> Result<(), CoreError> {
    ctx.notifier.warning(UPDATING);
    let assets = fetch_assets(ctx).await?;
    debug!(bytes = assets.total_len(), "firmware assets downloaded");

    let hold = job.hold();
    let mut chip: Option<BlockingHandle<dyn ChipSession>> = None;
    let flashed = flash(ctx, &job.port, &assets, &hold, &mut chip)
        .await
        .map_err(as_flash_error);
    if flashed.is_err() {
        close_if_open(&mut chip).await;
    }
    flashed?;

    let mut channel: Option<BlockingHandle<dyn RemoteFileChannel>> = None;
    let uploaded = upload(ctx, &job.port, &assets, &hold, &mut channel).await;
    if uploaded.is_err() {
        close_if_open(&mut channel).await;
    }
    uploaded?;

    info!(port = %job.port, "firmware updated");
    ctx.notifier.info(UPDATED);
    // Make the port monitor bootstrap the fresh firmware.
    ctx.session.forget_device();
    Ok(())
}

async fn fetch_assets(ctx: &WorkerContext) -> Result<FirmwareAssets, CoreError> {
    let source = &ctx.config.firmware;
    let url = ctx.firmware.resolve_binary_url(&source.chip_marker).await?;
    let binary_name = file_name_of(&url, FALLBACK_BINARY_NAME);

    ctx.notifier.warning(format!("{DOWNLOADING} {binary_name}"));
    let binary = ctx.firmware.download(url).await?;

    let mut source_files: IndexMap<String, Bytes> = IndexMap::new();
    for name in &source.companion_files {
        ctx.notifier.warning(format!("{DOWNLOADING} {name}"));
        let data = ctx.firmware.download_source_file(name).await?;
        source_files.insert(name.clone(), data);
    }

    Ok(FirmwareAssets {
        binary_name,
        binary,
        source_files,
    })
}

async fn flash(
    ctx: &WorkerContext,
    port: &str,
    assets: &FirmwareAssets,
    hold: &TransportHold,
    chip: &mut Option<BlockingHandle<dyn ChipSession>>,
) -> Result<(), CoreError> {
    let timeout = ctx.config.flash_timeout;
    let params = ctx.config.flash.clone();
    let flasher = Arc::clone(&ctx.backend.flasher);
    let path = port.to_owned();

    let session = run_held(hold, timeout, "chip detection", move || flasher.detect(&path)).await?;
    let handle = chip.insert(BlockingHandle::new(session, timeout, Arc::clone(hold)));
    let name = handle.call("chip name", |c| Ok(c.chip().to_owned())).await?;
    debug!(%port, chip = %name, "bootloader answered");

    handle.call("stub upload", |c| c.run_stub()).await?;
    let baud = params.baud;
    handle.call("baud change", move |c| c.change_baud(baud)).await?;

    ctx.notifier
        .warning(format!("{UPLOADING} {}", assets.binary_name));
    let image = assets.binary.clone();
    handle
        .call("flash write", move |c| c.write_flash(&image, &params))
        .await?;
    handle.call("hard reset", |c| c.hard_reset()).await?;
    handle.close().await?;
    *chip = None;
    Ok(())
}

async fn upload(
    ctx: &WorkerContext,
    port: &str,
    assets: &FirmwareAssets,
    hold: &TransportHold,
    channel: &mut Option<BlockingHandle<dyn RemoteFileChannel>>,
) -> Result<(), CoreError> {
    let timeout = ctx.config.serial_timeout;
    let transport = Arc::clone(&ctx.backend.transport);
    let path = port.to_owned();

    let opened = run_held(hold, timeout, "open channel", move || transport.open_channel(&path)).await?;
    let handle = channel.insert(BlockingHandle::new(opened, timeout, Arc::clone(hold)));
    for (name, data) in &assets.source_files {
        ctx.notifier.warning(format!("{UPLOADING} {name}"));
        let (name, data) = (name.clone(), data.clone());
        handle
            .call("file upload", move |c| c.put(&name, &data))
            .await?;
    }
    handle.close().await?;
    *channel = None;
    Ok(())
}

/// Anything that goes wrong once the bootloader is involved is a flashing
/// failure, except a chip or port that never answered.
fn as_flash_error(err: CoreError) -> CoreError {
    match err {
        CoreError::Flash { .. } | CoreError::ChipNotFound { .. } | CoreError::PortUnavailable { .. } => {
            err
        }
        other => CoreError::Flash {
            reason: other.to_string(),
        },
    }
}

fn report_failure(ctx: &WorkerContext, err: &CoreError) {
    let mut hints = vec![
        "Try reconnecting the SumoRobot",
        "Check your Internet connection",
        "Finally try updating the firmware again",
    ];
    if let Some(hint) = err.hint().filter(|h| !hints.contains(h)) {
        hints.push(hint);
    }
    ctx.notifier
        .dialog(Dialog::error(UPDATE_FAILED, &hints, format!("{err}\n\n{err:?}")));
    ctx.notifier.error(UPDATE_FAILED);
}
